//! # Tabletop Engine
//!
//! A tick-driven Entity-Component-System runtime for tabletop RPG sessions.
//!
//! ## Features
//!
//! - **Staged Life Cycles**: components, entities and systems are created
//!   and destroyed at well-defined sweeps, never mid-iteration
//! - **Priority Scheduling**: systems run in priority order, one phase at a time
//! - **Event Bus**: publish/subscribe with kind hierarchies
//! - **Graded Health**: failures degrade health instead of aborting the game
//! - **Explicit Wiring**: managers reach systems through a `Meeting`, never
//!   through globals
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tabletop_engine::prelude::*;
//!
//! struct Narrator;
//!
//! impl System for Narrator {
//!     fn name(&self) -> &'static str {
//!         "Narrator"
//!     }
//!
//!     fn ticks(&self) -> SystemTick {
//!         SystemTick::STANDARD
//!     }
//!
//!     fn update(&mut self, ctx: &mut SystemContext<'_>) -> Result<Health, TickError> {
//!         log::info!("Round {} begins", ctx.time().tick_num());
//!         Ok(Health::Healthy)
//!     }
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut engine = Engine::builder()
//!         .configuration(Configuration::load_from_file("session.toml")?)
//!         .build()?;
//!     engine.create_system(None, |_, _, _| Ok(Narrator))?;
//!     engine.run()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod core;
pub mod ecs;
pub mod engine;
pub mod events;
pub mod foundation;

pub use engine::{Engine, EngineBuilder, EngineError, StopHandle};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::Config,
        core::{Configuration, EngineSettings},
        ecs::{
            Component, ComponentData, ComponentId, ComponentManager, Context, DebugFlag, EcsError, Entity,
            EntityId, EntityManager, Health, Kind, LifeCycle, ManagerSet, Meeting, System, SystemContext,
            SystemId, SystemPriority, SystemTick, TickError, TimeManager,
        },
        events::{Event, EventManager, Owner},
        Engine, EngineBuilder, EngineError, StopHandle,
    };
}
