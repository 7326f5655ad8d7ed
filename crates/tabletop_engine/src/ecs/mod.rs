//! Entity-Component-System runtime
//!
//! Three pools, one life cycle. Components, entities and systems are each
//! owned by their manager and move through `Invalid → Creating → Alive →
//! Destroying → Dead`. Creation and destruction are staged and committed at
//! once-per-tick sweeps, so nothing a system iterates over changes shape
//! mid-tick.

pub mod component;
pub mod context;
pub mod entity;
pub mod error;
pub mod health;
pub mod identity;
pub mod kind;
pub mod life_cycle;
pub mod manager;
pub mod meeting;
pub mod scheduler;
pub mod system;
pub mod tick;
pub mod time;

#[cfg(test)]
mod tests;

pub use component::{Component, ComponentData, ComponentManager};
pub use context::Context;
pub use entity::{ComponentKey, Entity, EntityManager, EntityView};
pub use error::{EcsError, TickError};
pub use health::Health;
pub use identity::{ComponentId, EntityId, SystemId};
pub use kind::Kind;
pub use life_cycle::LifeCycle;
pub use manager::{EcsManager, ManagerSet};
pub use meeting::{Attendance, Meeting};
pub use scheduler::SystemManager;
pub use system::{System, SystemContext};
pub use tick::{DebugFlag, LifeGroup, SystemPriority, SystemTick};
pub use time::TimeManager;
