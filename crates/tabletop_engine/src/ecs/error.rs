//! ECS error types
//!
//! Two channels: [`EcsError`] for misuse and misconfiguration, propagated as
//! `Result`; [`TickError`] for a system's per-tick failure, which the
//! scheduler catches and logs.

use thiserror::Error;

/// Errors raised by the ECS managers
#[derive(Error, Debug)]
pub enum EcsError {
    /// Component misuse
    #[error("Component error: {0}")]
    Component(String),

    /// Entity misuse
    #[error("Entity error: {0}")]
    Entity(String),

    /// A system of this name already exists
    #[error("System '{0}' already exists")]
    DuplicateSystem(String),

    /// No component factory under this name
    #[error("No component factory registered as '{0}'")]
    UnknownFactory(String),

    /// A tick failed
    #[error(transparent)]
    Tick(#[from] TickError),

    /// Manager is borrowed elsewhere right now
    #[error("{0} is busy")]
    ManagerBusy(&'static str),

    /// Manager isn't attending the meeting
    #[error("{0} is not available")]
    ManagerMissing(&'static str),
}

/// A system's per-tick failure
#[derive(Error, Debug)]
pub enum TickError {
    /// The system asked for this tick but doesn't implement it
    #[error("System '{system}' has no handler for tick {tick}")]
    Unhandled {
        /// System name
        system: String,
        /// Tick name
        tick: &'static str,
    },

    /// The system tried and failed
    #[error("Tick failed: {0}")]
    Failed(String),

    /// The system panicked
    #[error("System '{system}' panicked during {tick}: {message}")]
    Panicked {
        /// System name
        system: String,
        /// Tick name
        tick: &'static str,
        /// Panic payload, if it was a string
        message: String,
    },
}
