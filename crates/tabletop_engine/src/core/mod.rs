//! # Core Engine Module
//!
//! Shared settings types that the engine and its managers are built from.
//!
//! ## Organization
//!
//! - **Config**: Engine settings plus the rules-definition and saved-game trees

pub mod config;

pub use config::{Config, ConfigError, Configuration, EngineSettings};
