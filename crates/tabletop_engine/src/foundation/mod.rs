//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - Wall-clock timers
//! - Dotted-path lookups for configuration trees
//! - Logging utilities

pub mod dotted;
pub mod logging;
pub mod time;
