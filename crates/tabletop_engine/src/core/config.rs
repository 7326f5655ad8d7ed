//! # Engine Configuration
//!
//! The engine is built from a [`Configuration`]: engine settings plus two
//! opaque TOML trees supplied by the data layer.
//!
//! - **definition**: rules-definition data (dice, skills, ...)
//! - **saved**: saved-game data (party, campaign state, ...)
//!
//! The engine never interprets either tree; managers and systems pull values
//! out of them by dotted path.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use toml::{Table, Value};

pub use crate::config::{Config, ConfigError};
use crate::ecs::tick::DebugFlag;
use crate::foundation::dotted;

/// # Engine Settings
///
/// Tick cadence, start-up/shut-down limits and debug flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// In-fiction seconds that pass per life tick
    pub tick_seconds: f64,
    /// Default wall-clock timeout for bounded waits, in seconds
    pub timeout_seconds: f64,
    /// Maximum ticks spent in the birth phases before giving up
    pub max_birth_ticks: u32,
    /// Maximum ticks spent in the death phases before forcing the funeral
    pub max_death_ticks: u32,
    /// Debug flag names, e.g. `["RAISE_ERRORS", "LOG_TICK"]`
    pub debug: Vec<String>,
}

impl EngineSettings {
    /// Default in-fiction tick length: one combat round.
    pub const DEFAULT_TICK_SECONDS: f64 = 6.0;
    /// Default wall-clock timeout.
    pub const DEFAULT_TIMEOUT_SECONDS: f64 = 10.0;

    /// Create settings with defaults
    pub fn new() -> Self {
        Self {
            tick_seconds: Self::DEFAULT_TICK_SECONDS,
            timeout_seconds: Self::DEFAULT_TIMEOUT_SECONDS,
            max_birth_ticks: 100,
            max_death_ticks: 100,
            debug: Vec::new(),
        }
    }

    /// Set the in-fiction tick length
    pub fn with_tick_seconds(mut self, seconds: f64) -> Self {
        self.tick_seconds = seconds;
        self
    }

    /// Set the default timeout
    pub fn with_timeout_seconds(mut self, seconds: f64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Set the birth and death tick limits
    pub fn with_tick_limits(mut self, birth: u32, death: u32) -> Self {
        self.max_birth_ticks = birth;
        self.max_death_ticks = death;
        self
    }

    /// Add debug flags
    pub fn with_debug(mut self, flags: DebugFlag) -> Self {
        for (name, _) in flags.iter_names() {
            if !self.debug.iter().any(|existing| existing == name) {
                self.debug.push(name.to_string());
            }
        }
        self
    }

    /// Parse the debug flag names
    pub fn debug_flags(&self) -> Result<DebugFlag, ConfigError> {
        self.debug.iter().try_fold(DebugFlag::empty(), |flags, name| {
            DebugFlag::from_name(name)
                .map(|flag| flags | flag)
                .ok_or_else(|| ConfigError::Invalid(format!("unknown debug flag '{name}'")))
        })
    }

    /// Tick length as a duration
    pub fn tick_step(&self) -> Result<Duration, ConfigError> {
        Self::duration("tick_seconds", self.tick_seconds)
    }

    /// Default timeout as a duration
    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        Self::duration("timeout_seconds", self.timeout_seconds)
    }

    fn duration(name: &str, seconds: f64) -> Result<Duration, ConfigError> {
        Duration::try_from_secs_f64(seconds)
            .map_err(|err| ConfigError::Invalid(format!("{name} = {seconds} is not a duration: {err}")))
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.tick_seconds.is_finite() || self.tick_seconds <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "tick_seconds must be positive, got {}",
                self.tick_seconds
            )));
        }
        if !self.timeout_seconds.is_finite() || self.timeout_seconds < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "timeout_seconds must not be negative, got {}",
                self.timeout_seconds
            )));
        }
        self.tick_step()?;
        self.timeout()?;
        if self.max_birth_ticks == 0 || self.max_death_ticks == 0 {
            return Err(ConfigError::Invalid("tick limits must be non-zero".to_string()));
        }
        self.debug_flags().map(|_| ())
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// # Configuration
///
/// Everything the engine pulls from the data layer at start-up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Engine settings
    pub engine: EngineSettings,
    /// Rules-definition tree
    pub definition: Table,
    /// Saved-game tree
    pub saved: Table,
}

impl Configuration {
    /// Create a configuration with default engine settings and empty trees
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the engine settings
    pub fn with_engine(mut self, engine: EngineSettings) -> Self {
        self.engine = engine;
        self
    }

    /// Replace the rules-definition tree
    pub fn with_definition(mut self, definition: Table) -> Self {
        self.definition = definition;
        self
    }

    /// Replace the saved-game tree
    pub fn with_saved(mut self, saved: Table) -> Self {
        self.saved = saved;
        self
    }

    /// Look up a rules-definition value by dotted path
    pub fn definition(&self, path: &str) -> Option<&Value> {
        dotted::lookup(&self.definition, path)
    }

    /// Look up a saved-game value by dotted path
    pub fn saved(&self, path: &str) -> Option<&Value> {
        dotted::lookup(&self.saved, path)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()
    }
}

impl Config for Configuration {}
