//! Graded health readings
//!
//! Managers, systems and the engine report a [`Health`] instead of failing
//! hard. Readings merge with "worse-of" semantics: the lower value wins.
//!
//! Values fall into bands:
//! - `> 19`: best health, fit for the game loop
//! - `0..19`: limbo, acceptable while starting up
//! - `-19..0`: structured shut-down states
//! - `< -19`: should die

use std::fmt;

/// A manager's, system's or the engine's current health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum Health {
    /// Not set, but should have been
    #[default]
    Invalid = 0,
    /// Reading carries no information and is skipped when merging
    Ignore = 1,

    /// Successfully died in a healthy manner
    AutophagySuccessful = -10,
    /// Dying in a healthy manner
    Autophagy = -11,
    /// Failed to die in a healthy manner
    AutophagyFailure = -12,
    /// Forced shut-down in progress
    Apoptosis = -15,
    /// Forced shut-down finished
    ApoptosisDone = -16,
    /// Done with everything; the good kind of dead
    Necrosis = -18,

    /// Running, but not well
    Unhealthy = -20,
    /// Dying unhealthily
    Dying = -30,
    /// Bad things are happening; kill it
    Fatal = -100,

    /// Waiting on something, e.g. a manager not wired in yet
    Pending = 10,

    /// Valid, with a warning
    HealthyButWarning = 100,
    /// Valid
    Healthy = 111,
}

impl Health {
    /// Readings above this are fit for the game loop.
    pub const GOOD_MIN: i32 = 19;
    /// Readings above this are fit for structured shut-down.
    pub const RUN_OK_MIN: i32 = -19;

    /// Numeric value of the reading
    pub const fn value(self) -> i32 {
        self as i32
    }

    /// Should this reading trigger death?
    pub const fn should_die(self) -> bool {
        self.value() < Self::RUN_OK_MIN
    }

    /// Neither good nor bad; fine while starting up.
    pub const fn in_limbo(self) -> bool {
        self.value() >= Self::Invalid.value() && self.value() < Self::GOOD_MIN
    }

    /// Good enough for the game loop.
    pub const fn in_best_health(self) -> bool {
        self.value() > Self::GOOD_MIN || matches!(self, Self::Ignore)
    }

    /// Good enough to keep running a structured shut-down.
    pub const fn in_runnable_health(self) -> bool {
        self.value() > Self::RUN_OK_MIN || matches!(self, Self::Ignore)
    }

    /// The worse of two readings. `Ignore` loses to anything.
    pub const fn worse(a: Self, b: Self) -> Self {
        if matches!(a, Self::Ignore) {
            return b;
        }
        if matches!(b, Self::Ignore) {
            return a;
        }
        if a.value() < b.value() {
            a
        } else {
            b
        }
    }

    /// The worse of two readings, treating both `Invalid` and `Ignore` as
    /// "no reading". If neither side has a reading, `Invalid` is preferred
    /// over `Ignore`.
    pub const fn merge(a: Self, b: Self) -> Self {
        match (a, b) {
            (Self::Invalid, Self::Ignore) | (Self::Ignore, Self::Invalid) => Self::Invalid,
            (Self::Invalid | Self::Ignore, other) | (other, Self::Invalid | Self::Ignore) => other,
            _ => {
                if a.value() < b.value() {
                    a
                } else {
                    b
                }
            }
        }
    }

    /// Fold readings into `self` with [`merge`](Self::merge).
    #[must_use]
    pub fn update(self, readings: impl IntoIterator<Item = Self>) -> Self {
        readings.into_iter().fold(self, Self::merge)
    }
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Health::{self:?}({})", self.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_invalid() {
        assert_eq!(Health::default(), Health::Invalid);
        assert_eq!(Health::default().value(), 0);
    }

    #[test]
    fn test_worse_prefers_lower() {
        assert_eq!(Health::worse(Health::Healthy, Health::Unhealthy), Health::Unhealthy);
        assert_eq!(Health::worse(Health::Pending, Health::Healthy), Health::Pending);
        assert_eq!(Health::worse(Health::Healthy, Health::Pending), Health::Pending);
        assert_eq!(Health::worse(Health::Fatal, Health::Dying), Health::Fatal);
    }

    #[test]
    fn test_worse_skips_ignore() {
        assert_eq!(Health::worse(Health::Ignore, Health::Healthy), Health::Healthy);
        assert_eq!(Health::worse(Health::Unhealthy, Health::Ignore), Health::Unhealthy);
        // Invalid is a real reading for `worse`.
        assert_eq!(Health::worse(Health::Invalid, Health::Healthy), Health::Invalid);
    }

    #[test]
    fn test_merge_skips_invalid_and_ignore() {
        assert_eq!(Health::merge(Health::Invalid, Health::Healthy), Health::Healthy);
        assert_eq!(Health::merge(Health::Pending, Health::Ignore), Health::Pending);
        assert_eq!(Health::merge(Health::Ignore, Health::Invalid), Health::Invalid);
        assert_eq!(Health::merge(Health::Ignore, Health::Ignore), Health::Ignore);
        assert_eq!(Health::merge(Health::Apoptosis, Health::Healthy), Health::Apoptosis);
    }

    #[test]
    fn test_update_folds_all() {
        let health = Health::Healthy.update([Health::Ignore, Health::Pending, Health::HealthyButWarning]);
        assert_eq!(health, Health::Pending);
        assert_eq!(Health::Invalid.update([]), Health::Invalid);
    }

    #[test]
    fn test_bands() {
        assert!(Health::Unhealthy.should_die());
        assert!(!Health::Necrosis.should_die());
        assert!(Health::Pending.in_limbo());
        assert!(Health::Invalid.in_limbo());
        assert!(!Health::Healthy.in_limbo());
        assert!(Health::HealthyButWarning.in_best_health());
        assert!(Health::Ignore.in_best_health());
        assert!(!Health::Pending.in_best_health());
        assert!(Health::Apoptosis.in_runnable_health());
        assert!(!Health::Dying.in_runnable_health());
    }
}
