//! Tick taxonomy, scheduling priorities and debug flags
//!
//! Every engine tick belongs to one of three life groups:
//!
//! - **Birth**: `SYNTHESIS`, `MITOSIS`
//! - **Life**: `TIME → CREATION → PRE → STANDARD → POST → DESTRUCTION`, repeating
//! - **Death**: `AUTOPHAGY`, `APOPTOSIS`, `NECROSIS`, `FUNERAL`
//!
//! Systems declare the set of ticks they want as a [`SystemTick`] bitmask.

use bitflags::bitflags;

use super::health::Health;

bitflags! {
    /// One tick, or a set of ticks.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SystemTick: u32 {
        /// Systems load what they need
        const SYNTHESIS   = 1 << 0;
        /// Systems finish cross-registration
        const MITOSIS     = 1 << 1;

        /// Clock advances; system creation sweep and reschedule
        const TIME        = 1 << 2;
        /// Component and entity creation sweeps
        const CREATION    = 1 << 3;
        /// Pre-work window
        const PRE         = 1 << 4;
        /// Main work window
        const STANDARD    = 1 << 5;
        /// Post-work window
        const POST        = 1 << 6;
        /// Component, entity and system destruction sweeps
        const DESTRUCTION = 1 << 7;

        /// Graceful shut-down attempt
        const AUTOPHAGY   = 1 << 8;
        /// Forced shut-down
        const APOPTOSIS   = 1 << 9;
        /// Confirmed dead
        const NECROSIS    = 1 << 10;
        /// Final tick
        const FUNERAL     = 1 << 11;

        /// All birth ticks
        const TICKS_BIRTH = Self::SYNTHESIS.bits() | Self::MITOSIS.bits();
        /// All life ticks
        const TICKS_LIFE = Self::TIME.bits()
            | Self::CREATION.bits()
            | Self::PRE.bits()
            | Self::STANDARD.bits()
            | Self::POST.bits()
            | Self::DESTRUCTION.bits();
        /// All death ticks
        const TICKS_DEATH = Self::AUTOPHAGY.bits()
            | Self::APOPTOSIS.bits()
            | Self::NECROSIS.bits()
            | Self::FUNERAL.bits();

        /// Ticks on which the system schedule may be rebuilt
        const RESCHEDULE_SYSTEMS = Self::TIME.bits();
    }
}

impl SystemTick {
    /// Life ticks in execution order
    pub const LIFE_ORDER: [Self; 6] = [
        Self::TIME,
        Self::CREATION,
        Self::PRE,
        Self::STANDARD,
        Self::POST,
        Self::DESTRUCTION,
    ];

    /// Does this set include any tick of `other`?
    pub const fn has_any(self, other: Self) -> bool {
        self.intersects(other)
    }

    /// Which life group a single tick belongs to
    pub fn group(self) -> LifeGroup {
        if self.is_empty() {
            LifeGroup::Invalid
        } else if Self::TICKS_BIRTH.contains(self) {
            LifeGroup::Birth
        } else if Self::TICKS_LIFE.contains(self) {
            LifeGroup::Life
        } else if Self::TICKS_DEATH.contains(self) {
            LifeGroup::Death
        } else {
            LifeGroup::Invalid
        }
    }

    /// Name of a single tick, for logs
    pub fn name(self) -> &'static str {
        self.iter_names()
            .next()
            .filter(|_| self.bits().count_ones() == 1)
            .map_or("MULTIPLE", |(name, _)| name)
    }
}

/// The engine's macro life-cycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifeGroup {
    /// Not started
    #[default]
    Invalid,
    /// Start-up ticks
    Birth,
    /// Game loop
    Life,
    /// Shut-down ticks
    Death,
}

impl LifeGroup {
    /// The tick set making up this group
    pub const fn ticks(self) -> SystemTick {
        match self {
            Self::Invalid => SystemTick::empty(),
            Self::Birth => SystemTick::TICKS_BIRTH,
            Self::Life => SystemTick::TICKS_LIFE,
            Self::Death => SystemTick::TICKS_DEATH,
        }
    }
}

/// Scheduling priority. Lower values run earlier.
pub struct SystemPriority;

impl SystemPriority {
    /// Default priority
    pub const LOW: i32 = 10_000;
    /// Runs before `LOW`
    pub const MEDIUM: i32 = 1_000;
    /// Runs before `MEDIUM`
    pub const HIGH: i32 = 100;

    /// Data repository systems, ahead of everything gameplay related
    pub const DATA_REPO: i32 = Self::HIGH - 8;
    /// Data request systems
    pub const DATA_REQUEST: i32 = Self::HIGH - 10;
}

bitflags! {
    /// Debugging switches
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DebugFlag: u8 {
        /// Log every tick
        const LOG_TICK     = 1 << 0;
        /// Re-raise errors caught at the tick boundaries
        const RAISE_ERRORS = 1 << 1;
        /// Everything useful while running unit tests
        const UNIT_TESTS   = Self::LOG_TICK.bits() | Self::RAISE_ERRORS.bits();
    }
}

/// Is `health` acceptable for running `tick`?
///
/// - Birth ticks accept best health, `Pending`, or limbo.
/// - Life ticks require best health.
/// - Death ticks get progressively stricter; `FUNERAL` requires exactly
///   `Necrosis`.
pub fn tick_healthy(tick: SystemTick, health: Health) -> bool {
    match tick.group() {
        LifeGroup::Birth => health.in_best_health() || health.in_limbo(),
        LifeGroup::Life => health.in_best_health(),
        LifeGroup::Death => {
            if tick == SystemTick::AUTOPHAGY {
                health.in_runnable_health()
                    || matches!(
                        health,
                        Health::Autophagy | Health::AutophagySuccessful | Health::AutophagyFailure
                    )
            } else if tick == SystemTick::APOPTOSIS {
                health.in_runnable_health()
                    || matches!(health, Health::Apoptosis | Health::ApoptosisDone)
            } else if tick == SystemTick::NECROSIS {
                health != Health::Fatal
            } else {
                health == Health::Necrosis
            }
        }
        LifeGroup::Invalid => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groups() {
        assert_eq!(SystemTick::MITOSIS.group(), LifeGroup::Birth);
        assert_eq!(SystemTick::STANDARD.group(), LifeGroup::Life);
        assert_eq!(SystemTick::FUNERAL.group(), LifeGroup::Death);
        assert_eq!(SystemTick::empty().group(), LifeGroup::Invalid);
        assert_eq!((SystemTick::PRE | SystemTick::FUNERAL).group(), LifeGroup::Invalid);
        assert_eq!(LifeGroup::Death.ticks(), SystemTick::TICKS_DEATH);
    }

    #[test]
    fn test_has_any() {
        let wanted = SystemTick::PRE | SystemTick::POST;
        assert!(wanted.has_any(SystemTick::POST));
        assert!(!wanted.has_any(SystemTick::STANDARD));
        assert!(SystemTick::TICKS_LIFE.has_any(SystemTick::RESCHEDULE_SYSTEMS));
    }

    #[test]
    fn test_life_order_covers_life() {
        let all = SystemTick::LIFE_ORDER
            .iter()
            .fold(SystemTick::empty(), |acc, tick| acc | *tick);
        assert_eq!(all, SystemTick::TICKS_LIFE);
    }

    #[test]
    fn test_names() {
        assert_eq!(SystemTick::STANDARD.name(), "STANDARD");
        assert_eq!((SystemTick::PRE | SystemTick::POST).name(), "MULTIPLE");
    }

    #[test]
    fn test_priorities_order() {
        assert!(SystemPriority::HIGH < SystemPriority::MEDIUM);
        assert!(SystemPriority::MEDIUM < SystemPriority::LOW);
        assert!(SystemPriority::DATA_REQUEST < SystemPriority::DATA_REPO);
        assert!(SystemPriority::DATA_REPO < SystemPriority::HIGH);
    }

    #[test]
    fn test_tick_healthy() {
        assert!(tick_healthy(SystemTick::SYNTHESIS, Health::Pending));
        assert!(!tick_healthy(SystemTick::SYNTHESIS, Health::Unhealthy));
        assert!(tick_healthy(SystemTick::STANDARD, Health::Healthy));
        assert!(!tick_healthy(SystemTick::STANDARD, Health::Pending));
        assert!(tick_healthy(SystemTick::APOPTOSIS, Health::ApoptosisDone));
        assert!(tick_healthy(SystemTick::FUNERAL, Health::Necrosis));
        assert!(!tick_healthy(SystemTick::FUNERAL, Health::Healthy));
    }
}
