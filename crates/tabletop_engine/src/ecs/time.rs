//! Tick counter, in-fiction clock, timers and log metering
//!
//! The in-fiction clock only moves when the engine calls
//! [`TimeManager::step`]; it has nothing to do with wall-clock time. Timers
//! are wall-clock and exist for bounded waits such as start-up.

use std::collections::HashMap;
use std::time::Duration;

use super::health::Health;
use super::manager::EcsManager;
use super::tick::{LifeGroup, SystemTick};
use crate::config::ConfigError;
use crate::core::config::EngineSettings;
use crate::foundation::time::MonotonicTimer;

/// Remembers when a rate-limited action last fired.
///
/// Keep one per action and pass it to [`TimeManager::metered`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogMeter {
    last: Option<Duration>,
}

/// Owner of all things time
#[derive(Debug)]
pub struct TimeManager {
    tick_num: u64,
    seconds: Duration,
    step: Duration,
    default_timeout: Duration,
    timers: HashMap<String, MonotonicTimer>,

    tick: SystemTick,
    next_tick: SystemTick,
    life_group: LifeGroup,

    health: Health,
}

impl Default for TimeManager {
    fn default() -> Self {
        Self::new(Duration::from_secs(6), Duration::from_secs(10))
    }
}

impl TimeManager {
    /// Name of the timer used when callers don't care which.
    pub const DEFAULT_TIMER: &'static str = "timeout";

    /// How many ticks' worth of in-fiction time a meter period lasts
    const METER_TICKS: u32 = 4;

    /// Create a time manager. A zero `step` is bumped to one second.
    pub fn new(step: Duration, default_timeout: Duration) -> Self {
        let step = if step.is_zero() {
            log::error!("TimeManager: tick step must be positive; using 1s");
            Duration::from_secs(1)
        } else {
            step
        };

        Self {
            tick_num: 0,
            seconds: Duration::ZERO,
            step,
            default_timeout,
            timers: HashMap::new(),
            tick: SystemTick::empty(),
            next_tick: SystemTick::empty(),
            life_group: LifeGroup::Invalid,
            health: Health::Healthy,
        }
    }

    /// Create a time manager from engine settings
    pub fn from_settings(settings: &EngineSettings) -> Result<Self, ConfigError> {
        Ok(Self::new(settings.tick_step()?, settings.timeout()?))
    }

    // -------------------------------------------------------------------------
    // Ticks & clock
    // -------------------------------------------------------------------------

    /// Advance one tick. Returns the new in-fiction time, which saturates at
    /// [`Duration::MAX`].
    pub fn step(&mut self) -> Duration {
        self.tick_num += 1;
        self.seconds = self.seconds.saturating_add(self.step);
        self.seconds
    }

    /// Ticks stepped so far
    pub const fn tick_num(&self) -> u64 {
        self.tick_num
    }

    /// In-fiction time elapsed
    pub const fn seconds(&self) -> Duration {
        self.seconds
    }

    /// In-fiction time per tick
    pub const fn tick_step(&self) -> Duration {
        self.step
    }

    /// Tick currently running
    pub const fn tick(&self) -> SystemTick {
        self.tick
    }

    /// Tick the engine will run next
    pub const fn next_tick(&self) -> SystemTick {
        self.next_tick
    }

    /// Life group currently running
    pub const fn life_group(&self) -> LifeGroup {
        self.life_group
    }

    pub(crate) fn set_tick(&mut self, tick: SystemTick) {
        self.tick = tick;
        self.life_group = tick.group();
    }

    pub(crate) fn set_next_tick(&mut self, tick: SystemTick) {
        self.next_tick = tick;
    }

    // -------------------------------------------------------------------------
    // Timers
    // -------------------------------------------------------------------------

    /// Create (or reset) a named timer. The timer is left idle.
    pub fn make_timer(&mut self, name: &str) -> &mut MonotonicTimer {
        let timer = self.timers.entry(name.to_string()).or_default();
        timer.reset();
        timer
    }

    /// Named timer, if it exists
    pub fn get_timer(&self, name: &str) -> Option<&MonotonicTimer> {
        self.timers.get(name)
    }

    /// Start (or restart) a named timer, creating it if needed
    pub fn start_timeout(&mut self, name: &str) {
        self.timers.entry(name.to_string()).or_default().restart();
    }

    /// Stop a named timer and reset it. Returns the elapsed time, or `None`
    /// if there was no such timer.
    pub fn end_timeout(&mut self, name: &str) -> Option<Duration> {
        let timer = self.timers.get_mut(name)?;
        timer.end();
        let elapsed = timer.elapsed();
        timer.reset();
        Some(elapsed)
    }

    /// Is the named timer timed out?
    ///
    /// True if the timer doesn't exist, isn't timing, or has run longer than
    /// `timeout` (the default timeout if `None`).
    pub fn is_timed_out(&self, name: &str, timeout: Option<Duration>) -> bool {
        let Some(timer) = self.timers.get(name) else {
            return true;
        };
        if !timer.timing() {
            return true;
        }
        let timeout = timeout.filter(|t| !t.is_zero()).unwrap_or(self.default_timeout);
        timer.timed_out(timeout)
    }

    /// Default timeout
    pub const fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    // -------------------------------------------------------------------------
    // Metering
    // -------------------------------------------------------------------------

    /// Should a rate-limited action fire now?
    ///
    /// Fires on first use, then at most once per meter period of in-fiction
    /// time. Updates `meter` when it fires.
    pub fn metered(&self, meter: &mut LogMeter) -> bool {
        let period = self.step.saturating_mul(Self::METER_TICKS);
        let fire = meter.last.map_or(true, |last| self.seconds > last.saturating_add(period));
        if fire {
            meter.last = Some(self.seconds);
        }
        fire
    }
}

impl EcsManager for TimeManager {
    fn name(&self) -> &'static str {
        "TimeManager"
    }

    fn health(&self) -> Health {
        self.health
    }

    fn apoptosis(&mut self) -> Health {
        for timer in self.timers.values_mut() {
            timer.end();
        }
        self.health = Health::Apoptosis;
        Health::Apoptosis
    }
}
