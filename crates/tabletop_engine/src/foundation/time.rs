//! Wall-clock timing utilities

use std::time::{Duration, Instant};

/// Stopwatch-style timer used for timeouts and log metering.
///
/// A timer is either timing (started and not yet ended) or idle. Elapsed
/// time accumulates across start/end pairs until [`reset`](Self::reset).
#[derive(Debug, Clone)]
pub struct MonotonicTimer {
    start_time: Option<Instant>,
    elapsed: Duration,
}

impl Default for MonotonicTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicTimer {
    /// Create a new idle timer
    pub const fn new() -> Self {
        Self {
            start_time: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Create a new timer and start it immediately
    pub fn start_new() -> Self {
        let mut timer = Self::new();
        timer.start();
        timer
    }

    /// Start timing. Restarting a running timer discards the current lap.
    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Stop timing and accumulate the lap into elapsed time
    pub fn end(&mut self) {
        if let Some(start) = self.start_time.take() {
            self.elapsed += start.elapsed();
        }
    }

    /// Reset to zero and idle
    pub fn reset(&mut self) {
        self.start_time = None;
        self.elapsed = Duration::ZERO;
    }

    /// Reset and start again
    pub fn restart(&mut self) {
        self.reset();
        self.start();
    }

    /// Total elapsed time, including the running lap
    pub fn elapsed(&self) -> Duration {
        let lap = self.start_time.map_or(Duration::ZERO, |start| start.elapsed());
        self.elapsed + lap
    }

    /// True while started and not yet ended
    pub const fn timing(&self) -> bool {
        self.start_time.is_some()
    }

    /// True if more than `timeout` has elapsed.
    pub fn timed_out(&self, timeout: Duration) -> bool {
        self.elapsed() > timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_timer_is_idle() {
        let timer = MonotonicTimer::new();
        assert!(!timer.timing());
        assert_eq!(timer.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_start_end_accumulates() {
        let mut timer = MonotonicTimer::start_new();
        assert!(timer.timing());
        std::thread::sleep(Duration::from_millis(2));
        timer.end();
        assert!(!timer.timing());

        let first = timer.elapsed();
        assert!(first >= Duration::from_millis(2));

        // Idle timers don't advance.
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(timer.elapsed(), first);
    }

    #[test]
    fn test_timed_out() {
        let mut timer = MonotonicTimer::start_new();
        assert!(!timer.timed_out(Duration::from_secs(60)));
        std::thread::sleep(Duration::from_millis(2));
        assert!(timer.timed_out(Duration::ZERO));

        timer.reset();
        assert!(!timer.timed_out(Duration::ZERO));
    }
}
