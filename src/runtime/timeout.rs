//! Receive phase stall detection.
//!
//! Reads are non-blocking, so an idle peer would keep the receive loop
//! spinning forever. The monitor measures time since the phase started
//! against two thresholds:
//! - soft: the phase is slow. Reported once per phase as a progress hook.
//! - hard: the phase is aborted with a timeout fault.

use std::time::{Duration, Instant};

/// Threshold durations for one receive phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    pub soft: Duration,
    pub hard: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            soft: Duration::from_millis(1000),
            hard: Duration::from_millis(5000),
        }
    }
}

/// Result of an elapsed-time check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutStatus {
    Continue,
    /// First check of the phase past the soft threshold.
    SoftWarning(Duration),
    /// Past the hard threshold; the phase must stop.
    HardAbort(Duration),
}

/// Tracks elapsed time of the current receive phase.
#[derive(Debug)]
pub struct TimeoutMonitor {
    config: TimeoutConfig,
    started: Instant,
    last_checked: Instant,
    soft_fired: bool,
}

impl TimeoutMonitor {
    pub fn new(config: TimeoutConfig) -> Self {
        let now = Instant::now();
        Self {
            config,
            started: now,
            last_checked: now,
            soft_fired: false,
        }
    }

    /// Begin a new phase at `now`.
    pub fn start(&mut self, now: Instant) {
        self.started = now;
        self.last_checked = now;
        self.soft_fired = false;
    }

    /// Classify the time elapsed between phase start and `now`.
    pub fn check_elapsed(&mut self, now: Instant) -> TimeoutStatus {
        self.last_checked = now;
        let elapsed = self.elapsed();

        if elapsed <= self.config.soft {
            return TimeoutStatus::Continue;
        }
        if elapsed > self.config.hard {
            return TimeoutStatus::HardAbort(elapsed);
        }
        if self.soft_fired {
            TimeoutStatus::Continue
        } else {
            self.soft_fired = true;
            TimeoutStatus::SoftWarning(elapsed)
        }
    }

    /// Elapsed time as of the most recent check.
    pub fn elapsed(&self) -> Duration {
        self.last_checked.saturating_duration_since(self.started)
    }
}
