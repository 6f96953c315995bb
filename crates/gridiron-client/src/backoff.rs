//! Reconnect delay schedule.
//!
//! Delays start at 1000 ms and grow by 1.5x per consecutive failure up to
//! a 10000 ms ceiling. A connection that opens but drops before delivering
//! anything counts as a failure; the schedule is reset only once a session
//! has delivered a frame.

use std::time::Duration;

/// Delay before the first reconnect attempt, in milliseconds.
pub const INITIAL_DELAY_MS: f64 = 1000.0;

/// Growth factor applied after each consecutive failure.
pub const BACKOFF_FACTOR: f64 = 1.5;

/// Upper bound on the delay, in milliseconds.
pub const MAX_DELAY_MS: f64 = 10_000.0;

/// Exponential backoff state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    initial_ms: f64,
    factor: f64,
    max_ms: f64,
    current_ms: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(INITIAL_DELAY_MS, BACKOFF_FACTOR, MAX_DELAY_MS)
    }
}

impl Backoff {
    /// Create a schedule with explicit parameters.
    pub const fn new(initial_ms: f64, factor: f64, max_ms: f64) -> Self {
        Self {
            initial_ms,
            factor,
            max_ms,
            current_ms: initial_ms,
        }
    }

    /// Return the next delay in milliseconds and advance the schedule.
    pub fn next_delay_ms(&mut self) -> f64 {
        let delay = self.current_ms.min(self.max_ms);
        self.current_ms = (self.current_ms * self.factor).min(self.max_ms);
        delay
    }

    /// Return the next delay and advance the schedule.
    pub fn next_delay(&mut self) -> Duration {
        Duration::from_secs_f64(self.next_delay_ms() / 1000.0)
    }

    /// Start again from the initial delay.
    pub const fn reset(&mut self) {
        self.current_ms = self.initial_ms;
    }
}
