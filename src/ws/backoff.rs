//! Exponential reconnect backoff

use std::time::Duration;

/// Reconnect delay policy: `min(base * 2^attempt, max)`.
///
/// The attempt counter grows by one per failed or closed connection and only
/// returns to zero on a successful open.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    attempt: u32,
    last_delay: Option<Duration>,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            attempt: 0,
            last_delay: None,
        }
    }

    /// Record a failed attempt and return the delay before the next one
    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        let factor = 1_u32.checked_shl(self.attempt).unwrap_or(u32::MAX);
        let delay = self.base.saturating_mul(factor).min(self.max);
        self.last_delay = Some(delay);
        delay
    }

    /// Forget past failures after a successful open
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn last_delay(&self) -> Option<Duration> {
        self.last_delay
    }
}
