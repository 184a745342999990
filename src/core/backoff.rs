//! Exponential backoff between retries.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Upper bound on any single backoff delay: 24 hours.
pub const MAX_BACKOFF: Duration = Duration::from_secs(24 * 3600);

/// `delay(a) = min(base ^ a, cap)` seconds, where `a` is the attempt count
/// after the failed claim.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Exponent base.
    pub base: f64,
    /// Ceiling on a single delay.
    pub cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: 2.0,
            cap: MAX_BACKOFF,
        }
    }
}

impl BackoffPolicy {
    /// Policy with the given base and the default 24h cap.
    #[must_use]
    pub const fn new(base: f64) -> Self {
        Self {
            base,
            cap: MAX_BACKOFF,
        }
    }

    /// Override the cap.
    #[must_use]
    pub const fn with_cap(mut self, cap: Duration) -> Self {
        self.cap = cap;
        self
    }

    /// Delay before requeueing a job that has been claimed `attempts` times.
    #[must_use]
    pub fn delay(&self, attempts: u32) -> Duration {
        let exponent = i32::try_from(attempts).unwrap_or(i32::MAX);
        let secs = self.base.powi(exponent);
        if !secs.is_finite() || secs >= self.cap.as_secs_f64() {
            return self.cap;
        }
        if secs <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(secs)
    }
}
