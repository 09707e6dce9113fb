//! Exponential backoff schedule

use std::time::Duration;

use crate::config::ThrottleConfig;

/// Bounded exponential backoff: `base * 2^attempt`, capped at `max`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Retries allowed after the first try
    pub retries: u32,
    pub base: Duration,
    pub max: Duration,
}

impl BackoffPolicy {
    pub fn new(retries: u32, base: Duration, max: Duration) -> Self {
        Self { retries, base, max }
    }

    /// Backoff without an upper bound on a single delay
    pub fn uncapped(retries: u32, base: Duration) -> Self {
        Self::new(retries, base, Duration::MAX)
    }

    /// Policy for rate-limited provider calls
    pub fn from_throttle(config: &ThrottleConfig) -> Self {
        Self::new(
            config.rate_limit_retries,
            Duration::from_millis(config.rate_limit_base_ms),
            Duration::from_millis(config.rate_limit_max_ms),
        )
    }

    /// Delay before retry number `attempt + 1` (zero-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Whether another retry is allowed after `attempt` retries were used
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.retries
    }
}
