//! Rate limiter configuration.

use std::time::Duration;

/// Tuning for the per-domain limiter.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Interval between requests to the same host when not backing off.
    pub base_delay: Duration,
    /// Floor when recovering from backoff.
    pub min_delay: Duration,
    /// Ceiling for backoff.
    pub max_delay: Duration,
    /// Applied to the current delay on 429/503.
    pub backoff_multiplier: f64,
    /// Applied to the current delay after `recovery_threshold` successes.
    pub recovery_multiplier: f64,
    pub recovery_threshold: u32,
}

impl RateLimitConfig {
    pub fn with_base_delay(base_delay: Duration) -> Self {
        Self {
            base_delay,
            min_delay: base_delay,
            ..Default::default()
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1500),
            min_delay: Duration::from_millis(1500),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            recovery_multiplier: 0.5,
            recovery_threshold: 5,
        }
    }
}

/// Snapshot of one domain's limiter state.
#[derive(Debug, Clone)]
pub struct DomainStats {
    pub current_delay: Duration,
    pub in_backoff: bool,
    pub total_requests: u64,
    pub rate_limit_hits: u64,
}
