//! Adaptive per-domain rate limiter.
//!
//! Enforces a fixed interval between requests to the same host.
//! Backs off on 429/503, gradually recovers on success.

mod config;
mod domain_state;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

pub use config::{DomainStats, RateLimitConfig};
use domain_state::DomainState;

/// Adaptive rate limiter that tracks per-domain request timing.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    domains: Arc<RwLock<HashMap<String, DomainState>>>,
}

impl RateLimiter {
    /// Create a new rate limiter with default config.
    pub fn new() -> Self {
        Self::with_config(RateLimitConfig::default())
    }

    /// Create a new rate limiter with custom config.
    pub fn with_config(config: RateLimitConfig) -> Self {
        Self {
            config,
            domains: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Extract domain from URL.
    pub fn extract_domain(url: &str) -> Option<String> {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|s| s.to_string()))
    }

    /// Wait until the domain is ready, then mark request as started.
    pub async fn acquire(&self, url: &str) -> Option<String> {
        let domain = Self::extract_domain(url)?;

        let wait_time = {
            let domains = self.domains.read().await;
            domains
                .get(&domain)
                .map(|s| s.time_until_ready())
                .unwrap_or(Duration::ZERO)
        };

        if wait_time > Duration::ZERO {
            debug!("Rate limiting {}: waiting {:?}", domain, wait_time);
            tokio::time::sleep(wait_time).await;
        }

        {
            let mut domains = self.domains.write().await;
            let state = domains
                .entry(domain.clone())
                .or_insert_with(|| DomainState::new(self.config.base_delay));
            state.last_request = Some(Instant::now());
            state.total_requests += 1;
        }

        Some(domain)
    }

    /// Feed a response status back into the limiter.
    pub async fn report_status(&self, domain: &str, status_code: u16) {
        if Self::is_definite_rate_limit(status_code) {
            self.report_rate_limit(domain, status_code).await;
        } else if status_code >= 500 {
            self.report_server_error(domain).await;
        } else if (200..400).contains(&status_code) {
            self.report_success(domain).await;
        }
    }

    /// Report a successful request - may decrease delay.
    pub async fn report_success(&self, domain: &str) {
        let mut domains = self.domains.write().await;
        if let Some(state) = domains.get_mut(domain) {
            state.consecutive_successes += 1;

            if state.in_backoff && state.consecutive_successes >= self.config.recovery_threshold {
                state.scale_delay(self.config.recovery_multiplier, self.config.max_delay);
                state.current_delay = state.current_delay.max(self.config.min_delay);

                if state.current_delay <= self.config.base_delay {
                    state.in_backoff = false;
                    state.current_delay = self.config.base_delay;
                    info!("Domain {} recovered from rate limit backoff", domain);
                } else {
                    debug!(
                        "Domain {} delay reduced to {:?}",
                        domain, state.current_delay
                    );
                }

                state.consecutive_successes = 0;
            }
        }
    }

    /// Check if a status code is definitely a rate limit.
    pub fn is_definite_rate_limit(status_code: u16) -> bool {
        matches!(status_code, 429 | 503)
    }

    /// Report a definite rate limit hit (429 or 503) - increases delay.
    pub async fn report_rate_limit(&self, domain: &str, status_code: u16) {
        let mut domains = self.domains.write().await;
        if let Some(state) = domains.get_mut(domain) {
            state.rate_limit_hits += 1;
            state.consecutive_successes = 0;
            state.in_backoff = true;
            if state.current_delay.is_zero() {
                state.current_delay = Duration::from_millis(500);
            }
            state.scale_delay(self.config.backoff_multiplier, self.config.max_delay);

            warn!(
                "Rate limited by {} (HTTP {}), backing off to {:?}",
                domain, status_code, state.current_delay
            );
        }
    }

    /// Report a server error (5xx other than 503) - mild backoff.
    pub async fn report_server_error(&self, domain: &str) {
        let mut domains = self.domains.write().await;
        if let Some(state) = domains.get_mut(domain) {
            state.consecutive_successes = 0;
            state.scale_delay(1.5, self.config.max_delay);
            debug!(
                "Server error for {}, delay increased to {:?}",
                domain, state.current_delay
            );
        }
    }

    /// Get statistics for all domains.
    pub async fn get_stats(&self) -> HashMap<String, DomainStats> {
        let domains = self.domains.read().await;
        domains
            .iter()
            .map(|(k, v)| {
                (
                    k.clone(),
                    DomainStats {
                        current_delay: v.current_delay,
                        in_backoff: v.in_backoff,
                        total_requests: v.total_requests,
                        rate_limit_hits: v.rate_limit_hits,
                    },
                )
            })
            .collect()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
