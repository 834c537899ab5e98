//! Peer re-selection policy for transport failures.
//!
//! A request that fails at the network level (timeout, connection refused)
//! may be retried against a *different* peer. The number of re-selections is
//! small and bounded; HTTP responses of any status are never retried.

use std::time::Duration;

/// Configuration for the retry policy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of re-selections (not counting the first try).
    pub max_reselects: u32,
    /// Delay before the first re-selection.
    pub initial_backoff: Duration,
    /// Maximum backoff delay (caps exponential growth).
    pub max_backoff: Duration,
    /// Multiplier applied to backoff on each further re-selection.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_reselects: 1,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

/// Stateless retry policy — computes the next delay given the attempt number.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    pub config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Returns the delay before the `attempt`-th re-selection (1-based).
    /// Returns `None` if `attempt` exceeds `max_reselects`.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.config.max_reselects {
            return None;
        }
        let base_ms = self.config.initial_backoff.as_millis() as f64
            * self.config.multiplier.powi((attempt - 1) as i32);
        let cap_ms = self.config.max_backoff.as_millis() as f64;
        Some(Duration::from_millis(base_ms.min(cap_ms) as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allows_exactly_one_reselect() {
        let policy = RetryPolicy::default();
        assert!(policy.next_delay(0).is_none());
        assert_eq!(policy.next_delay(1), Some(Duration::from_millis(50)));
        assert!(policy.next_delay(2).is_none());
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let policy = RetryPolicy::new(RetryConfig {
            max_reselects: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
            multiplier: 2.0,
        });
        assert_eq!(policy.next_delay(1).unwrap().as_millis(), 100);
        assert_eq!(policy.next_delay(2).unwrap().as_millis(), 200);
        assert_eq!(policy.next_delay(3).unwrap().as_millis(), 400);
        assert_eq!(policy.next_delay(4).unwrap().as_millis(), 500);
    }

    #[test]
    fn zero_reselects_disables_retry() {
        let policy = RetryPolicy::new(RetryConfig {
            max_reselects: 0,
            ..Default::default()
        });
        assert!(policy.next_delay(1).is_none());
    }
}
