use std::time::Duration;

use hookwire_core::RetryPolicy;

use crate::error::EngineError;

/// Configuration for the [`WebhookEngine`](crate::WebhookEngine).
///
/// Immutable once the engine is built; validated by the builder.
///
/// # Examples
///
/// ```
/// use hookwire_engine::EngineConfig;
///
/// let config = EngineConfig::default();
/// assert_eq!(config.batch_size, 100);
/// assert_eq!(config.max_concurrent_sends, 10);
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Backoff curve and attempt ceiling for failed sends.
    pub retry_policy: RetryPolicy,
    /// Default number of due deliveries picked up per sweep.
    pub batch_size: usize,
    /// Upper bound on one send attempt.
    pub send_timeout: Duration,
    /// Age after which a QUEUED claim without an outcome is treated as a
    /// failed attempt. Must exceed `send_timeout`.
    pub stale_claim_after: Duration,
    /// Maximum sends in flight within one sweep, and separately across all
    /// immediate deliveries of one engine.
    pub max_concurrent_sends: usize,
    /// Hand new deliveries to the claim path as soon as the dispatch
    /// commits, instead of waiting for the next sweep.
    pub immediate_delivery: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry_policy: RetryPolicy::default(),
            batch_size: 100,
            send_timeout: Duration::from_secs(15),
            stale_claim_after: Duration::from_secs(5 * 60),
            max_concurrent_sends: 10,
            immediate_delivery: true,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_stale_claim_after(mut self, after: Duration) -> Self {
        self.stale_claim_after = after;
        self
    }

    #[must_use]
    pub fn with_max_concurrent_sends(mut self, max: usize) -> Self {
        self.max_concurrent_sends = max;
        self
    }

    #[must_use]
    pub fn with_immediate_delivery(mut self, enabled: bool) -> Self {
        self.immediate_delivery = enabled;
        self
    }

    /// Check the configuration for values the engine cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.batch_size == 0 {
            return Err(EngineError::Configuration(
                "batch_size must be at least 1".into(),
            ));
        }
        if self.max_concurrent_sends == 0 {
            return Err(EngineError::Configuration(
                "max_concurrent_sends must be at least 1".into(),
            ));
        }
        if self.send_timeout.is_zero() {
            return Err(EngineError::Configuration(
                "send_timeout must be greater than zero".into(),
            ));
        }
        if self.stale_claim_after <= self.send_timeout {
            return Err(EngineError::Configuration(format!(
                "stale_claim_after ({:?}) must exceed send_timeout ({:?})",
                self.stale_claim_after, self.send_timeout
            )));
        }
        Ok(())
    }
}
