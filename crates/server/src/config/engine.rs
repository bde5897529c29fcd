use std::time::Duration;

use hookwire_core::{Backoff, DEFAULT_MAX_ATTEMPTS, DEFAULT_SCHEDULE, RetryPolicy};
use hookwire_engine::EngineConfig;
use serde::Deserialize;

use crate::error::ServerError;

/// Engine tuning. Unset values keep the engine defaults.
#[derive(Debug, Default, Deserialize)]
pub struct EngineSection {
    /// Due deliveries per sweep.
    pub batch_size: Option<usize>,
    /// Upper bound on one send attempt, in seconds.
    pub send_timeout_seconds: Option<u64>,
    /// Age in seconds after which an unresolved claim counts as a failed
    /// attempt.
    pub stale_claim_after_seconds: Option<u64>,
    /// Maximum sends in flight per sweep.
    pub max_concurrent_sends: Option<usize>,
    /// Send new deliveries right after dispatch instead of waiting for a
    /// sweep.
    pub immediate_delivery: Option<bool>,
    /// Retry backoff and attempt ceiling.
    #[serde(default)]
    pub retry: RetrySection,
}

/// Retry policy settings.
///
/// ```toml
/// [engine.retry]
/// strategy = "exponential"
/// base_seconds = 10
/// max_seconds = 3600
/// max_attempts = 8
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct RetrySection {
    /// `"schedule"` (default), `"exponential"`, or `"constant"`.
    pub strategy: Option<String>,
    /// Per-attempt delays for the `schedule` strategy. The last entry caps
    /// later attempts.
    pub schedule_seconds: Option<Vec<u64>>,
    /// First delay for `exponential`, the only delay for `constant`.
    pub base_seconds: Option<u64>,
    /// Cap for `exponential`.
    pub max_seconds: Option<u64>,
    /// Growth factor for `exponential`. Defaults to 2.
    pub multiplier: Option<f64>,
    /// Attempts before a delivery is marked failed.
    pub max_attempts: Option<u32>,
}

impl RetrySection {
    pub fn to_policy(&self) -> Result<RetryPolicy, ServerError> {
        let strategy = self.strategy.as_deref().unwrap_or("schedule");
        let backoff = match strategy {
            "schedule" => Backoff::Schedule(match &self.schedule_seconds {
                Some(secs) => secs.iter().copied().map(Duration::from_secs).collect(),
                None => DEFAULT_SCHEDULE.to_vec(),
            }),
            "exponential" => Backoff::Exponential {
                base: Duration::from_secs(self.require_base(strategy)?),
                max: Duration::from_secs(self.max_seconds.ok_or_else(|| {
                    ServerError::Config("engine.retry.max_seconds is required for exponential".into())
                })?),
                multiplier: self.multiplier.unwrap_or(2.0),
            },
            "constant" => Backoff::Constant(Duration::from_secs(self.require_base(strategy)?)),
            other => {
                return Err(ServerError::Config(format!(
                    "unknown retry strategy: {other}"
                )));
            }
        };
        let max_attempts = self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS);
        RetryPolicy::new(backoff, max_attempts).map_err(|e| ServerError::Config(e.to_string()))
    }

    fn require_base(&self, strategy: &str) -> Result<u64, ServerError> {
        self.base_seconds.ok_or_else(|| {
            ServerError::Config(format!(
                "engine.retry.base_seconds is required for {strategy}"
            ))
        })
    }
}

impl EngineSection {
    /// Map onto an [`EngineConfig`] and validate it.
    pub fn to_engine_config(&self) -> Result<EngineConfig, ServerError> {
        let mut config = EngineConfig::default().with_retry_policy(self.retry.to_policy()?);
        if let Some(batch) = self.batch_size {
            config = config.with_batch_size(batch);
        }
        if let Some(secs) = self.send_timeout_seconds {
            config = config.with_send_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.stale_claim_after_seconds {
            config = config.with_stale_claim_after(Duration::from_secs(secs));
        }
        if let Some(max) = self.max_concurrent_sends {
            config = config.with_max_concurrent_sends(max);
        }
        if let Some(enabled) = self.immediate_delivery {
            config = config.with_immediate_delivery(enabled);
        }
        config.validate()?;
        Ok(config)
    }
}
