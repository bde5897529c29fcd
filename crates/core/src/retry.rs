use std::time::Duration;

use crate::error::ValidationError;

/// Default retry delays: 30 s, 2 min, 10 min, then 1 h for every later
/// attempt.
pub const DEFAULT_SCHEDULE: [Duration; 4] = [
    Duration::from_secs(30),
    Duration::from_secs(2 * 60),
    Duration::from_secs(10 * 60),
    Duration::from_secs(60 * 60),
];

/// Default number of send attempts before a delivery is marked failed.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Curve used to compute the delay before the next attempt.
///
/// Every variant is non-decreasing in the attempt count once validated.
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    /// Explicit per-attempt delays. Attempts past the end of the list reuse
    /// the last entry, which therefore acts as the cap.
    Schedule(Vec<Duration>),
    /// Exponential backoff: `base * multiplier^(attempts - 1)`, clamped to
    /// `max`.
    Exponential {
        /// Delay after the first failed attempt.
        base: Duration,
        /// Upper bound on the computed delay.
        max: Duration,
        /// Factor applied on each successive attempt.
        multiplier: f64,
    },
    /// Same delay after every failed attempt.
    Constant(Duration),
}

impl Backoff {
    /// Delay after `attempts` recorded attempts (one-based).
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let index = attempts.saturating_sub(1);
        match self {
            Self::Schedule(delays) => {
                let i = usize::try_from(index).unwrap_or(usize::MAX);
                delays
                    .get(i)
                    .or_else(|| delays.last())
                    .copied()
                    .unwrap_or_default()
            }
            Self::Exponential {
                base,
                max,
                multiplier,
            } => {
                // Retry counts are small, the exponent saturates long before
                // wrapping matters.
                let exp = i32::try_from(index).unwrap_or(i32::MAX);
                let raw = base.as_secs_f64() * multiplier.powi(exp);
                let clamped = if raw.is_finite() {
                    raw.min(max.as_secs_f64())
                } else {
                    max.as_secs_f64()
                };
                Duration::try_from_secs_f64(clamped).unwrap_or(*max)
            }
            Self::Constant(delay) => *delay,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Schedule(delays) => {
                if delays.is_empty() {
                    return Err(ValidationError::InvalidRetryPolicy(
                        "backoff schedule must not be empty".into(),
                    ));
                }
                if delays.windows(2).any(|w| w[1] < w[0]) {
                    return Err(ValidationError::InvalidRetryPolicy(
                        "backoff schedule must be non-decreasing".into(),
                    ));
                }
                Ok(())
            }
            Self::Exponential {
                base,
                max,
                multiplier,
            } => {
                if !multiplier.is_finite() || *multiplier < 1.0 {
                    return Err(ValidationError::InvalidRetryPolicy(format!(
                        "multiplier must be a finite value >= 1.0, got {multiplier}"
                    )));
                }
                if base > max {
                    return Err(ValidationError::InvalidRetryPolicy(format!(
                        "base delay {base:?} exceeds max delay {max:?}"
                    )));
                }
                Ok(())
            }
            Self::Constant(_) => Ok(()),
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Schedule(DEFAULT_SCHEDULE.to_vec())
    }
}

/// Retry behaviour for failed delivery attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    backoff: Backoff,
    max_attempts: u32,
}

impl RetryPolicy {
    /// Build a validated policy.
    pub fn new(backoff: Backoff, max_attempts: u32) -> Result<Self, ValidationError> {
        if max_attempts == 0 {
            return Err(ValidationError::InvalidRetryPolicy(
                "max_attempts must be at least 1".into(),
            ));
        }
        backoff.validate()?;
        Ok(Self {
            backoff,
            max_attempts,
        })
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the next attempt, given the number of attempts already
    /// recorded.
    pub fn delay_for(&self, attempts: u32) -> Duration {
        self.backoff.delay_for(attempts)
    }

    /// Whether a delivery with `attempts` recorded attempts has hit the
    /// ceiling.
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff: Backoff::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}
