use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TransitionError;
use crate::retry::RetryPolicy;
use crate::types::{DeliveryId, EndpointId, TenantId};

/// Lifecycle state of a [`WebhookDelivery`].
///
/// ```text
/// PENDING ──► QUEUED ──► SUCCESS | RETRYING | FAILED
///    │          ▲  │
///    │          │  └──► CANCELLED
///    ▼          │
/// CANCELLED ◄─ RETRYING
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Queued,
    Success,
    Retrying,
    Failed,
    Cancelled,
}

impl DeliveryStatus {
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Queued,
        Self::Success,
        Self::Retrying,
        Self::Failed,
        Self::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Success => "success",
            Self::Retrying => "retrying",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Cancelled)
    }

    /// States the queue sweep may pick up once `next_attempt_at` has elapsed.
    pub fn is_claimable(self) -> bool {
        matches!(self, Self::Pending | Self::Retrying)
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        use DeliveryStatus::{Cancelled, Failed, Pending, Queued, Retrying, Success};
        matches!(
            (self, next),
            (Pending | Retrying, Queued | Cancelled)
                | (Queued, Success | Retrying | Failed | Cancelled)
        )
    }

    /// Check a transition against the state machine.
    pub fn check_transition(self, next: Self) -> Result<(), TransitionError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(TransitionError {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown status string read back from storage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown delivery status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for DeliveryStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_owned()))
    }
}

/// One event destined for one endpoint, plus its attempt history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookDelivery {
    pub id: DeliveryId,
    pub endpoint_id: EndpointId,
    pub tenant_id: TenantId,
    pub event_type: String,
    /// Raw JSON body captured at dispatch. Never rewritten; every attempt
    /// sends and signs exactly these bytes.
    pub payload: String,
    pub status: DeliveryStatus,
    pub attempts: u32,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_status_code: Option<u16>,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl WebhookDelivery {
    /// Whether the sweep may claim this delivery at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status.is_claimable() && self.next_attempt_at.is_some_and(|at| at <= now)
    }

    /// Claim the delivery for a send attempt.
    pub fn mark_queued(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.status.check_transition(DeliveryStatus::Queued)?;
        self.status = DeliveryStatus::Queued;
        self.claimed_at = Some(now);
        Ok(())
    }

    /// Cancel without sending. Attempts are left untouched.
    pub fn mark_cancelled(
        &mut self,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.status.check_transition(DeliveryStatus::Cancelled)?;
        self.status = DeliveryStatus::Cancelled;
        self.next_attempt_at = None;
        self.last_error = Some(reason.into());
        self.processed_at = Some(now);
        Ok(())
    }

    /// Compute the state change for a send outcome on a claimed delivery.
    pub fn resolve_outcome(
        &self,
        outcome: &DeliveryOutcome,
        policy: &RetryPolicy,
        now: DateTime<Utc>,
    ) -> Result<OutcomeUpdate, TransitionError> {
        let attempts = self.attempts.saturating_add(1);
        let update = match outcome {
            DeliveryOutcome::Delivered { status_code } => OutcomeUpdate {
                status: DeliveryStatus::Success,
                attempts,
                next_attempt_at: None,
                last_error: None,
                last_status_code: Some(*status_code),
                processed_at: Some(now),
            },
            DeliveryOutcome::Failed { status_code, error } => {
                if policy.is_exhausted(attempts) {
                    OutcomeUpdate {
                        status: DeliveryStatus::Failed,
                        attempts,
                        next_attempt_at: None,
                        last_error: Some(error.clone()),
                        last_status_code: *status_code,
                        processed_at: Some(now),
                    }
                } else {
                    let delay = chrono::Duration::from_std(policy.delay_for(attempts))
                        .unwrap_or(chrono::Duration::MAX);
                    OutcomeUpdate {
                        status: DeliveryStatus::Retrying,
                        attempts,
                        next_attempt_at: Some(
                            now.checked_add_signed(delay).unwrap_or(DateTime::<Utc>::MAX_UTC),
                        ),
                        last_error: Some(error.clone()),
                        last_status_code: *status_code,
                        processed_at: None,
                    }
                }
            }
        };
        self.status.check_transition(update.status)?;
        Ok(update)
    }

    /// Apply a previously resolved outcome.
    pub fn apply_outcome(&mut self, update: &OutcomeUpdate) -> Result<(), TransitionError> {
        self.status.check_transition(update.status)?;
        self.status = update.status;
        self.attempts = update.attempts;
        self.next_attempt_at = update.next_attempt_at;
        self.last_error.clone_from(&update.last_error);
        self.last_status_code = update.last_status_code;
        self.processed_at = update.processed_at;
        Ok(())
    }
}

/// Input to the dispatch transaction: one row per matching endpoint.
#[derive(Debug, Clone)]
pub struct NewDelivery {
    pub endpoint_id: EndpointId,
    pub tenant_id: TenantId,
    pub event_type: String,
    pub payload: String,
}

impl NewDelivery {
    /// Materialise a fresh PENDING delivery that is due immediately.
    pub fn into_delivery(self, now: DateTime<Utc>) -> WebhookDelivery {
        WebhookDelivery {
            id: DeliveryId::generate(),
            endpoint_id: self.endpoint_id,
            tenant_id: self.tenant_id,
            event_type: self.event_type,
            payload: self.payload,
            status: DeliveryStatus::Pending,
            attempts: 0,
            next_attempt_at: Some(now),
            last_error: None,
            last_status_code: None,
            created_at: now,
            claimed_at: None,
            processed_at: None,
        }
    }
}

/// Result of a single send attempt as reported by the sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The endpoint answered with a 2xx status.
    Delivered { status_code: u16 },
    /// Non-2xx response, transport error, or timeout.
    Failed {
        status_code: Option<u16>,
        error: String,
    },
}

impl DeliveryOutcome {
    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            status_code: None,
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Fields written when an outcome is recorded for a QUEUED delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeUpdate {
    pub status: DeliveryStatus,
    pub attempts: u32,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_status_code: Option<u16>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Query parameters for listing deliveries.
#[derive(Debug, Clone)]
pub struct DeliveryFilter {
    pub tenant_id: Option<TenantId>,
    pub endpoint_id: Option<EndpointId>,
    pub status: Option<DeliveryStatus>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for DeliveryFilter {
    fn default() -> Self {
        Self {
            tenant_id: None,
            endpoint_id: None,
            status: None,
            limit: 100,
            offset: 0,
        }
    }
}

impl DeliveryFilter {
    #[must_use]
    pub fn with_tenant(mut self, tenant_id: impl Into<TenantId>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint_id: EndpointId) -> Self {
        self.endpoint_id = Some(endpoint_id);
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: DeliveryStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn matches(&self, delivery: &WebhookDelivery) -> bool {
        self.tenant_id.as_ref().is_none_or(|t| *t == delivery.tenant_id)
            && self.endpoint_id.is_none_or(|e| e == delivery.endpoint_id)
            && self.status.is_none_or(|s| s == delivery.status)
    }
}

/// Per-endpoint delivery counts, aggregated on demand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStats {
    pub total: u64,
    pub pending: u64,
    pub queued: u64,
    pub retrying: u64,
    pub success: u64,
    pub failed: u64,
    pub cancelled: u64,
}

impl DeliveryStats {
    pub fn add(&mut self, status: DeliveryStatus, count: u64) {
        self.total += count;
        let slot = match status {
            DeliveryStatus::Pending => &mut self.pending,
            DeliveryStatus::Queued => &mut self.queued,
            DeliveryStatus::Retrying => &mut self.retrying,
            DeliveryStatus::Success => &mut self.success,
            DeliveryStatus::Failed => &mut self.failed,
            DeliveryStatus::Cancelled => &mut self.cancelled,
        };
        *slot += count;
    }

    /// Deliveries that have not reached a terminal state.
    pub fn outstanding(&self) -> u64 {
        self.pending + self.queued + self.retrying
    }
}
