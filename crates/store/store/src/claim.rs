use std::fmt;

use hookwire_core::{DeliveryStatus, WebhookDelivery, WebhookEndpoint};

/// Result of trying to claim one delivery for sending.
#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    /// The delivery moved to QUEUED and the claim is committed. The caller
    /// now owns the send attempt and must record its outcome.
    Claimed {
        delivery: WebhookDelivery,
        endpoint: WebhookEndpoint,
    },
    /// The endpoint can no longer receive this delivery; it was cancelled
    /// without a send.
    Cancelled {
        delivery: WebhookDelivery,
        reason: CancelReason,
    },
    /// The row is not in a claimable state, or not yet due.
    NotClaimable { status: DeliveryStatus },
    /// Another worker holds the row lock.
    Contended,
    NotFound,
}

impl ClaimOutcome {
    pub fn is_claimed(&self) -> bool {
        matches!(self, Self::Claimed { .. })
    }
}

/// Why a claim ended in cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    EndpointInactive,
    NotSubscribed,
    EndpointMissing,
}

impl CancelReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EndpointInactive => "endpoint is inactive",
            Self::NotSubscribed => "endpoint is no longer subscribed to this event",
            Self::EndpointMissing => "endpoint no longer exists",
        }
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decide whether a claimed delivery must be cancelled instead of sent.
pub fn cancel_reason(
    endpoint: Option<&WebhookEndpoint>,
    delivery: &WebhookDelivery,
) -> Option<CancelReason> {
    match endpoint {
        None => Some(CancelReason::EndpointMissing),
        Some(ep) if !ep.active => Some(CancelReason::EndpointInactive),
        Some(ep) if !ep.is_subscribed_to(&delivery.event_type) => {
            Some(CancelReason::NotSubscribed)
        }
        Some(_) => None,
    }
}
