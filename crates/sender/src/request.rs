use async_trait::async_trait;

use hookwire_core::{DeliveryId, DeliveryOutcome, WebhookSecret};

use crate::error::SendError;

/// Header carrying the delivery id, for recipient-side deduplication.
pub const DELIVERY_ID_HEADER: &str = "X-Webhook-Id";
/// Header carrying the event type.
pub const EVENT_HEADER: &str = "X-Webhook-Event";

/// Everything needed to perform one signed POST.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub delivery_id: DeliveryId,
    pub event_type: String,
    pub url: String,
    /// Exact bytes to send and sign.
    pub payload: String,
    pub secret: WebhookSecret,
    /// Signing time, unix seconds.
    pub timestamp: i64,
}

/// Response from the endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResponse {
    pub status: u16,
    /// Response body, truncated for error reporting.
    pub body: String,
}

impl SendResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs a signed webhook POST.
///
/// Implementations must be `Send + Sync`; one sender is shared by every
/// worker.
#[async_trait]
pub trait Sender: Send + Sync {
    async fn send(&self, request: &OutboundRequest) -> Result<SendResponse, SendError>;
}

/// Classify a send result into the outcome recorded on the delivery.
pub fn outcome_of(result: &Result<SendResponse, SendError>) -> DeliveryOutcome {
    match result {
        Ok(resp) if resp.is_success() => DeliveryOutcome::Delivered {
            status_code: resp.status,
        },
        Ok(resp) => {
            let error = if resp.body.is_empty() {
                format!("HTTP {}", resp.status)
            } else {
                format!("HTTP {}: {}", resp.status, resp.body)
            };
            DeliveryOutcome::Failed {
                status_code: Some(resp.status),
                error,
            }
        }
        Err(e) => DeliveryOutcome::failed(e.to_string()),
    }
}
