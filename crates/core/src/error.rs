use thiserror::Error;

use crate::delivery::DeliveryStatus;

/// Rejection of endpoint, event, or policy configuration.
///
/// Raised at creation/construction time so that invalid configuration never
/// reaches the delivery pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),

    #[error("endpoint must subscribe to at least one event pattern")]
    NoPatterns,

    #[error("invalid event pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid event type {event_type:?}: {reason}")]
    InvalidEventType { event_type: String, reason: String },

    #[error("tenant id must not be empty")]
    EmptyTenant,

    #[error("invalid retry policy: {0}")]
    InvalidRetryPolicy(String),

    #[error("payload could not be serialized: {0}")]
    Payload(String),
}

/// An attempted delivery status change that the state machine does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid delivery transition from {from} to {to}")]
pub struct TransitionError {
    pub from: DeliveryStatus,
    pub to: DeliveryStatus,
}
