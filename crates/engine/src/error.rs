use hookwire_core::{DeliveryId, TransitionError, ValidationError};
use hookwire_store::StoreError;
use thiserror::Error;

/// Errors returned by [`WebhookEngine`](crate::WebhookEngine) operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An error occurred in the delivery store or endpoint registry.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Endpoint, event, or payload input was rejected.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A delivery status change outside the state machine was attempted.
    #[error("state machine violation: {0}")]
    Transition(#[from] TransitionError),

    /// The send completed but its outcome could not be recorded.
    #[error("failed to record outcome for delivery {id}: {source}")]
    RecordOutcome { id: DeliveryId, source: StoreError },

    /// The engine was misconfigured (e.g. missing required components).
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("not found: {0}")]
    NotFound(String),
}
