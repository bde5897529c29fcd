use hookwire_core::{DeliveryId, DeliveryStatus, TransitionError};
use thiserror::Error;

/// Errors from delivery store and endpoint registry operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// An outcome was recorded for a delivery that is no longer QUEUED.
    #[error("delivery {id} is {status}, expected queued")]
    NotQueued { id: DeliveryId, status: DeliveryStatus },

    /// The delivery was re-claimed since the caller's claim.
    #[error("claim on delivery {id} was superseded")]
    ClaimSuperseded { id: DeliveryId },

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let id = DeliveryId::generate();
        let err = StoreError::NotQueued {
            id,
            status: DeliveryStatus::Success,
        };
        assert_eq!(err.to_string(), format!("delivery {id} is success, expected queued"));

        let err: StoreError = TransitionError {
            from: DeliveryStatus::Failed,
            to: DeliveryStatus::Queued,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "invalid delivery transition from failed to queued"
        );
    }
}
