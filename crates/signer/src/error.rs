use thiserror::Error;

/// Failure to produce a signature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    #[error("invalid HMAC key: {0}")]
    InvalidKey(String),
}

/// Reason a signature was rejected by the verifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// Timestamp too far from the verifier's clock.
    #[error("timestamp is {skew_secs}s from now, outside the {tolerance_secs}s tolerance")]
    OutsideTolerance { skew_secs: u64, tolerance_secs: u64 },

    #[error("signature is not valid hex")]
    Malformed,

    #[error("signature does not match")]
    Mismatch,
}
