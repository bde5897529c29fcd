use std::time::Duration;

use thiserror::Error;

/// Transport-level failure of a send attempt.
///
/// A non-2xx response is not an error at this level; it is reported as a
/// [`SendResponse`](crate::SendResponse) with its status code.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("HTTP client error: {0}")]
    Client(String),
}

impl SendError {
    pub(crate) fn from_reqwest(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else if err.is_builder() {
            Self::InvalidRequest(err.to_string())
        } else {
            Self::Client(err.to_string())
        }
    }
}
