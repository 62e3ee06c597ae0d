//! Domain-level error taxonomy for onboardkit.

use onboardkit_store::StorageError;

use crate::transport::TransportError;

/// Errors produced while decoding an [`AnswerValue`](super::AnswerValue).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValueError {
    #[error("null is not a valid answer value")]
    Null,

    #[error("number {0} is not representable as a finite answer value")]
    NonFinite(String),
}

/// onboardkit errors.
#[derive(Debug, thiserror::Error)]
pub enum OnboardError {
    #[error("not configured: {0}")]
    NotConfigured(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("unexpected HTTP status {status}")]
    Http { status: u16 },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("invalid value: {0}")]
    Value(#[from] ValueError),

    #[error("delivery queue is shut down")]
    QueueClosed,
}

impl From<serde_json::Error> for OnboardError {
    fn from(err: serde_json::Error) -> Self {
        OnboardError::Decode(err.to_string())
    }
}

impl From<TransportError> for OnboardError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::InvalidRequest(msg) => OnboardError::InvalidRequest(msg),
            other => OnboardError::TransportFailure(other.to_string()),
        }
    }
}

/// Result type for onboardkit operations.
pub type Result<T> = std::result::Result<T, OnboardError>;
