use thiserror::Error;

/// Errors raised by an [`super::EmbeddingProvider`].
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {reason}")]
    RequestFailed { reason: String },

    #[error("embedding provider returned status {status}: {body}")]
    BadStatus { status: u16, body: String },

    #[error("invalid embedding response: {reason}")]
    InvalidResponse { reason: String },

    #[error("embedding provider unavailable: {reason}")]
    Unavailable { reason: String },
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(err: reqwest::Error) -> Self {
        EmbeddingError::RequestFailed {
            reason: err.to_string(),
        }
    }
}

/// Convenience result type for provider calls.
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;
