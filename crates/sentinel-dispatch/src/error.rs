//! Dispatch error types.

use thiserror::Error;

pub type DispatchResult<T> = Result<T, DispatchError>;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Invalid dispatch configuration: {0}")]
    InvalidConfig(String),

    #[error("Alert endpoint rejected request with status {status}")]
    Rejected { status: u16 },

    #[error("Dispatch queue is closed")]
    Closed,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl DispatchError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Check if error is transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            DispatchError::Network(_) => true,
            DispatchError::Rejected { status } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
