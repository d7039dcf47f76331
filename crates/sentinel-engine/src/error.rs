//! Decision engine error types.

use sentinel_models::ClassId;
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Confidence {confidence} for class {class_id} is outside [0, 1]")]
    ConfidenceOutOfRange { class_id: ClassId, confidence: f64 },

    #[error("Invalid alert policy: {0}")]
    InvalidPolicy(String),
}

impl EngineError {
    pub fn invalid_policy(msg: impl Into<String>) -> Self {
        Self::InvalidPolicy(msg.into())
    }

    /// True when the caller handed the engine a malformed batch.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, EngineError::ConfidenceOutOfRange { .. })
    }
}
