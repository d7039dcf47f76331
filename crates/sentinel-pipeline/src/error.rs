//! Pipeline error types.

use thiserror::Error;

use sentinel_dispatch::DispatchError;
use sentinel_engine::EngineError;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The frame source cannot be opened or read. Fatal for the run.
    #[error("Frame source unavailable: {0}")]
    SourceUnavailable(String),

    /// A single inference call failed; the frame is treated as empty.
    #[error("Detector fault: {0}")]
    DetectorFault(String),

    /// Alert delivery failed; the alert decision stands.
    #[error("Dispatch fault: {0}")]
    DispatchFault(String),

    /// Malformed configuration. The pipeline never starts.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Decision engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn source_unavailable(msg: impl Into<String>) -> Self {
        Self::SourceUnavailable(msg.into())
    }

    pub fn detector_fault(msg: impl Into<String>) -> Self {
        Self::DetectorFault(msg.into())
    }

    pub fn config_invalid(msg: impl Into<String>) -> Self {
        Self::ConfigInvalid(msg.into())
    }

    /// Unrecoverable for the current run; must be reported, not swallowed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::SourceUnavailable(_) | PipelineError::ConfigInvalid(_)
        )
    }
}

impl From<DispatchError> for PipelineError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::InvalidConfig(msg) => PipelineError::ConfigInvalid(msg),
            DispatchError::Url(e) => PipelineError::ConfigInvalid(e.to_string()),
            other => PipelineError::DispatchFault(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(PipelineError::source_unavailable("no camera").is_fatal());
        assert!(PipelineError::config_invalid("stride 0").is_fatal());
        assert!(!PipelineError::detector_fault("timeout").is_fatal());
        assert!(!PipelineError::DispatchFault("503".into()).is_fatal());
    }

    #[test]
    fn test_dispatch_error_mapping() {
        let err: PipelineError = DispatchError::invalid_config("bad location").into();
        assert!(matches!(err, PipelineError::ConfigInvalid(_)));

        let err: PipelineError = DispatchError::Closed.into();
        assert!(matches!(err, PipelineError::DispatchFault(_)));
    }
}
