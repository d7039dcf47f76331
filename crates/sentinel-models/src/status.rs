//! Pipeline lifecycle state and control-surface results.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline controller lifecycle: `Idle -> Running -> Stopping -> Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    #[default]
    Idle,
    Running,
    Stopping,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Running => "running",
            PipelineState::Stopping => "stopping",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, PipelineState::Running)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot returned by the controller's `status()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct PipelineStatus {
    pub running: bool,
    pub state: PipelineState,
    pub frames_captured: u64,
    pub frames_sampled: u64,
    pub detector_faults: u64,
    pub alerts_emitted: u64,
    /// Alerts discarded because the dispatch queue was full.
    pub alerts_dropped: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_detection: Option<DateTime<Utc>>,
}

/// Result of a `start()` or `stop()` call.
///
/// No-op outcomes are informational, never errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ControlOutcome {
    Started,
    AlreadyRunning,
    Stopped,
    AlreadyStopped,
}

impl ControlOutcome {
    /// True when the call did not change the lifecycle.
    pub fn is_noop(&self) -> bool {
        matches!(self, ControlOutcome::AlreadyRunning | ControlOutcome::AlreadyStopped)
    }

    /// `success` for transitions, `info` for no-ops.
    pub fn status_str(&self) -> &'static str {
        if self.is_noop() {
            "info"
        } else {
            "success"
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ControlOutcome::Started => "Video processing started",
            ControlOutcome::AlreadyRunning => "Video processing is already running",
            ControlOutcome::Stopped => "Video processing stopped",
            ControlOutcome::AlreadyStopped => "Video processing is already stopped",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_status_strings() {
        assert_eq!(ControlOutcome::Started.status_str(), "success");
        assert_eq!(ControlOutcome::Stopped.status_str(), "success");
        assert_eq!(ControlOutcome::AlreadyRunning.status_str(), "info");
        assert_eq!(ControlOutcome::AlreadyStopped.status_str(), "info");
    }

    #[test]
    fn test_state_display() {
        assert_eq!(PipelineState::default(), PipelineState::Idle);
        assert_eq!(PipelineState::Stopping.to_string(), "stopping");
        assert!(PipelineState::Running.is_running());
        assert!(!PipelineState::Stopping.is_running());
    }
}
