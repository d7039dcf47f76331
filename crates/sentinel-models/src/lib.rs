//! Shared data models for the Sentinel alert pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Detections produced by the object-detection model
//! - Alert events emitted by the decision engine
//! - Pipeline lifecycle state and control results

pub mod alert;
pub mod detection;
pub mod status;

// Re-export common types
pub use alert::{AlertEvent, AlertKind, GeoLocation};
pub use detection::{BoundingBox, ClassId, ClassIdParseError, Detection};
pub use status::{ControlOutcome, PipelineState, PipelineStatus};
