//! Frame-processing pipeline.
//!
//! This crate provides:
//! - Pipeline configuration loaded from the environment
//! - Frame source / sink contracts and a directory-of-images source
//! - The detector contract and a hosted-inference HTTP detector
//! - Frame sampling and bounding-box rescaling
//! - The [`PipelineController`] driving frame -> detect -> decide -> dispatch
//!   with an `Idle -> Running -> Stopping -> Idle` lifecycle

pub mod config;
pub mod controller;
pub mod detector;
pub mod error;
pub mod frame;
pub mod logging;
pub mod metrics;
pub mod source;

pub use config::PipelineConfig;
pub use controller::PipelineController;
pub use detector::{Detector, DetectorConfig, HttpDetector};
pub use error::{PipelineError, PipelineResult};
pub use frame::{rescale_detections, Frame, FrameSampler};
pub use logging::RunLogger;
pub use source::{
    DirectoryFrameSource, DirectorySourceProvider, FrameSink, FrameSinkProvider, FrameSource,
    FrameSourceProvider, NullSink,
};
