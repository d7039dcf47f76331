//! Axum control surface for the sentinel pipeline.
//!
//! This crate provides:
//! - `/control/start`, `/control/stop` and `/status` over a [`PipelineController`]
//! - A local `/protection` alert receiver
//! - Prometheus metrics
//!
//! [`PipelineController`]: sentinel_pipeline::PipelineController

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
