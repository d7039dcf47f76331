//! Application state.

use std::sync::Arc;

use sentinel_dispatch::{ClassCatalog, DispatchConfig, HttpAlertDispatcher};
use sentinel_pipeline::{
    DetectorConfig, DirectorySourceProvider, HttpDetector, PipelineConfig, PipelineController,
};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub controller: Arc<PipelineController>,
}

impl AppState {
    pub fn new(config: ApiConfig, controller: Arc<PipelineController>) -> Self {
        Self { config, controller }
    }

    /// Build the pipeline from environment configuration.
    ///
    /// Any invalid setting fails here, before the server binds.
    pub fn from_env(config: ApiConfig) -> anyhow::Result<Self> {
        let pipeline_config = PipelineConfig::from_env()?;
        let provider = DirectorySourceProvider::from_env()?;
        let detector = HttpDetector::new(DetectorConfig::from_env()?)?;
        let dispatcher = HttpAlertDispatcher::new(DispatchConfig::from_env()?, ClassCatalog::default())?;

        let controller = PipelineController::new(
            pipeline_config,
            Arc::new(provider),
            Arc::new(detector),
            Arc::new(dispatcher),
        )?;

        Ok(Self::new(config, Arc::new(controller)))
    }
}
