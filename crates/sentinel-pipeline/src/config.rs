//! Pipeline configuration.

use std::str::FromStr;
use std::time::Duration;

use sentinel_dispatch::DEFAULT_QUEUE_CAPACITY;
use sentinel_engine::ClassPolicies;

use crate::error::{PipelineError, PipelineResult};

/// Alert policies used when `ALERT_POLICIES` is not set: a 2 second
/// debounce on each class of the weapons model.
pub const DEFAULT_ALERT_POLICIES: &str = "0=debounce:2,1=debounce:2,2=debounce:2";

/// Immutable pipeline configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Run detection on every N-th captured frame
    pub sampling_stride: u32,
    /// Factor applied to frames before inference, in (0, 1]
    pub processing_scale: f64,
    /// Cooperative pause between loop iterations
    pub loop_pause: Duration,
    /// Monitored classes and their alert modes
    pub policies: ClassPolicies,
    /// Pending alerts held before the oldest is dropped
    pub dispatch_queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sampling_stride: 1,
            processing_scale: 1.0,
            loop_pause: Duration::from_millis(10),
            policies: DEFAULT_ALERT_POLICIES.parse().unwrap_or_default(),
            dispatch_queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Read and parse an environment variable, rejecting malformed values.
pub(crate) fn env_parse<T: FromStr>(key: &str, default: T) -> PipelineResult<T> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| PipelineError::config_invalid(format!("{key}: cannot parse '{raw}'"))),
        _ => Ok(default),
    }
}

impl PipelineConfig {
    /// Create config from environment variables and validate it.
    pub fn from_env() -> PipelineResult<Self> {
        let policies = match std::env::var("ALERT_POLICIES") {
            Ok(raw) => raw.parse::<ClassPolicies>(),
            Err(_) => DEFAULT_ALERT_POLICIES.parse::<ClassPolicies>(),
        }
        .map_err(|e| PipelineError::config_invalid(format!("ALERT_POLICIES: {e}")))?;

        let config = Self {
            sampling_stride: env_parse("SAMPLING_STRIDE", 1)?,
            processing_scale: env_parse("PROCESSING_SCALE", 1.0)?,
            loop_pause: Duration::from_millis(env_parse("LOOP_PAUSE_MS", 10)?),
            policies,
            dispatch_queue_capacity: env_parse("DISPATCH_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.sampling_stride == 0 {
            return Err(PipelineError::config_invalid("sampling stride must be at least 1"));
        }
        if !(self.processing_scale > 0.0 && self.processing_scale <= 1.0) {
            return Err(PipelineError::config_invalid(format!(
                "processing scale must be in (0, 1], got {}",
                self.processing_scale
            )));
        }
        if self.dispatch_queue_capacity == 0 {
            return Err(PipelineError::config_invalid("dispatch queue capacity must be at least 1"));
        }
        for (class_id, mode) in self.policies.iter() {
            mode.validate()
                .map_err(|e| PipelineError::config_invalid(format!("class {class_id}: {e}")))?;
        }
        Ok(())
    }

    /// True when frames are downscaled before inference.
    pub fn downscales(&self) -> bool {
        self.processing_scale < 1.0
    }
}
