//! Object-detection model contract and hosted-inference client.
//!
//! The hosted endpoint receives a base64-encoded JPEG as a form body and
//! answers with centre-based predictions:
//!
//! ```text
//! POST {DETECTOR_URL}/{MODEL_ID}?api_key=...&confidence=50
//! {"predictions": [{"x": 320, "y": 240, "width": 50, "height": 80,
//!                   "confidence": 0.91, "class_id": 1, "class": "guns"}]}
//! ```

use std::io::Cursor;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::ImageOutputFormat;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use sentinel_models::{BoundingBox, ClassId, Detection};

use crate::config::env_parse;
use crate::error::{PipelineError, PipelineResult};
use crate::frame::Frame;
use crate::metrics::record_detector_latency;

/// Runs the model on one frame.
///
/// Implementations must not mutate the frame and return an empty list, not
/// an error, when nothing is detected.
#[async_trait]
pub trait Detector: Send + Sync {
    async fn infer(&self, frame: &Frame) -> PipelineResult<Vec<Detection>>;
}

/// Hosted detector configuration.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Inference service base URL
    pub base_url: Url,
    /// Model path segment (e.g. `weapons_v2_adrian/4`)
    pub model_id: String,
    /// API key sent as a query parameter
    pub api_key: String,
    /// Predictions below this confidence are discarded
    pub confidence_threshold: f64,
    /// JPEG quality used to upload frames
    pub jpeg_quality: u8,
    /// HTTP request timeout
    pub timeout: Duration,
}

impl DetectorConfig {
    pub fn new(base_url: &str, model_id: impl Into<String>) -> PipelineResult<Self> {
        Ok(Self {
            base_url: Url::parse(base_url)
                .map_err(|e| PipelineError::config_invalid(format!("detector url: {e}")))?,
            model_id: model_id.into(),
            api_key: String::new(),
            confidence_threshold: 0.5,
            jpeg_quality: 85,
            timeout: Duration::from_secs(30),
        })
    }

    /// Create config from environment variables.
    pub fn from_env() -> PipelineResult<Self> {
        let base_url =
            std::env::var("DETECTOR_URL").unwrap_or_else(|_| "https://detect.roboflow.com".to_string());
        let model_id = std::env::var("MODEL_ID").unwrap_or_else(|_| "weapons_v2_adrian/4".to_string());

        let mut config = Self::new(&base_url, model_id)?;
        config.api_key = std::env::var("DETECTOR_API_KEY").unwrap_or_default();
        config.confidence_threshold = env_parse("CONFIDENCE_THRESHOLD", 0.5)?;
        config.jpeg_quality = env_parse("DETECTOR_JPEG_QUALITY", 85)?;
        config.timeout = Duration::from_secs(env_parse("DETECTOR_TIMEOUT_SECS", 30)?);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(PipelineError::config_invalid(format!(
                "confidence threshold must be in [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(PipelineError::config_invalid("jpeg quality must be between 1 and 100"));
        }
        if self.model_id.trim().is_empty() {
            return Err(PipelineError::config_invalid("model id must not be empty"));
        }
        Ok(())
    }

    fn model_url(&self) -> PipelineResult<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let model = self.model_id.trim_matches('/');
        Url::parse(&format!("{base}/{model}"))
            .map_err(|e| PipelineError::config_invalid(format!("model url: {e}")))
    }
}

#[derive(Debug, Deserialize)]
struct InferenceResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    confidence: f64,
    class_id: u32,
}

impl Prediction {
    fn into_detection(self) -> Detection {
        Detection::new(
            ClassId(self.class_id),
            self.confidence,
            BoundingBox::from_center(self.x, self.y, self.width, self.height),
        )
    }
}

/// Detector backed by a hosted inference HTTP endpoint.
pub struct HttpDetector {
    http: reqwest::Client,
    config: DetectorConfig,
    model_url: Url,
}

impl HttpDetector {
    pub fn new(config: DetectorConfig) -> PipelineResult<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PipelineError::config_invalid(format!("detector http client: {e}")))?;
        let model_url = config.model_url()?;

        Ok(Self {
            http,
            config,
            model_url,
        })
    }

    /// JPEG-encode and base64 the frame off the async executor.
    async fn encode(&self, frame: &Frame) -> PipelineResult<String> {
        let image = frame.image.clone();
        let quality = self.config.jpeg_quality;
        tokio::task::spawn_blocking(move || {
            let mut buf = Cursor::new(Vec::new());
            image
                .write_to(&mut buf, ImageOutputFormat::Jpeg(quality))
                .map(|_| STANDARD.encode(buf.into_inner()))
        })
        .await
        .map_err(|e| PipelineError::detector_fault(format!("encoder task failed: {e}")))?
        .map_err(|e| PipelineError::detector_fault(format!("jpeg encode failed: {e}")))
    }
}

#[async_trait]
impl Detector for HttpDetector {
    async fn infer(&self, frame: &Frame) -> PipelineResult<Vec<Detection>> {
        let start = Instant::now();
        let body = self.encode(frame).await?;

        // Server-side filter takes a percentage
        let confidence = ((self.config.confidence_threshold * 100.0).round() as u32).to_string();
        let response = self
            .http
            .post(self.model_url.clone())
            .query(&[
                ("api_key", self.config.api_key.as_str()),
                ("confidence", confidence.as_str()),
            ])
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| PipelineError::detector_fault(format!("inference request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::detector_fault(format!(
                "inference endpoint returned {status}"
            )));
        }

        let parsed: InferenceResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::detector_fault(format!("malformed inference response: {e}")))?;

        let threshold = self.config.confidence_threshold;
        let detections: Vec<Detection> = parsed
            .predictions
            .into_iter()
            .filter(|p| p.confidence >= threshold)
            .map(Prediction::into_detection)
            .collect();

        let elapsed = start.elapsed();
        record_detector_latency(elapsed.as_secs_f64());
        debug!(
            frame = frame.index,
            detections = detections.len(),
            latency_ms = elapsed.as_millis() as u64,
            "Inference complete"
        );
        Ok(detections)
    }
}
