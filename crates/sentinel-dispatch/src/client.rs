//! HTTP alert dispatcher.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use sentinel_models::{AlertEvent, GeoLocation};

use crate::catalog::ClassCatalog;
use crate::dispatcher::AlertDispatcher;
use crate::error::{DispatchError, DispatchResult};

/// Format used for the `timestamp` field of alert payloads.
const ALERT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Base URL of the alert API; alerts go to `{base}/protection`.
    pub base_url: Url,
    /// Camera identifier sent as `user_id`
    pub camera_id: String,
    /// Camera location sent with every alert
    pub location: GeoLocation,
    /// HTTP request timeout
    pub timeout: Duration,
}

impl DispatchConfig {
    pub fn new(base_url: &str, camera_id: impl Into<String>) -> DispatchResult<Self> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            camera_id: camera_id.into(),
            location: GeoLocation::default(),
            timeout: Duration::from_secs(10),
        })
    }

    /// Create config from environment variables.
    pub fn from_env() -> DispatchResult<Self> {
        let base_url = std::env::var("API_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());
        let camera_id = std::env::var("CAMERA_ID").unwrap_or_else(|_| "CAM_001".to_string());
        let location = match std::env::var("DEFAULT_LOCATION") {
            Ok(raw) => parse_location(&raw)?,
            Err(_) => GeoLocation::default(),
        };
        let timeout = Duration::from_secs(
            std::env::var("DISPATCH_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
        );

        Ok(Self {
            base_url: Url::parse(&base_url)?,
            camera_id,
            location,
            timeout,
        })
    }

    /// `{base}/{endpoint}`, keeping any path prefix of the base URL.
    fn endpoint(&self, endpoint: &str) -> DispatchResult<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{endpoint}"))?)
    }
}

/// Parse a `lat,lon` pair.
pub(crate) fn parse_location(raw: &str) -> DispatchResult<GeoLocation> {
    let (lat, lon) = raw
        .split_once(',')
        .ok_or_else(|| DispatchError::invalid_config(format!("location '{raw}' must be 'lat,lon'")))?;
    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|_| DispatchError::invalid_config(format!("invalid latitude '{lat}'")))?;
    let lon: f64 = lon
        .trim()
        .parse()
        .map_err(|_| DispatchError::invalid_config(format!("invalid longitude '{lon}'")))?;
    let location = GeoLocation::new(lat, lon);
    if !location.is_valid() {
        return Err(DispatchError::invalid_config(format!("location '{raw}' is out of range")));
    }
    Ok(location)
}

/// JSON body posted to the protection endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub location: GeoLocation,
    pub message: String,
    pub emergency_type: String,
    pub user_id: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection_count: Option<u32>,
}

/// JSON body posted to the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub status: String,
    pub timestamp: String,
    pub camera_id: String,
}

/// Posts alerts to `{API_URL}/protection` and lifecycle updates to `{API_URL}/status`.
pub struct HttpAlertDispatcher {
    http: reqwest::Client,
    config: DispatchConfig,
    catalog: ClassCatalog,
    protection_url: Url,
    status_url: Url,
}

impl HttpAlertDispatcher {
    pub fn new(config: DispatchConfig, catalog: ClassCatalog) -> DispatchResult<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        let protection_url = config.endpoint("protection")?;
        let status_url = config.endpoint("status")?;

        Ok(Self {
            http,
            config,
            catalog,
            protection_url,
            status_url,
        })
    }

    pub fn catalog(&self) -> &ClassCatalog {
        &self.catalog
    }

    /// Build the payload for an event.
    pub fn payload_for(&self, event: &AlertEvent) -> AlertPayload {
        let info = self.catalog.get(event.class_id);
        AlertPayload {
            location: self.config.location,
            message: self.catalog.message_for(event),
            emergency_type: info.emergency_type.clone(),
            user_id: self.config.camera_id.clone(),
            timestamp: event.occurred_at.format(ALERT_TIMESTAMP_FORMAT).to_string(),
            detection_count: event.count(),
        }
    }

    /// Deliver one alert, surfacing the failure cause.
    pub async fn deliver(&self, event: &AlertEvent) -> DispatchResult<()> {
        let payload = self.payload_for(event);
        let response = self
            .http
            .post(self.protection_url.clone())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(DispatchError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    /// Post a lifecycle update.
    pub async fn deliver_status(&self, status: &str) -> DispatchResult<()> {
        let payload = StatusPayload {
            status: status.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            camera_id: self.config.camera_id.clone(),
        };
        let response = self
            .http
            .post(self.status_url.clone())
            .json(&payload)
            .send()
            .await?;

        let code = response.status();
        if code != StatusCode::OK {
            return Err(DispatchError::Rejected {
                status: code.as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AlertDispatcher for HttpAlertDispatcher {
    async fn send(&self, event: &AlertEvent) -> bool {
        let start = Instant::now();
        match self.deliver(event).await {
            Ok(()) => {
                info!(
                    class_id = %event.class_id,
                    kind = %event.kind,
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Alert delivered: {}",
                    self.catalog.get(event.class_id).emergency_type
                );
                true
            }
            Err(e) => {
                warn!(
                    class_id = %event.class_id,
                    kind = %event.kind,
                    retryable = e.is_retryable(),
                    "Alert delivery failed: {}",
                    e
                );
                false
            }
        }
    }

    async fn send_status(&self, status: &str) -> bool {
        match self.deliver_status(status).await {
            Ok(()) => {
                debug!(status = %status, "Status update delivered");
                true
            }
            Err(e) => {
                warn!(status = %status, "Status update failed: {}", e);
                false
            }
        }
    }
}
