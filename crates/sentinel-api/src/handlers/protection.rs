//! Local alert receiver.
//!
//! Accepts the same payload the dispatcher sends, so one deployment can act
//! as its own alert sink.

use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::error::ApiResult;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Location {
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProtectionAlert {
    #[validate(nested)]
    pub location: Location,
    #[validate(length(min = 1, max = 1000))]
    pub message: String,
    #[validate(length(min = 1, max = 64))]
    pub emergency_type: String,
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection_count: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ProtectionResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: String,
    pub details: ProtectionAlert,
}

pub async fn handle_protection(Json(alert): Json<ProtectionAlert>) -> ApiResult<Json<ProtectionResponse>> {
    alert.validate()?;

    info!(
        user_id = %alert.user_id,
        emergency_type = %alert.emergency_type,
        detection_count = alert.detection_count,
        "Protection alert received: {}", alert.message
    );

    Ok(Json(ProtectionResponse {
        status: "received",
        message: "Protection alert registered",
        timestamp: Utc::now().to_rfc3339(),
        details: alert,
    }))
}
