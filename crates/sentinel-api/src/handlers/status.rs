//! Pipeline status handlers.

use axum::extract::State;
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use sentinel_models::PipelineState;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub video_processing: bool,
    pub state: PipelineState,
    pub frames_captured: u64,
    pub frames_sampled: u64,
    pub detector_faults: u64,
    pub alerts_emitted: u64,
    pub alerts_dropped: u64,
    pub last_detection: Option<String>,
}

/// Current pipeline status.
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = state.controller.status();
    Json(StatusResponse {
        status: "online",
        video_processing: status.running,
        state: status.state,
        frames_captured: status.frames_captured,
        frames_sampled: status.frames_sampled,
        detector_faults: status.detector_faults,
        alerts_emitted: status.alerts_emitted,
        alerts_dropped: status.alerts_dropped,
        last_detection: status
            .last_detection
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
    })
}

/// Lifecycle update posted by a camera pipeline.
#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
    pub timestamp: String,
    pub camera_id: String,
}

#[derive(Debug, Serialize)]
pub struct ReceivedResponse {
    pub status: &'static str,
    pub timestamp: String,
}

/// Accept a status update from a pipeline (possibly this one).
pub async fn receive_status_update(Json(update): Json<StatusUpdate>) -> Json<ReceivedResponse> {
    info!(
        camera_id = %update.camera_id,
        status = %update.status,
        sent_at = %update.timestamp,
        "Camera status update"
    );
    Json(ReceivedResponse {
        status: "received",
        timestamp: Utc::now().to_rfc3339(),
    })
}
