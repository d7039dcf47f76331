//! Start/stop handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use sentinel_models::ControlOutcome;

use crate::error::ApiResult;
use crate::state::AppState;

/// `{status: "success" | "info", message}`
#[derive(Debug, Serialize)]
pub struct ControlResponse {
    pub status: &'static str,
    pub message: &'static str,
}

impl From<ControlOutcome> for ControlResponse {
    fn from(outcome: ControlOutcome) -> Self {
        Self {
            status: outcome.status_str(),
            message: outcome.message(),
        }
    }
}

pub async fn start_processing(State(state): State<AppState>) -> ApiResult<Json<ControlResponse>> {
    let outcome = state.controller.start().await?;
    Ok(Json(outcome.into()))
}

pub async fn stop_processing(State(state): State<AppState>) -> Json<ControlResponse> {
    Json(state.controller.stop().await.into())
}
