//! Route tests against a controller with in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use image::RgbImage;
use serde_json::{json, Value};
use tower::ServiceExt;

use sentinel_api::{create_router, ApiConfig, AppState};
use sentinel_dispatch::AlertDispatcher;
use sentinel_models::{AlertEvent, Detection};
use sentinel_pipeline::{
    Detector, Frame, FrameSource, FrameSourceProvider, PipelineConfig, PipelineController,
    PipelineError, PipelineResult,
};

struct EndlessSource {
    index: u64,
}

#[async_trait]
impl FrameSource for EndlessSource {
    async fn next_frame(&mut self) -> PipelineResult<Option<Frame>> {
        tokio::time::sleep(Duration::from_millis(2)).await;
        self.index += 1;
        Ok(Some(Frame::new(self.index, Utc::now(), RgbImage::new(4, 4))))
    }

    fn close(&mut self) {}
}

struct TestProvider {
    available: bool,
}

#[async_trait]
impl FrameSourceProvider for TestProvider {
    async fn open(&self) -> PipelineResult<Box<dyn FrameSource>> {
        if !self.available {
            return Err(PipelineError::source_unavailable("camera offline"));
        }
        Ok(Box::new(EndlessSource { index: 0 }))
    }
}

struct EmptyDetector;

#[async_trait]
impl Detector for EmptyDetector {
    async fn infer(&self, _frame: &Frame) -> PipelineResult<Vec<Detection>> {
        Ok(Vec::new())
    }
}

struct NullDispatcher;

#[async_trait]
impl AlertDispatcher for NullDispatcher {
    async fn send(&self, _event: &AlertEvent) -> bool {
        true
    }
}

fn app(available: bool) -> Router {
    let controller = PipelineController::new(
        PipelineConfig::default(),
        Arc::new(TestProvider { available }),
        Arc::new(EmptyDetector),
        Arc::new(NullDispatcher),
    )
    .unwrap();
    let state = AppState::new(ApiConfig::default(), Arc::new(controller));
    create_router(state, None)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn protection_alert() -> Value {
    json!({
        "location": {"lat": 40.41, "lon": -3.70},
        "message": "CRITICAL ALERT: Weapon detected with confidence 0.91",
        "emergency_type": "weapon_detected",
        "user_id": "CAM_001",
        "timestamp": "2024-01-01 12:00:00"
    })
}

#[tokio::test]
async fn test_health() {
    let app = app(true);
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_status_when_idle() {
    let app = app(true);
    let (status, body) = send(&app, "GET", "/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "online");
    assert_eq!(body["video_processing"], false);
    assert_eq!(body["state"], "idle");
    assert_eq!(body["alerts_dropped"], 0);
    assert!(body["last_detection"].is_null());
}

#[tokio::test]
async fn test_start_stop_cycle() {
    let app = app(true);

    let (status, body) = send(&app, "POST", "/control/start", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");

    let (_, body) = send(&app, "POST", "/control/start", None).await;
    assert_eq!(body["status"], "info");

    let (_, body) = send(&app, "GET", "/status", None).await;
    assert_eq!(body["video_processing"], true);
    assert_eq!(body["state"], "running");

    let (_, body) = send(&app, "POST", "/control/stop", None).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "Video processing stopped");

    let (status, body) = send(&app, "POST", "/control/stop", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "info");

    let (_, body) = send(&app, "GET", "/status", None).await;
    assert_eq!(body["video_processing"], false);
}

#[tokio::test]
async fn test_start_with_unavailable_source() {
    let app = app(false);
    let (status, body) = send(&app, "POST", "/control/start", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["detail"].as_str().unwrap().contains("camera offline"));

    let (_, body) = send(&app, "GET", "/status", None).await;
    assert_eq!(body["state"], "idle");
}

#[tokio::test]
async fn test_protection_alert_is_echoed() {
    let app = app(true);
    let (status, body) = send(&app, "POST", "/protection", Some(protection_alert())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "received");
    assert_eq!(body["details"]["emergency_type"], "weapon_detected");
    assert_eq!(body["details"]["location"]["lat"], 40.41);
}

#[tokio::test]
async fn test_protection_alert_validation() {
    let app = app(true);

    let mut empty_message = protection_alert();
    empty_message["message"] = json!("");
    let (status, _) = send(&app, "POST", "/protection", Some(empty_message)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let mut bad_location = protection_alert();
    bad_location["location"]["lat"] = json!(123.0);
    let (status, _) = send(&app, "POST", "/protection", Some(bad_location)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_status_update_receiver() {
    let app = app(true);
    let update = json!({
        "status": "started",
        "timestamp": "2024-01-01T12:00:00Z",
        "camera_id": "CAM_001"
    });
    let (status, body) = send(&app, "POST", "/status", Some(update)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "received");
}
