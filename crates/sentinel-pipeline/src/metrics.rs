//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade; the API binary installs the
//! Prometheus recorder. Without a recorder these calls are no-ops.

use metrics::{counter, histogram};

use sentinel_models::{AlertEvent, ClassId};

/// Metric name constants for consistency.
pub mod names {
    /// Frames read from the source.
    pub const FRAMES_CAPTURED_TOTAL: &str = "sentinel_frames_captured_total";

    /// Frames sent to the detector.
    pub const FRAMES_SAMPLED_TOTAL: &str = "sentinel_frames_sampled_total";

    /// Detector calls that failed or returned an invalid batch.
    pub const DETECTOR_FAULTS_TOTAL: &str = "sentinel_detector_faults_total";

    /// Detections returned by the detector, by class.
    pub const DETECTIONS_TOTAL: &str = "sentinel_detections_total";

    /// Alerts produced by the decision engine, by class and kind.
    pub const ALERTS_EMITTED_TOTAL: &str = "sentinel_alerts_emitted_total";

    /// Detector round-trip latency.
    pub const DETECTOR_LATENCY_SECONDS: &str = "sentinel_detector_latency_seconds";
}

pub fn record_frame_captured() {
    counter!(names::FRAMES_CAPTURED_TOTAL).increment(1);
}

pub fn record_frame_sampled() {
    counter!(names::FRAMES_SAMPLED_TOTAL).increment(1);
}

pub fn record_detector_fault() {
    counter!(names::DETECTOR_FAULTS_TOTAL).increment(1);
}

/// Record one detection of `class_id`.
pub fn record_detection(class_id: ClassId) {
    counter!(names::DETECTIONS_TOTAL, "class" => class_id.to_string()).increment(1);
}

/// Record an alert handed to the dispatch queue.
pub fn record_alert_emitted(event: &AlertEvent) {
    counter!(
        names::ALERTS_EMITTED_TOTAL,
        "class" => event.class_id.to_string(),
        "kind" => event.kind.as_str()
    )
    .increment(1);
}

pub fn record_detector_latency(seconds: f64) {
    histogram!(names::DETECTOR_LATENCY_SECONDS).record(seconds);
}
