//! Prometheus metrics for the API server.

use std::sync::OnceLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use regex_lite::Regex;

/// Install the Prometheus recorder.
///
/// Pipeline and dispatch metrics recorded through the `metrics` facade are
/// rendered by the returned handle as well.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    Ok(PrometheusBuilder::new().install_recorder()?)
}

/// Metric names as constants for consistency.
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "sentinel_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "sentinel_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "sentinel_http_requests_in_flight";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

fn id_patterns() -> &'static [(Regex, &'static str); 2] {
    static PATTERNS: OnceLock<[(Regex, &'static str); 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (
                Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
                    .expect("valid uuid pattern"),
                ":id",
            ),
            (Regex::new(r"/[0-9]+(/|$)").expect("valid numeric pattern"), "/:id$1"),
        ]
    })
}

/// Sanitize path for metrics labels (replace ids with placeholders).
fn sanitize_path(path: &str) -> String {
    id_patterns()
        .iter()
        .fold(path.to_string(), |path, (pattern, replacement)| {
            pattern.replace_all(&path, *replacement).into_owned()
        })
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    record_http_request(&method, &path, status, start.elapsed().as_secs_f64());

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(sanitize_path("/status"), "/status");
        assert_eq!(sanitize_path("/cameras/42/status"), "/cameras/:id/status");
        assert_eq!(
            sanitize_path("/runs/550e8400-e29b-41d4-a716-446655440000"),
            "/runs/:id"
        );
    }
}
