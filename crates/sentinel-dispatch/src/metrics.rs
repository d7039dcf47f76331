//! Dispatch metrics.

use metrics::counter;

/// Metric name constants for consistency.
pub mod names {
    /// Delivery attempts by outcome (`delivered`, `failed`).
    pub const DISPATCH_TOTAL: &str = "sentinel_dispatch_total";

    /// Alerts discarded because the queue was full.
    pub const ALERTS_DROPPED_TOTAL: &str = "sentinel_alerts_dropped_total";
}

/// Record the outcome of one delivery attempt.
pub fn record_dispatch(delivered: bool) {
    let outcome = if delivered { "delivered" } else { "failed" };
    counter!(names::DISPATCH_TOTAL, "outcome" => outcome).increment(1);
}

/// Record an alert evicted from a full queue.
pub fn record_alert_dropped() {
    counter!(names::ALERTS_DROPPED_TOTAL).increment(1);
}
