//! Alert dispatcher contract.

use async_trait::async_trait;

use sentinel_models::AlertEvent;

/// Delivers alerts to a remote endpoint.
///
/// Delivery is best-effort: implementations report failure through the
/// returned `bool` and log the cause. A failed delivery never rolls back the
/// decision that produced the alert.
#[async_trait]
pub trait AlertDispatcher: Send + Sync {
    /// Deliver one alert. Returns true on success.
    async fn send(&self, event: &AlertEvent) -> bool;

    /// Report a pipeline lifecycle change (e.g. `started`, `stopped`).
    async fn send_status(&self, _status: &str) -> bool {
        true
    }
}
