//! Alert events emitted by the decision engine.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::detection::ClassId;

/// Kind of alert.
///
/// - `Single`: one notable, debounced detection
/// - `Bulk`: escalation after a per-class detection threshold was crossed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertKind {
    Single,
    Bulk {
        /// Detections accumulated when the threshold fired.
        count: u32,
    },
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Single => "single",
            AlertKind::Bulk { .. } => "bulk",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable alert decision. Considered "decided", never "delivered".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AlertEvent {
    pub class_id: ClassId,
    /// Confidence of the detection that triggered the alert.
    pub confidence: f64,
    pub kind: AlertKind,
    pub occurred_at: DateTime<Utc>,
}

impl AlertEvent {
    pub fn single(class_id: ClassId, confidence: f64, occurred_at: DateTime<Utc>) -> Self {
        Self {
            class_id,
            confidence,
            kind: AlertKind::Single,
            occurred_at,
        }
    }

    pub fn bulk(class_id: ClassId, confidence: f64, count: u32, occurred_at: DateTime<Utc>) -> Self {
        Self {
            class_id,
            confidence,
            kind: AlertKind::Bulk { count },
            occurred_at,
        }
    }

    pub fn is_bulk(&self) -> bool {
        matches!(self.kind, AlertKind::Bulk { .. })
    }

    /// Accumulated count, present for bulk alerts only.
    pub fn count(&self) -> Option<u32> {
        match self.kind {
            AlertKind::Bulk { count } => Some(count),
            AlertKind::Single => None,
        }
    }
}

/// Camera position attached to outbound alerts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct GeoLocation {
    pub lat: f64,
    pub lon: f64,
}

impl GeoLocation {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }
}
