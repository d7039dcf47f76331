//! Class catalog: how each model class is described in outbound alerts.

use std::collections::BTreeMap;

use sentinel_models::{AlertEvent, AlertKind, ClassId};

/// Human-facing description of one model class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInfo {
    /// Model label (e.g. `guns`)
    pub label: String,
    /// `emergency_type` sent to the alert endpoint
    pub emergency_type: String,
    /// Message prefix, completed with the confidence
    pub headline: String,
}

impl ClassInfo {
    pub fn new(label: &str, emergency_type: &str, headline: &str) -> Self {
        Self {
            label: label.to_string(),
            emergency_type: emergency_type.to_string(),
            headline: headline.to_string(),
        }
    }
}

/// Lookup table from class id to [`ClassInfo`], with a fallback entry for
/// ids the catalog does not know.
#[derive(Debug, Clone)]
pub struct ClassCatalog {
    classes: BTreeMap<ClassId, ClassInfo>,
    fallback: ClassInfo,
}

impl Default for ClassCatalog {
    /// Classes of the weapons / risk-situation model.
    fn default() -> Self {
        let suspicious = ClassInfo::new(
            "Suspicious",
            "suspicious_person",
            "NOTICE: Suspicious person detected",
        );
        let mut classes = BTreeMap::new();
        classes.insert(ClassId(0), suspicious.clone());
        classes.insert(
            ClassId(1),
            ClassInfo::new("guns", "weapon_detected", "CRITICAL ALERT: Weapon detected"),
        );
        classes.insert(
            ClassId(2),
            ClassInfo::new(
                "risk_woman",
                "woman_risk",
                "ALERT: Risk situation for a woman detected",
            ),
        );
        Self {
            classes,
            fallback: suspicious,
        }
    }
}

impl ClassCatalog {
    /// Empty catalog that describes every class with `fallback`.
    pub fn with_fallback(fallback: ClassInfo) -> Self {
        Self {
            classes: BTreeMap::new(),
            fallback,
        }
    }

    pub fn insert(&mut self, class_id: ClassId, info: ClassInfo) {
        self.classes.insert(class_id, info);
    }

    pub fn get(&self, class_id: ClassId) -> &ClassInfo {
        self.classes.get(&class_id).unwrap_or(&self.fallback)
    }

    /// Label for logs and UIs; `Unknown` when the id is not in the catalog.
    pub fn label(&self, class_id: ClassId) -> &str {
        self.classes
            .get(&class_id)
            .map(|c| c.label.as_str())
            .unwrap_or("Unknown")
    }

    /// Alert message for an event.
    pub fn message_for(&self, event: &AlertEvent) -> String {
        let info = self.get(event.class_id);
        match event.kind {
            AlertKind::Single => {
                format!("{} with confidence {:.2}", info.headline, event.confidence)
            }
            AlertKind::Bulk { count } => format!(
                "{} with confidence {:.2} ({} detections)",
                info.headline, event.confidence, count
            ),
        }
    }
}
