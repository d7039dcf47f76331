//! Detection types produced by the object-detection model.
//!
//! A [`Detection`] only lives for the duration of one processed frame. Its
//! bounding box is always expressed in original-frame pixel coordinates once
//! it leaves the pipeline controller.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Model class identifier (e.g. `1` = weapon).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct ClassId(pub u32);

impl ClassId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ClassId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl FromStr for ClassId {
    type Err = ClassIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(ClassId)
            .map_err(|_| ClassIdParseError(s.to_string()))
    }
}

#[derive(Debug, Error)]
#[error("Invalid class id: {0}")]
pub struct ClassIdParseError(String);

/// Axis-aligned bounding box as `[x0, y0, x1, y1]` in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BoundingBox {
    /// Left edge
    pub x0: f64,
    /// Top edge
    pub y0: f64,
    /// Right edge
    pub x1: f64,
    /// Bottom edge
    pub y1: f64,
}

impl BoundingBox {
    /// Create a box from its corner coordinates.
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Create a box from a centre point and size, as hosted detectors report them.
    pub fn from_center(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        Self {
            x0: cx - width / 2.0,
            y0: cy - height / 2.0,
            x1: cx + width / 2.0,
            y1: cy + height / 2.0,
        }
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Map a box found on a frame downscaled by `scale` back to the
    /// original frame: every coordinate is divided by `scale`.
    pub fn rescale(&self, scale: f64) -> BoundingBox {
        BoundingBox {
            x0: self.x0 / scale,
            y0: self.y0 / scale,
            x1: self.x1 / scale,
            y1: self.y1 / scale,
        }
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.x0, self.y0, self.x1, self.y1]
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

/// One model observation on a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Detection {
    pub class_id: ClassId,
    /// Model confidence in `[0.0, 1.0]`.
    pub confidence: f64,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(class_id: impl Into<ClassId>, confidence: f64, bbox: BoundingBox) -> Self {
        Self {
            class_id: class_id.into(),
            confidence,
            bbox,
        }
    }

    /// True when the confidence is a finite value inside `[0.0, 1.0]`.
    pub fn has_valid_confidence(&self) -> bool {
        (0.0..=1.0).contains(&self.confidence)
    }

    /// Copy of this detection with its box mapped back to original-frame space.
    pub fn rescaled(&self, scale: f64) -> Detection {
        Detection {
            bbox: self.bbox.rescale(scale),
            ..*self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_id_parse() {
        assert_eq!("2".parse::<ClassId>().unwrap(), ClassId(2));
        assert_eq!(" 7 ".parse::<ClassId>().unwrap(), ClassId(7));
        assert!("gun".parse::<ClassId>().is_err());
        assert!("-1".parse::<ClassId>().is_err());
    }

    #[test]
    fn test_bbox_from_center() {
        let bbox = BoundingBox::from_center(50.0, 40.0, 20.0, 10.0);
        assert_eq!(bbox.to_array(), [40.0, 35.0, 60.0, 45.0]);
        assert_eq!(bbox.width(), 20.0);
        assert_eq!(bbox.area(), 200.0);
    }

    #[test]
    fn test_bbox_rescale_divides_each_coordinate() {
        let bbox = BoundingBox::new(10.0, 20.0, 30.0, 40.0);
        let out = bbox.rescale(0.5);
        assert_eq!(out.to_array(), [20.0, 40.0, 60.0, 80.0]);

        let s = 0.3;
        let out = bbox.rescale(s);
        assert_eq!(out.to_array(), [10.0 / s, 20.0 / s, 30.0 / s, 40.0 / s]);
    }

    #[test]
    fn test_confidence_validation() {
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        assert!(Detection::new(1, 0.0, bbox).has_valid_confidence());
        assert!(Detection::new(1, 1.0, bbox).has_valid_confidence());
        assert!(!Detection::new(1, -0.1, bbox).has_valid_confidence());
        assert!(!Detection::new(1, 1.5, bbox).has_valid_confidence());
        assert!(!Detection::new(1, f64::NAN, bbox).has_valid_confidence());
    }

    #[test]
    fn test_detection_serializes_class_as_number() {
        let det = Detection::new(2, 0.9, BoundingBox::new(1.0, 2.0, 3.0, 4.0));
        let json = serde_json::to_value(det).unwrap();
        assert_eq!(json["class_id"], 2);
        assert_eq!(json["bbox"]["x1"], 3.0);
    }
}
