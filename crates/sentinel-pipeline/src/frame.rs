//! Frames, sampling and coordinate rescaling.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use image::imageops::{self, FilterType};
use image::RgbImage;

use sentinel_models::Detection;

/// One decoded frame with its capture time.
///
/// The pixel buffer is shared, so cloning a frame is cheap and detectors
/// cannot mutate it.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Capture index assigned by the source (1-based)
    pub index: u64,
    pub captured_at: DateTime<Utc>,
    pub image: Arc<RgbImage>,
}

impl Frame {
    pub fn new(index: u64, captured_at: DateTime<Utc>, image: RgbImage) -> Self {
        Self {
            index,
            captured_at,
            image: Arc::new(image),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Copy of this frame resized by `scale` for cheaper inference.
    ///
    /// A scale of 1.0 or more returns the frame unchanged.
    pub fn downscale(&self, scale: f64) -> Frame {
        if scale >= 1.0 {
            return self.clone();
        }
        let width = ((self.width() as f64) * scale).round().max(1.0) as u32;
        let height = ((self.height() as f64) * scale).round().max(1.0) as u32;
        let resized = imageops::resize(self.image.as_ref(), width, height, FilterType::Triangle);

        Frame {
            index: self.index,
            captured_at: self.captured_at,
            image: Arc::new(resized),
        }
    }
}

/// Map detections found on a frame downscaled by `scale` back to
/// original-frame coordinates.
pub fn rescale_detections(detections: Vec<Detection>, scale: f64) -> Vec<Detection> {
    if scale == 1.0 {
        return detections;
    }
    detections.into_iter().map(|d| d.rescaled(scale)).collect()
}

/// Decides which captured frames reach the detector.
///
/// With stride `N`, frames `N, 2N, 3N, ...` (1-based) are sampled.
#[derive(Debug, Clone)]
pub struct FrameSampler {
    stride: u64,
    counter: u64,
}

impl FrameSampler {
    pub fn new(stride: u32) -> Self {
        Self {
            stride: u64::from(stride.max(1)),
            counter: 0,
        }
    }

    /// Count one captured frame; returns true if it should be detected on.
    pub fn tick(&mut self) -> bool {
        self.counter += 1;
        self.counter % self.stride == 0
    }

    /// Frames counted so far.
    pub fn frames_seen(&self) -> u64 {
        self.counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_models::BoundingBox;

    #[test]
    fn test_sampler_stride() {
        let mut sampler = FrameSampler::new(3);
        let sampled: Vec<u64> = (1..=10).filter(|_| sampler.tick()).collect();
        assert_eq!(sampled, vec![3, 6, 9]);
        assert_eq!(sampler.frames_seen(), 10);
    }

    #[test]
    fn test_sampler_stride_one_samples_everything() {
        let mut sampler = FrameSampler::new(1);
        assert!((0..5).all(|_| sampler.tick()));
    }

    #[test]
    fn test_downscale_dimensions() {
        let frame = Frame::new(1, Utc::now(), RgbImage::new(640, 480));
        let small = frame.downscale(0.5);
        assert_eq!((small.width(), small.height()), (320, 240));
        assert_eq!(small.index, 1);
        // Original is untouched
        assert_eq!((frame.width(), frame.height()), (640, 480));

        let same = frame.downscale(1.0);
        assert!(Arc::ptr_eq(&same.image, &frame.image));
    }

    #[test]
    fn test_rescale_detections_is_exact() {
        let s = 0.4;
        let dets = vec![Detection::new(1, 0.9, BoundingBox::new(12.0, 8.0, 40.0, 33.0))];
        let out = rescale_detections(dets, s);
        assert_eq!(out[0].bbox.to_array(), [12.0 / s, 8.0 / s, 40.0 / s, 33.0 / s]);
        assert_eq!(out[0].confidence, 0.9);
    }
}
