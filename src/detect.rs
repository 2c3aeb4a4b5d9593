//! Boundary contract for the live-overlay consumer.
//!
//! The capture loop, model inference, and drawing live outside this crate;
//! per frame they hand over `(bbox, class id, confidence)` detections and
//! expect back the subset worth rendering plus a stable color per class.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

use crate::vocabulary::normalize;

/// Pixel-space corner coordinates, as produced by the detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// One detection from a single frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub class_id: usize,
    pub confidence: f32,
}

/// Confidence and class-name gate applied before drawing overlays.
#[derive(Debug, Clone)]
pub struct OverlayFilter {
    pub confidence_threshold: f32,
    pub high_confidence_threshold: f32,
    allowlist: HashSet<String>,
}

impl OverlayFilter {
    pub const DEFAULT_CONFIDENCE: f32 = 0.6;
    pub const DEFAULT_HIGH_CONFIDENCE: f32 = 0.8;

    pub fn new<I, S>(allowlist: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            confidence_threshold: Self::DEFAULT_CONFIDENCE,
            high_confidence_threshold: Self::DEFAULT_HIGH_CONFIDENCE,
            allowlist: allowlist
                .into_iter()
                .map(|name| normalize(name.as_ref()))
                .collect(),
        }
    }

    pub fn with_thresholds(mut self, confidence: f32, high_confidence: f32) -> Self {
        self.confidence_threshold = confidence;
        self.high_confidence_threshold = high_confidence;
        self
    }

    /// A detection passes when its class name is allowlisted and its
    /// confidence clears the threshold. Unknown class ids never pass.
    pub fn passes(&self, detection: &Detection, class_names: &[String]) -> bool {
        let allowed = class_names
            .get(detection.class_id)
            .is_some_and(|name| self.allowlist.contains(&normalize(name)));
        allowed && detection.confidence > self.confidence_threshold
    }

    /// High-confidence detections get the emphasized label background.
    pub fn is_high_confidence(&self, detection: &Detection) -> bool {
        detection.confidence > self.high_confidence_threshold
    }

    /// Keep only renderable detections, preserving frame order.
    pub fn filter<'a>(
        &self,
        detections: &'a [Detection],
        class_names: &[String],
    ) -> Vec<&'a Detection> {
        detections
            .iter()
            .filter(|detection| self.passes(detection, class_names))
            .collect()
    }
}

/// One RGB color per class id, stable for a fixed seed so a class keeps its
/// color across frames and runs.
pub fn class_colors(count: usize, seed: u64) -> Vec<[u8; 3]> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count).map(|_| rng.gen::<[u8; 3]>()).collect()
}
