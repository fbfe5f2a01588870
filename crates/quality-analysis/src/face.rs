//! Face and eye presence detection.
//!
//! The classifier itself is a pretrained frontal-face/eye detector loaded
//! once at startup and shared read-only across all invocations, so it sits
//! behind the [`FaceEngine`] trait (implement it to plug in an ONNX, dlib
//! or cascade backend). This module owns the policy around the engine:
//! detection parameters, per-face eye counting on the face crop, the
//! eyes-open heuristic, and face size ratios.
//!
//! `eyes_likely_open` is a shape-count proxy (two or more detected eye
//! shapes), not an eyelid classifier. Downstream consumers depend on that
//! exact semantic.

use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Multi-scale sweep parameters handed to the detection backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectParams {
    /// Window growth factor between detection scales.
    pub scale_factor: f64,
    /// Overlapping raw detections required to keep a candidate.
    pub min_neighbors: u32,
}

/// Parameters for the whole-frame face pass.
pub const FACE_PARAMS: DetectParams = DetectParams {
    scale_factor: 1.3,
    min_neighbors: 5,
};

/// Parameters for the eye pass, run on each face crop.
pub const EYE_PARAMS: DetectParams = DetectParams {
    scale_factor: 1.1,
    min_neighbors: 5,
};

/// Axis-aligned bounding rectangle in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Pluggable detection backend.
///
/// Implementations must be safe to share across threads; the engine is
/// loaded once and never mutated afterwards. Rectangles are returned in
/// detector order with no spatial or size ordering guarantee.
pub trait FaceEngine: Send + Sync {
    /// Detect frontal faces in a luminance image.
    fn detect_faces(&self, luma: &GrayImage, params: DetectParams) -> Vec<FaceRect>;

    /// Count eye-shaped detections within a face crop.
    fn detect_eyes(&self, face_crop: &GrayImage, params: DetectParams) -> usize;
}

/// Backend used when no pretrained classifier is configured.
///
/// Reports every frame as face-free, which downstream treats as a normal
/// zero-face outcome rather than an error.
pub struct DisabledEngine;

impl FaceEngine for DisabledEngine {
    fn detect_faces(&self, _luma: &GrayImage, _params: DetectParams) -> Vec<FaceRect> {
        Vec::new()
    }

    fn detect_eyes(&self, _face_crop: &GrayImage, _params: DetectParams) -> usize {
        0
    }
}

/// Per-face detection detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceDetail {
    pub position: FaceRect,
    pub eyes_detected: usize,
    pub eyes_likely_open: bool,
    /// Face area relative to frame area, in (0, 1].
    pub face_size_ratio: f64,
}

/// Face detection result for one image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceAnalysis {
    pub face_count: usize,
    pub faces_detected: bool,
    pub face_details: Vec<FaceDetail>,
}

impl FaceAnalysis {
    /// True if any detected face has its eyes likely open. False when no
    /// faces were found.
    pub fn any_eyes_open(&self) -> bool {
        self.face_details.iter().any(|f| f.eyes_likely_open)
    }
}

/// Policy layer over a shared [`FaceEngine`].
#[derive(Clone)]
pub struct FaceDetector {
    engine: Arc<dyn FaceEngine>,
}

impl FaceDetector {
    pub fn new(engine: Arc<dyn FaceEngine>) -> Self {
        Self { engine }
    }

    /// Detector with no classifier backend; always reports zero faces.
    pub fn disabled() -> Self {
        Self::new(Arc::new(DisabledEngine))
    }

    /// Run face and per-face eye detection over a luminance image.
    pub fn detect(&self, luma: &GrayImage) -> FaceAnalysis {
        let (width, height) = luma.dimensions();
        let frame_area = width as f64 * height as f64;

        let faces = self.engine.detect_faces(luma, FACE_PARAMS);
        debug!(face_count = faces.len(), "face detection pass complete");

        let face_details: Vec<FaceDetail> = faces
            .into_iter()
            .map(|rect| {
                let clamped = clamp_rect(rect, width, height);
                let crop = image::imageops::crop_imm(
                    luma,
                    clamped.x,
                    clamped.y,
                    clamped.width,
                    clamped.height,
                )
                .to_image();
                let eyes_detected = self.engine.detect_eyes(&crop, EYE_PARAMS);

                FaceDetail {
                    position: rect,
                    eyes_detected,
                    eyes_likely_open: eyes_detected >= 2,
                    face_size_ratio: (rect.width as f64 * rect.height as f64) / frame_area,
                }
            })
            .collect();

        FaceAnalysis {
            face_count: face_details.len(),
            faces_detected: !face_details.is_empty(),
            face_details,
        }
    }
}

/// Keep the crop window inside the frame even if the backend returns a
/// rectangle touching the border.
fn clamp_rect(rect: FaceRect, width: u32, height: u32) -> FaceRect {
    let x = rect.x.min(width.saturating_sub(1));
    let y = rect.y.min(height.saturating_sub(1));
    FaceRect {
        x,
        y,
        width: rect.width.min(width - x).max(1),
        height: rect.height.min(height - y).max(1),
    }
}
