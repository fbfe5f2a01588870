//! Orchestration of the per-image quality meters.
//!
//! `QualityAnalyzer::analyze` decodes a file once, converts it to
//! luminance, and fans the four meters out over the shared buffer. The
//! meters are pure functions of the pixel data, so they run in parallel
//! without coordination. Decode failure is the only expected error and
//! aborts analysis for that file.

use crate::exposure::{ExposureMeter, ExposureResult};
use crate::face::{FaceAnalysis, FaceDetector};
use crate::fingerprint::Fingerprinter;
use crate::focus::FocusMeter;
use image::GenericImageView;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Reporting divisor for the focus score (raw Laplacian variance / 20).
const FOCUS_SCORE_DIVISOR: f64 = 20.0;

/// Variance at which the composite quality score saturates at 100.
const QUALITY_SATURATION_VARIANCE: f64 = 2000.0;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("failed to decode image {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Pixel dimensions of the decoded image.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// Full per-image analysis result.
///
/// Created transiently during ingestion and persisted as an opaque blob
/// inside the image record; all fields are write-once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// Normalized sharpness (Laplacian variance / 20), rounded to 2 places.
    /// Higher is sharper; no fixed upper bound.
    pub focus_score: f64,
    /// Mean Sobel gradient magnitude, rounded to 2 places. Secondary
    /// sharpness cross-check, not folded into the composite score.
    pub tenengrad_score: f64,
    pub exposure: ExposureResult,
    pub faces: FaceAnalysis,
    /// Composite 0-100 score. Currently a function of sharpness only;
    /// exposure and face signals are an open scoring-policy slot.
    pub quality_score: f64,
    /// 16-hex-char difference hash of the decoded pixels.
    pub perceptual_hash: String,
    pub dimensions: ImageDimensions,
    pub file_size: u64,
}

impl AnalysisRecord {
    /// True if any detected face has its eyes likely open.
    pub fn eyes_open(&self) -> bool {
        self.faces.any_eyes_open()
    }
}

pub struct QualityAnalyzer {
    detector: FaceDetector,
}

impl QualityAnalyzer {
    pub fn new(detector: FaceDetector) -> Self {
        Self { detector }
    }

    /// Analyze an image file on disk.
    pub fn analyze(&self, path: &Path) -> Result<AnalysisRecord, AnalysisError> {
        let img = image::open(path).map_err(|source| AnalysisError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        let (width, height) = img.dimensions();
        let file_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        let luma = img.to_luma8();

        let ((focus, exposure), (faces, perceptual_hash)) = rayon::join(
            || {
                rayon::join(
                    || FocusMeter::measure(&luma),
                    || ExposureMeter::measure(&luma),
                )
            },
            || {
                rayon::join(
                    || self.detector.detect(&luma),
                    || Fingerprinter::fingerprint(&luma),
                )
            },
        );

        let quality_score =
            (focus.laplacian_variance / QUALITY_SATURATION_VARIANCE * 100.0).clamp(0.0, 100.0);

        debug!(
            path = %path.display(),
            laplacian_variance = focus.laplacian_variance,
            exposure_score = exposure.exposure_score,
            face_count = faces.face_count,
            "image analyzed"
        );

        Ok(AnalysisRecord {
            focus_score: round2(focus.laplacian_variance / FOCUS_SCORE_DIVISOR),
            tenengrad_score: round2(focus.gradient_magnitude_mean),
            exposure,
            faces,
            quality_score: round2(quality_score),
            perceptual_hash,
            dimensions: ImageDimensions { width, height },
            file_size,
        })
    }
}

impl Default for QualityAnalyzer {
    fn default() -> Self {
        Self::new(FaceDetector::disabled())
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn save_checkerboard(dir: &tempfile::TempDir) -> PathBuf {
        let img = GrayImage::from_fn(64, 64, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 {
                Luma([230u8])
            } else {
                Luma([25u8])
            }
        });
        let path = dir.path().join("checker.png");
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_analyze_populates_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_checkerboard(&dir);

        let analyzer = QualityAnalyzer::default();
        let record = analyzer.analyze(&path).unwrap();

        assert!(record.focus_score > 0.0);
        assert!(record.tenengrad_score > 0.0);
        assert!((0.0..=100.0).contains(&record.quality_score));
        assert!((0.0..=100.0).contains(&record.exposure.exposure_score));
        assert_eq!(record.dimensions.width, 64);
        assert_eq!(record.dimensions.height, 64);
        assert!(record.file_size > 0);
        assert_eq!(record.perceptual_hash.len(), 16);
        assert_eq!(record.faces.face_count, 0);
        assert!(!record.eyes_open());
    }

    #[test]
    fn test_analyze_is_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_checkerboard(&dir);

        let analyzer = QualityAnalyzer::default();
        let a = analyzer.analyze(&path).unwrap();
        let b = analyzer.analyze(&path).unwrap();

        assert_eq!(a.focus_score, b.focus_score);
        assert_eq!(a.tenengrad_score, b.tenengrad_score);
        assert_eq!(a.quality_score, b.quality_score);
        assert_eq!(a.perceptual_hash, b.perceptual_hash);
    }

    #[test]
    fn test_corrupt_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not an image at all").unwrap();

        let analyzer = QualityAnalyzer::default();
        let err = analyzer.analyze(&path).unwrap_err();
        assert!(matches!(err, AnalysisError::Decode { .. }));
    }

    #[test]
    fn test_scores_are_rounded_to_two_places() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_checkerboard(&dir);

        let record = QualityAnalyzer::default().analyze(&path).unwrap();
        for score in [record.focus_score, record.tenengrad_score, record.quality_score] {
            assert!(((score * 100.0).round() / 100.0 - score).abs() < 1e-12);
        }
    }

    #[test]
    fn test_record_round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_checkerboard(&dir);

        let record = QualityAnalyzer::default().analyze(&path).unwrap();
        let json = serde_json::to_string(&record).unwrap();
        let restored: AnalysisRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.focus_score, record.focus_score);
        assert_eq!(restored.perceptual_hash, record.perceptual_hash);
        assert_eq!(restored.faces.face_count, record.faces.face_count);
        assert_eq!(restored.dimensions.width, record.dimensions.width);
    }
}
