//! Per-image quality analysis library for Photocull
//!
//! This crate computes the objective quality signals used during culling:
//! sharpness (Laplacian variance and Tenengrad), histogram-based exposure
//! balance, face/eye presence, and a perceptual similarity fingerprint.
//! The `QualityAnalyzer` orchestrates the individual meters into a single
//! `AnalysisRecord` per image.

pub mod analyzer;
pub mod exposure;
pub mod face;
pub mod fingerprint;
pub mod focus;

pub use analyzer::{AnalysisError, AnalysisRecord, ImageDimensions, QualityAnalyzer};
pub use exposure::{ExposureMeter, ExposureResult};
pub use face::{
    DetectParams, DisabledEngine, FaceAnalysis, FaceDetail, FaceDetector, FaceEngine, FaceRect,
};
pub use fingerprint::{hamming_distance, Fingerprinter};
pub use focus::{FocusMeasure, FocusMeter};
