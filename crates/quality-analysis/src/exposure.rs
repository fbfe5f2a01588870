//! Histogram-based over/under-exposure scoring.
//!
//! A 256-bin luminance histogram is normalized by pixel count; the top and
//! bottom ten bins are treated as clipped highlights and shadows. The
//! exposure score starts at 100 and loses one point per percent of clipped
//! pixels on either end.

use image::GrayImage;
use serde::{Deserialize, Serialize};

/// Number of histogram bins counted as clipped at each end.
const CLIP_BINS: usize = 10;

/// Raw pixel fraction above which the over/under flags trip (strictly greater).
const CLIP_FLAG_FRACTION: f64 = 0.02;

/// Exposure metrics for a single image.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExposureResult {
    /// 0-100, where 100 is well exposed.
    pub exposure_score: f64,
    /// Percentage of pixels in the top ten histogram bins.
    pub overexposed_percent: f64,
    /// Percentage of pixels in the bottom ten histogram bins.
    pub underexposed_percent: f64,
    pub is_overexposed: bool,
    pub is_underexposed: bool,
}

pub struct ExposureMeter;

impl ExposureMeter {
    /// Measure exposure balance of a luminance image.
    ///
    /// Caller must supply a non-empty buffer.
    pub fn measure(luma: &GrayImage) -> ExposureResult {
        let mut bins = [0u64; 256];
        for pixel in luma.pixels() {
            bins[usize::from(pixel.0[0])] += 1;
        }
        let total = luma.width() as f64 * luma.height() as f64;

        let over_count: u64 = bins[256 - CLIP_BINS..].iter().sum();
        let under_count: u64 = bins[..CLIP_BINS].iter().sum();
        let over = over_count as f64 / total;
        let under = under_count as f64 / total;

        let exposure_score = (100.0 - over * 100.0 - under * 100.0).clamp(0.0, 100.0);

        ExposureResult {
            exposure_score,
            overexposed_percent: over * 100.0,
            underexposed_percent: under * 100.0,
            is_overexposed: over > CLIP_FLAG_FRACTION,
            is_underexposed: under > CLIP_FLAG_FRACTION,
        }
    }
}
