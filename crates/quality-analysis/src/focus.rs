//! Sharpness measurement via Laplacian variance and Tenengrad gradient magnitude.
//!
//! Both metrics operate on single-channel luminance. High Laplacian variance
//! means many strong edges (a sharp image); near-zero variance means a flat
//! or blurred frame. The Tenengrad mean is reported alongside as an
//! independent cross-check signal.

use image::GrayImage;
use serde::{Deserialize, Serialize};

/// Sharpness metrics for a single image.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FocusMeasure {
    /// Variance of the 3x3 Laplacian response over all interior pixels.
    pub laplacian_variance: f64,
    /// Mean per-pixel Sobel gradient magnitude (Tenengrad).
    pub gradient_magnitude_mean: f64,
}

pub struct FocusMeter;

impl FocusMeter {
    /// Measure sharpness of a luminance image.
    ///
    /// Caller must supply a non-empty buffer. Images too small to hold a
    /// 3x3 kernel interior (either dimension below 3) measure as 0.0.
    pub fn measure(luma: &GrayImage) -> FocusMeasure {
        let (width, height) = luma.dimensions();
        if width < 3 || height < 3 {
            return FocusMeasure {
                laplacian_variance: 0.0,
                gradient_magnitude_mean: 0.0,
            };
        }

        let mut lap_sum = 0.0f64;
        let mut lap_sum_sq = 0.0f64;
        let mut grad_sum = 0.0f64;
        let count = ((width - 2) * (height - 2)) as f64;

        for y in 1..height - 1 {
            for x in 1..width - 1 {
                let tl = i32::from(luma.get_pixel(x - 1, y - 1)[0]);
                let t = i32::from(luma.get_pixel(x, y - 1)[0]);
                let tr = i32::from(luma.get_pixel(x + 1, y - 1)[0]);
                let l = i32::from(luma.get_pixel(x - 1, y)[0]);
                let c = i32::from(luma.get_pixel(x, y)[0]);
                let r = i32::from(luma.get_pixel(x + 1, y)[0]);
                let bl = i32::from(luma.get_pixel(x - 1, y + 1)[0]);
                let b = i32::from(luma.get_pixel(x, y + 1)[0]);
                let br = i32::from(luma.get_pixel(x + 1, y + 1)[0]);

                // 3x3 Laplacian: [0 1 0; 1 -4 1; 0 1 0]
                let lap = f64::from(t + b + l + r - 4 * c);
                lap_sum += lap;
                lap_sum_sq += lap * lap;

                // 3x3 Sobel first derivatives
                let dx = f64::from((tr + 2 * r + br) - (tl + 2 * l + bl));
                let dy = f64::from((bl + 2 * b + br) - (tl + 2 * t + tr));
                grad_sum += (dx * dx + dy * dy).sqrt();
            }
        }

        let mean = lap_sum / count;
        FocusMeasure {
            laplacian_variance: lap_sum_sq / count - mean * mean,
            gradient_magnitude_mean: grad_sum / count,
        }
    }
}
