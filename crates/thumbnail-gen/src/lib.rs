//! Thumbnail generation for Photocull
//!
//! Produces a bounded-size JPEG preview of a source image for UI
//! consumption: downscale-only resizing that preserves aspect ratio,
//! transparency flattened onto white, fixed output quality. This is a pure
//! I/O transform; a failure here aborts ingestion for that image.

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::debug;

/// Neither thumbnail dimension may exceed this.
pub const MAX_THUMBNAIL_SIZE: (u32, u32) = (300, 300);

/// Fixed lossy output quality.
pub const JPEG_QUALITY: u8 = 85;

/// Generate a thumbnail at the default maximum size.
pub fn generate(source: &Path, dest: &Path) -> Result<()> {
    generate_with_max(source, dest, MAX_THUMBNAIL_SIZE)
}

/// Generate a thumbnail bounded by `max_size`, writing JPEG to `dest`.
pub fn generate_with_max(source: &Path, dest: &Path, max_size: (u32, u32)) -> Result<()> {
    let img = image::open(source)
        .with_context(|| format!("Failed to decode source image {}", source.display()))?;

    let resized = resize_to_fit(img, max_size.0, max_size.1);
    let flattened = flatten_to_rgb(&resized);

    let file = File::create(dest)
        .with_context(|| format!("Failed to create thumbnail file {}", dest.display()))?;
    let mut writer = BufWriter::new(file);
    let encoder = JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);
    flattened
        .write_with_encoder(encoder)
        .with_context(|| format!("Failed to encode thumbnail {}", dest.display()))?;

    debug!(
        source = %source.display(),
        dest = %dest.display(),
        width = flattened.width(),
        height = flattened.height(),
        "thumbnail written"
    );
    Ok(())
}

/// Resize so neither dimension exceeds the bounds, preserving aspect
/// ratio. Images already within bounds are not upscaled.
fn resize_to_fit(img: DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width <= max_width && height <= max_height {
        return img;
    }
    img.resize(max_width, max_height, FilterType::Lanczos3)
}

/// Composite any alpha channel onto a white background; JPEG has no
/// transparency.
fn flatten_to_rgb(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (src, dst) in rgba.pixels().zip(out.pixels_mut()) {
        let alpha = u16::from(src.0[3]);
        let blend = |c: u8| ((u16::from(c) * alpha + 255 * (255 - alpha)) / 255) as u8;
        *dst = Rgb([blend(src.0[0]), blend(src.0[1]), blend(src.0[2])]);
    }
    out
}
