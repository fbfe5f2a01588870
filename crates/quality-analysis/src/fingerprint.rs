//! Perceptual difference-hash fingerprinting.
//!
//! The luminance image is downsampled to a 9x8 grid (one column wider than
//! the hash so every hash bit has a horizontal neighbor pair), then each
//! bit records whether the left pixel of a pair is brighter than the right.
//! Visually identical images hash identically; visually similar images
//! land within a small Hamming distance of each other.

use image::imageops::FilterType;
use image::GrayImage;

/// Hash width in bits per row (and number of rows).
const HASH_SIZE: u32 = 8;

pub struct Fingerprinter;

impl Fingerprinter {
    /// Compute the 64-bit difference hash of a luminance image as 16
    /// lowercase hex characters.
    pub fn fingerprint(luma: &GrayImage) -> String {
        let small = image::imageops::resize(luma, HASH_SIZE + 1, HASH_SIZE, FilterType::Lanczos3);

        let mut bits: u64 = 0;
        for y in 0..HASH_SIZE {
            for x in 0..HASH_SIZE {
                bits <<= 1;
                if small.get_pixel(x, y)[0] > small.get_pixel(x + 1, y)[0] {
                    bits |= 1;
                }
            }
        }
        format!("{bits:016x}")
    }
}

/// Hamming distance between two fingerprints, or `None` if either string
/// is not a 16-character hex hash.
pub fn hamming_distance(a: &str, b: &str) -> Option<u32> {
    if a.len() != 16 || b.len() != 16 {
        return None;
    }
    let a = u64::from_str_radix(a, 16).ok()?;
    let b = u64::from_str_radix(b, 16).ok()?;
    Some((a ^ b).count_ones())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn ramp(width: u32, height: u32, shift: u32) -> GrayImage {
        // Smooth horizontal gradient, optionally shifted right by `shift`
        GrayImage::from_fn(width, height, |x, _| {
            let v = ((x + shift) * 255 / (width + shift)) as u8;
            Luma([v])
        })
    }

    fn noise(width: u32, height: u32, seed: u64) -> GrayImage {
        // Deterministic LCG noise so the test never flakes
        let mut state = seed;
        let mut next = move || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 33) as u8
        };
        let mut img = GrayImage::new(width, height);
        for pixel in img.pixels_mut() {
            pixel.0[0] = next();
        }
        img
    }

    #[test]
    fn test_hash_is_16_hex_chars() {
        let hash = Fingerprinter::fingerprint(&ramp(64, 64, 0));
        assert_eq!(hash.len(), 16);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_hash_is_deterministic() {
        let img = noise(64, 64, 7);
        assert_eq!(
            Fingerprinter::fingerprint(&img),
            Fingerprinter::fingerprint(&img)
        );
    }

    #[test]
    fn test_one_pixel_shift_stays_close() {
        let original = Fingerprinter::fingerprint(&ramp(128, 96, 0));
        let shifted = Fingerprinter::fingerprint(&ramp(128, 96, 1));
        let distance = hamming_distance(&original, &shifted).unwrap();
        assert!(distance <= 4, "shifted gradient drifted {distance} bits");
    }

    #[test]
    fn test_unrelated_noise_lands_near_half_width() {
        let gradient = Fingerprinter::fingerprint(&ramp(128, 96, 0));
        let random = Fingerprinter::fingerprint(&noise(128, 96, 42));
        let distance = hamming_distance(&gradient, &random).unwrap();
        assert!(
            (12..=52).contains(&distance),
            "unrelated image should land near 32 bits, got {distance}"
        );
    }

    #[test]
    fn test_hamming_rejects_malformed_input() {
        assert_eq!(hamming_distance("abc", "abc"), None);
        assert_eq!(hamming_distance("zzzzzzzzzzzzzzzz", "0000000000000000"), None);
        assert_eq!(
            hamming_distance("ffffffffffffffff", "0000000000000000"),
            Some(64)
        );
        assert_eq!(
            hamming_distance("0000000000000000", "0000000000000000"),
            Some(0)
        );
    }
}
