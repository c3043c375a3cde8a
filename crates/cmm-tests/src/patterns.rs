//! Test pattern generation
//!
//! Patterns are generated as interleaved 8-bit samples with any channel
//! count, so they fill RGB, RGBA and gray images alike.

use std::sync::Arc;

use oxcmm_core::{DataType, Image, PixelLayout, Profile};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// Test pattern types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestPattern {
    /// Horizontal ramp black to white on every channel
    GradientH,
    /// RGB color cube corners, cycling per pixel
    ColorCube,
    /// Saturated colors near the sRGB gamut boundary
    GamutBoundary,
    /// Seeded random samples
    Random(u64),
    /// Every sample set to one value
    Flat(u8),
}

/// Generate `width * height` pixels of `channels` samples
pub fn generate_pattern(pattern: TestPattern, width: usize, height: usize, channels: usize) -> Vec<u8> {
    let mut data = vec![0u8; width * height * channels];
    if channels == 0 {
        return data;
    }

    match pattern {
        TestPattern::GradientH => {
            for (i, pixel) in data.chunks_exact_mut(channels).enumerate() {
                let x = i % width;
                let v = if width > 1 { (x * 255 / (width - 1)) as u8 } else { 0 };
                pixel.fill(v);
            }
        }
        TestPattern::ColorCube => {
            for (i, pixel) in data.chunks_exact_mut(channels).enumerate() {
                let corner = i % 8;
                for (c, sample) in pixel.iter_mut().enumerate() {
                    *sample = if corner & (1 << (c % 3)) != 0 { 255 } else { 0 };
                }
            }
        }
        TestPattern::GamutBoundary => {
            let colors: [[u8; 3]; 8] = [
                [255, 0, 0],
                [0, 255, 0],
                [0, 0, 255],
                [255, 255, 0],
                [255, 0, 255],
                [0, 255, 255],
                [255, 128, 0],
                [128, 0, 255],
            ];
            for (i, pixel) in data.chunks_exact_mut(channels).enumerate() {
                let color = colors[i % colors.len()];
                for (c, sample) in pixel.iter_mut().enumerate() {
                    *sample = color.get(c).copied().unwrap_or(255);
                }
            }
        }
        TestPattern::Random(seed) => {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            rng.fill_bytes(&mut data);
        }
        TestPattern::Flat(v) => data.fill(v),
    }

    data
}

/// An interleaved 8-bit image filled with `pattern`
pub fn pattern_image(
    pattern: TestPattern,
    (width, height): (usize, usize),
    channels: u32,
    profile: Arc<Profile>,
) -> Arc<Image> {
    let data = generate_pattern(pattern, width, height, channels as usize);
    Image::create(width, height, Some(data), PixelLayout::new(channels, DataType::U8), profile)
        .expect("pattern sized for its layout")
}

/// Largest per-sample difference between two buffers
pub fn max_sample_diff(a: &[u8], b: &[u8]) -> u8 {
    a.iter().zip(b).map(|(x, y)| x.abs_diff(*y)).max().unwrap_or(0)
}

/// Standard test sizes
pub mod sizes {
    pub const TINY: (usize, usize) = (8, 8);
    pub const SMALL: (usize, usize) = (64, 64);
    pub const MEDIUM: (usize, usize) = (256, 256);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_and_gradient() {
        assert!(generate_pattern(TestPattern::Flat(7), 2, 2, 3).iter().all(|&v| v == 7));
        let ramp = generate_pattern(TestPattern::GradientH, 3, 1, 1);
        assert_eq!(ramp, vec![0, 127, 255]);
    }

    #[test]
    fn test_random_deterministic() {
        let a = generate_pattern(TestPattern::Random(42), 10, 10, 4);
        let b = generate_pattern(TestPattern::Random(42), 10, 10, 4);
        assert_eq!(a, b);
        assert_ne!(a, generate_pattern(TestPattern::Random(43), 10, 10, 4));
    }

    #[test]
    fn test_color_cube_alpha() {
        let cube = generate_pattern(TestPattern::ColorCube, 8, 1, 4);
        assert_eq!(&cube[4..8], &[255, 0, 0, 255]);
        assert_eq!(&cube[28..32], &[255, 255, 255, 255]);
    }
}
