//! Pixelation and color filters.
//!
//! - Nearest-neighbor downscale by an integer divisor (no smoothing)
//! - Brightness / contrast / saturation / hue adjustments with the semantics of the
//!   CSS `filter` functions a canvas compositor applies while drawing
//! - Additive uniform noise on opaque pixels

use image::{ImageBuffer, RgbaImage};
use rand::Rng;
use serde::{Deserialize, Serialize};

// ============================================================================
// SETTINGS
// ============================================================================

/// Color adjustments, all deltas where 0 means unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdjustSettings {
    /// -100..100, percent added to 100% brightness
    pub brightness: f32,
    /// -100..100, percent added to 100% contrast
    pub contrast: f32,
    /// -100..100, percent added to 100% saturation
    pub saturation: f32,
    /// -180..180 degrees of hue rotation
    pub hue: f32,
}

impl AdjustSettings {
    pub fn is_identity(&self) -> bool {
        self.brightness == 0.0 && self.contrast == 0.0 && self.saturation == 0.0 && self.hue == 0.0
    }
}

// ============================================================================
// DOWNSCALE
// ============================================================================

/// `(max(1, ⌊w/p⌋), max(1, ⌊h/p⌋))`, with `p` clamped to at least 1
pub fn output_dimensions(width: u32, height: u32, pixel_size: u32) -> (u32, u32) {
    let p = pixel_size.max(1);
    ((width / p).max(1), (height / p).max(1))
}

/// Nearest-neighbor resample to `out_width × out_height`, sampling source pixel centers
pub fn resample_nearest(img: &RgbaImage, out_width: u32, out_height: u32) -> RgbaImage {
    let (width, height) = img.dimensions();
    if (width, height) == (out_width, out_height) {
        return img.clone();
    }

    let mut result = ImageBuffer::new(out_width, out_height);
    if width == 0 || height == 0 {
        return result;
    }

    for out_y in 0..out_height {
        let src_y = ((2 * out_y as u64 + 1) * height as u64 / (2 * out_height as u64)) as u32;
        for out_x in 0..out_width {
            let src_x = ((2 * out_x as u64 + 1) * width as u64 / (2 * out_width as u64)) as u32;
            result.put_pixel(out_x, out_y, *img.get_pixel(src_x, src_y));
        }
    }

    result
}

/// Downscale by `pixel_size` and apply the color adjustments in the same pass
pub fn pixelate(img: &RgbaImage, pixel_size: u32, adjust: &AdjustSettings) -> RgbaImage {
    let (width, height) = img.dimensions();
    let (out_width, out_height) = output_dimensions(width, height, pixel_size);

    let mut result = resample_nearest(img, out_width, out_height);
    apply_adjustments(&mut result, adjust);

    tracing::debug!(
        from_width = width,
        from_height = height,
        width = out_width,
        height = out_height,
        pixel_size,
        "Pixelated"
    );
    result
}

// ============================================================================
// COLOR ADJUSTMENTS
// ============================================================================

type Matrix3 = [[f32; 3]; 3];

fn saturate_matrix(s: f32) -> Matrix3 {
    [
        [0.213 + 0.787 * s, 0.715 - 0.715 * s, 0.072 - 0.072 * s],
        [0.213 - 0.213 * s, 0.715 + 0.285 * s, 0.072 - 0.072 * s],
        [0.213 - 0.213 * s, 0.715 - 0.715 * s, 0.072 + 0.928 * s],
    ]
}

fn hue_rotate_matrix(degrees: f32) -> Matrix3 {
    let (sin, cos) = degrees.to_radians().sin_cos();
    [
        [
            0.213 + cos * 0.787 - sin * 0.213,
            0.715 - cos * 0.715 - sin * 0.715,
            0.072 - cos * 0.072 + sin * 0.928,
        ],
        [
            0.213 - cos * 0.213 + sin * 0.143,
            0.715 + cos * 0.285 + sin * 0.140,
            0.072 - cos * 0.072 - sin * 0.283,
        ],
        [
            0.213 - cos * 0.213 - sin * 0.787,
            0.715 - cos * 0.715 + sin * 0.715,
            0.072 + cos * 0.928 + sin * 0.072,
        ],
    ]
}

fn apply_matrix(m: &Matrix3, c: [f32; 3]) -> [f32; 3] {
    let mut out = [0.0; 3];
    for (row, value) in m.iter().zip(out.iter_mut()) {
        *value = (row[0] * c[0] + row[1] * c[1] + row[2] * c[2]).clamp(0.0, 1.0);
    }
    out
}

/// Brightness, contrast, saturate, hue-rotate, in that order, each clamped to [0, 1]
pub fn apply_adjustments(img: &mut RgbaImage, adjust: &AdjustSettings) {
    if adjust.is_identity() {
        return;
    }

    let brightness = (1.0 + adjust.brightness / 100.0).max(0.0);
    let contrast = (1.0 + adjust.contrast / 100.0).max(0.0);
    let saturate = saturate_matrix((1.0 + adjust.saturation / 100.0).max(0.0));
    let hue = hue_rotate_matrix(adjust.hue);

    for pixel in img.pixels_mut() {
        let mut c = [
            pixel[0] as f32 / 255.0,
            pixel[1] as f32 / 255.0,
            pixel[2] as f32 / 255.0,
        ];

        if adjust.brightness != 0.0 {
            c = c.map(|v| (v * brightness).clamp(0.0, 1.0));
        }
        if adjust.contrast != 0.0 {
            c = c.map(|v| ((v - 0.5) * contrast + 0.5).clamp(0.0, 1.0));
        }
        if adjust.saturation != 0.0 {
            c = apply_matrix(&saturate, c);
        }
        if adjust.hue != 0.0 {
            c = apply_matrix(&hue, c);
        }

        for channel in 0..3 {
            pixel[channel] = (c[channel] * 255.0).round() as u8;
        }
    }
}

// ============================================================================
// NOISE
// ============================================================================

/// Add a uniform random offset in `[-amount, amount]` to each RGB channel of every
/// non-transparent pixel, clamped to 0-255. Returns the number of pixels visited.
pub fn add_noise<R: Rng + ?Sized>(img: &mut RgbaImage, amount: u32, rng: &mut R) -> usize {
    if amount == 0 {
        return 0;
    }

    let amount = amount as i32;
    let mut visited = 0;
    for pixel in img.pixels_mut() {
        if pixel[3] == 0 {
            continue;
        }
        for channel in 0..3 {
            let offset = rng.gen_range(-amount..=amount);
            pixel[channel] = (pixel[channel] as i32 + offset).clamp(0, 255) as u8;
        }
        visited += 1;
    }

    tracing::debug!(amount, visited, "Noise applied");
    visited
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_output_dimensions_law() {
        for w in [1u32, 2, 3, 7, 64, 100, 1023] {
            for h in [1u32, 5, 64, 513] {
                for p in 1u32..=12 {
                    let (ow, oh) = output_dimensions(w, h, p);
                    assert_eq!(ow, (w / p).max(1));
                    assert_eq!(oh, (h / p).max(1));
                }
            }
        }
        assert_eq!(output_dimensions(10, 10, 0), (10, 10));
    }

    #[test]
    fn test_pixelate_dimensions() {
        let img = RgbaImage::from_pixel(65, 33, Rgba([1, 2, 3, 255]));
        assert_eq!(pixelate(&img, 4, &AdjustSettings::default()).dimensions(), (16, 8));
        assert_eq!(pixelate(&img, 100, &AdjustSettings::default()).dimensions(), (1, 1));
        assert_eq!(pixelate(&img, 1, &AdjustSettings::default()), img);
    }

    #[test]
    fn test_nearest_samples_block_centers() {
        // 2x2 blocks of distinct colors, each block sampled exactly
        let img = RgbaImage::from_fn(6, 4, |x, y| Rgba([(x / 2) as u8 * 50, (y / 2) as u8 * 50, 0, 255]));
        let small = resample_nearest(&img, 3, 2);
        for (x, y, p) in small.enumerate_pixels() {
            assert_eq!(*p, Rgba([x as u8 * 50, y as u8 * 50, 0, 255]));
        }
    }

    #[test]
    fn test_no_smoothing() {
        let img = RgbaImage::from_fn(4, 4, |x, _| if x % 2 == 0 { Rgba([0, 0, 0, 255]) } else { Rgba([255, 255, 255, 255]) });
        let small = resample_nearest(&img, 2, 2);
        assert!(small.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn test_identity_adjustments() {
        let img = RgbaImage::from_fn(8, 8, |x, y| Rgba([(x * 30) as u8, (y * 30) as u8, 77, 200]));
        let mut out = img.clone();
        apply_adjustments(&mut out, &AdjustSettings::default());
        assert_eq!(out, img);
    }

    #[test]
    fn test_brightness() {
        let mut img = RgbaImage::from_pixel(1, 1, Rgba([100, 50, 200, 255]));
        apply_adjustments(&mut img, &AdjustSettings { brightness: 100.0, ..Default::default() });
        assert_eq!(*img.get_pixel(0, 0), Rgba([200, 100, 255, 255]));

        let mut img = RgbaImage::from_pixel(1, 1, Rgba([100, 50, 200, 255]));
        apply_adjustments(&mut img, &AdjustSettings { brightness: -100.0, ..Default::default() });
        assert_eq!(*img.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_contrast_minimum_is_mid_gray() {
        let mut img = RgbaImage::from_pixel(1, 1, Rgba([10, 240, 90, 7]));
        apply_adjustments(&mut img, &AdjustSettings { contrast: -100.0, ..Default::default() });
        assert_eq!(*img.get_pixel(0, 0), Rgba([128, 128, 128, 7]));
    }

    #[test]
    fn test_desaturate_gives_gray() {
        let mut img = RgbaImage::from_pixel(1, 1, Rgba([255, 0, 0, 255]));
        apply_adjustments(&mut img, &AdjustSettings { saturation: -100.0, ..Default::default() });
        let p = img.get_pixel(0, 0);
        assert_eq!(p[0], p[1]);
        assert_eq!(p[1], p[2]);
        assert_eq!(p[0], 54); // 0.213 × 255
    }

    #[test]
    fn test_hue_rotation_preserves_gray() {
        let mut img = RgbaImage::from_pixel(1, 1, Rgba([128, 128, 128, 255]));
        apply_adjustments(&mut img, &AdjustSettings { hue: 180.0, ..Default::default() });
        assert_eq!(*img.get_pixel(0, 0), Rgba([128, 128, 128, 255]));
    }

    #[test]
    fn test_hue_rotation_changes_color() {
        let mut img = RgbaImage::from_pixel(1, 1, Rgba([255, 0, 0, 255]));
        apply_adjustments(&mut img, &AdjustSettings { hue: 120.0, ..Default::default() });
        let p = img.get_pixel(0, 0);
        assert!(p[1] > p[0], "red rotated 120° should lean green, got {:?}", p);
    }

    #[test]
    fn test_noise_skips_transparent_and_stays_in_range() {
        let mut img = RgbaImage::from_fn(10, 10, |x, _| {
            Rgba([128, 0, 255, if x < 5 { 255 } else { 0 }])
        });
        let mut rng = StdRng::seed_from_u64(1);
        let visited = add_noise(&mut img, 20, &mut rng);
        assert_eq!(visited, 50);

        for (x, _, p) in img.enumerate_pixels() {
            if x < 5 {
                assert!((108..=148).contains(&p[0]));
                assert!(p[1] <= 20);
                assert!(p[2] >= 235);
            } else {
                assert_eq!(*p, Rgba([128, 0, 255, 0]));
            }
        }
    }

    #[test]
    fn test_zero_noise_is_noop() {
        let mut img = RgbaImage::from_pixel(3, 3, Rgba([9, 9, 9, 255]));
        let before = img.clone();
        assert_eq!(add_noise(&mut img, 0, &mut StdRng::seed_from_u64(5)), 0);
        assert_eq!(img, before);
    }
}
