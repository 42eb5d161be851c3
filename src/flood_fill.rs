//! Flood-fill selection and chroma-key background removal.
//!
//! Every pixel is tested against one fixed target color (never against the pixel it
//! was reached from), so a slow gradient cannot walk the selection away from the key.
//!
//! Two consumers:
//! - chroma key: seeds are the image corners that match the configured key color
//! - magic wand: the seed is the clicked pixel and the target is that pixel's color

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::color::{rgb_of, tolerance_threshold, within_tolerance, Color, ALPHA_THRESHOLD};
use crate::mask::PixelMask;

// ============================================================================
// SETTINGS
// ============================================================================

/// Settings for chroma-key transparency
#[derive(Debug, Clone)]
pub struct ChromaKeySettings {
    /// Key color to remove
    pub color: Color,
    /// 0-100, mapped onto RGB distance (default: 10)
    pub tolerance: f64,
    /// Flood from matching corners (true) or clear every matching pixel (false)
    pub contiguous: bool,
}

impl Default for ChromaKeySettings {
    fn default() -> Self {
        Self {
            color: image::Rgb([255, 0, 255]),
            tolerance: 10.0,
            contiguous: true,
        }
    }
}

/// Settings for the interactive magic wand
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WandSettings {
    pub tolerance: f64,
    pub contiguous: bool,
}

impl Default for WandSettings {
    fn default() -> Self {
        Self {
            tolerance: 10.0,
            contiguous: true,
        }
    }
}

// ============================================================================
// SELECTION
// ============================================================================

const NEIGHBORS_4: [(i64, i64); 4] = [(0, -1), (0, 1), (-1, 0), (1, 0)];

/// Select pixels matching `target` within `tolerance` (0-100).
///
/// Contiguous mode runs a 4-connected BFS from the seeds that themselves match;
/// global mode ignores the seeds and selects every matching pixel.
/// The source image is never modified.
pub fn select(
    img: &RgbaImage,
    target: Color,
    tolerance: f64,
    contiguous: bool,
    seeds: &[(u32, u32)],
) -> PixelMask {
    let (width, height) = img.dimensions();
    let threshold = tolerance_threshold(tolerance);
    let mut mask = PixelMask::new(width, height);

    let matches = |x: u32, y: u32| within_tolerance(rgb_of(img.get_pixel(x, y)), target, threshold);

    if !contiguous {
        for (x, y, pixel) in img.enumerate_pixels() {
            if within_tolerance(rgb_of(pixel), target, threshold) {
                mask.set(x, y, true);
            }
        }
        return mask;
    }

    let mut queue: VecDeque<(u32, u32)> = VecDeque::new();
    for &(x, y) in seeds {
        if x < width && y < height && !mask.get(x, y) && matches(x, y) {
            mask.set(x, y, true);
            queue.push_back((x, y));
        }
    }

    while let Some((x, y)) = queue.pop_front() {
        for (dx, dy) in NEIGHBORS_4 {
            let nx = x as i64 + dx;
            let ny = y as i64 + dy;
            if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                continue;
            }
            let (nx, ny) = (nx as u32, ny as u32);
            if !mask.get(nx, ny) && matches(nx, ny) {
                mask.set(nx, ny, true);
                queue.push_back((nx, ny));
            }
        }
    }

    mask
}

/// The (deduplicated) image corners whose color matches `key` within tolerance
pub fn corner_seeds(img: &RgbaImage, key: Color, tolerance: f64) -> Vec<(u32, u32)> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let threshold = tolerance_threshold(tolerance);
    let corners = [
        (0, 0),
        (width - 1, 0),
        (0, height - 1),
        (width - 1, height - 1),
    ];

    let mut seeds: Vec<(u32, u32)> = Vec::with_capacity(4);
    for corner in corners {
        if seeds.contains(&corner) {
            continue;
        }
        if within_tolerance(rgb_of(img.get_pixel(corner.0, corner.1)), key, threshold) {
            seeds.push(corner);
        }
    }
    seeds
}

// ============================================================================
// CHROMA KEY
// ============================================================================

/// Snap alpha to 0 or 255 around the opacity threshold
///
/// Safe to re-apply: idempotent operation (no change on second application)
pub fn normalize_alpha(img: &mut RgbaImage) {
    for pixel in img.pixels_mut() {
        pixel[3] = if pixel[3] > ALPHA_THRESHOLD { 255 } else { 0 };
    }
}

/// Background selection for the chroma key, without touching the image
pub fn background_mask(img: &RgbaImage, settings: &ChromaKeySettings) -> PixelMask {
    if settings.contiguous {
        let seeds = corner_seeds(img, settings.color, settings.tolerance);
        select(img, settings.color, settings.tolerance, true, &seeds)
    } else {
        select(img, settings.color, settings.tolerance, false, &[])
    }
}

/// Make the keyed background fully transparent.
///
/// Leaves every pixel either fully opaque or fully transparent. Returns the number of
/// pixels that were cleared by the key.
pub fn remove_background(img: &mut RgbaImage, settings: &ChromaKeySettings) -> usize {
    normalize_alpha(img);

    let mask = background_mask(img, settings);
    let removed = erase_selection(img, &mask);

    tracing::debug!(
        removed,
        contiguous = settings.contiguous,
        tolerance = settings.tolerance,
        "Chroma key applied"
    );
    removed
}

// ============================================================================
// MAGIC WAND
// ============================================================================

/// Select the region around a clicked pixel, using the pixel's own color as target.
///
/// Returns `None` when the click is out of bounds or lands on a fully transparent
/// pixel. With `prior`, the new region is added to the previous selection.
pub fn magic_wand(
    img: &RgbaImage,
    x: u32,
    y: u32,
    settings: &WandSettings,
    prior: Option<&PixelMask>,
) -> Option<PixelMask> {
    let (width, height) = img.dimensions();
    if x >= width || y >= height {
        return None;
    }

    let seed = img.get_pixel(x, y);
    if seed[3] == 0 {
        return None;
    }

    let mut mask = select(img, rgb_of(seed), settings.tolerance, settings.contiguous, &[(x, y)]);
    if let Some(prior) = prior {
        mask.union_with(prior);
    }
    Some(mask)
}

/// Make every selected pixel fully transparent; returns how many changed
pub fn erase_selection(img: &mut RgbaImage, mask: &PixelMask) -> usize {
    if mask.dimensions() != img.dimensions() {
        return 0;
    }

    let mut changed = 0;
    for (x, y) in mask.iter_selected() {
        let pixel = img.get_pixel_mut(x, y);
        if pixel[3] != 0 {
            pixel[3] = 0;
            changed += 1;
        }
    }
    changed
}

// ============================================================================
// TESTS
// ============================================================================
