//! Inner/outer outline strokes.
//!
//! Both strokes are measured on one alpha snapshot taken before anything is painted:
//! - inner: opaque pixels with a transparent (or out-of-bounds) pixel within
//!   Chebyshev distance `width`
//! - outer: transparent pixels with an opaque in-bounds pixel within Chebyshev
//!   distance `width`
//!
//! The neighborhood is a square, which gives the blocky corners expected in pixel art.
//! Window queries go through summed-area tables, so cost does not grow with width.

use image::{Rgb, Rgba, RgbaImage};
use ndarray::Array2;
use serde::Serialize;

use crate::color::Color;
use crate::mask::PixelMask;

pub const MIN_STROKE_WIDTH: u32 = 1;
pub const MAX_STROKE_WIDTH: u32 = 8;

// ============================================================================
// SETTINGS
// ============================================================================

/// One stroke (inner or outer)
#[derive(Debug, Clone)]
pub struct StrokeSettings {
    pub enabled: bool,
    pub color: Color,
    /// Stroke width in pixels, clamped to 1-8
    pub width: u32,
}

/// Settings for outline generation
#[derive(Debug, Clone)]
pub struct OutlineSettings {
    pub inner: StrokeSettings,
    pub outer: StrokeSettings,
}

impl Default for OutlineSettings {
    fn default() -> Self {
        Self {
            inner: StrokeSettings {
                enabled: false,
                color: Rgb([0, 0, 0]),
                width: 1,
            },
            outer: StrokeSettings {
                enabled: false,
                color: Rgb([255, 255, 255]),
                width: 1,
            },
        }
    }
}

impl OutlineSettings {
    pub fn any_enabled(&self) -> bool {
        self.inner.enabled || self.outer.enabled
    }
}

/// Pixels selected for each stroke
#[derive(Debug, Clone)]
pub struct OutlineStrokes {
    pub inner: PixelMask,
    pub outer: PixelMask,
}

/// Result from outline painting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineResult {
    pub inner_painted: usize,
    pub outer_painted: usize,
}

// ============================================================================
// SUMMED AREA
// ============================================================================

/// Prefix sums of the cells where the mask equals `value`
struct SummedArea {
    table: Array2<u32>,
}

impl SummedArea {
    fn new(mask: &PixelMask, value: bool) -> Self {
        let (width, height) = mask.dimensions();
        let bits = mask.bits();
        let mut table = Array2::<u32>::zeros((height as usize + 1, width as usize + 1));

        for y in 0..height as usize {
            let mut row_sum = 0u32;
            for x in 0..width as usize {
                row_sum += u32::from(bits[[y, x]] == value);
                table[[y + 1, x + 1]] = table[[y, x + 1]] + row_sum;
            }
        }

        Self { table }
    }

    /// Count over the half-open rectangle `[x0, x1) × [y0, y1)`
    fn count(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> u32 {
        self.table[[y1, x1]] + self.table[[y0, x0]] - self.table[[y0, x1]] - self.table[[y1, x0]]
    }
}

fn window(x: u32, y: u32, radius: u32, width: u32, height: u32) -> (usize, usize, usize, usize) {
    (
        x.saturating_sub(radius) as usize,
        y.saturating_sub(radius) as usize,
        (x + radius + 1).min(width) as usize,
        (y + radius + 1).min(height) as usize,
    )
}

// ============================================================================
// DETECTION
// ============================================================================

/// Compute both stroke sets from a fixed alpha snapshot (`true` = opaque)
pub fn detect(alpha: &PixelMask, settings: &OutlineSettings) -> OutlineStrokes {
    let (width, height) = alpha.dimensions();
    let mut inner = PixelMask::new(width, height);
    let mut outer = PixelMask::new(width, height);

    let inner_width = settings.inner.width.clamp(MIN_STROKE_WIDTH, MAX_STROKE_WIDTH);
    let outer_width = settings.outer.width.clamp(MIN_STROKE_WIDTH, MAX_STROKE_WIDTH);

    let transparent = SummedArea::new(alpha, false);
    let opaque = SummedArea::new(alpha, true);

    for y in 0..height {
        for x in 0..width {
            if alpha.get(x, y) {
                if !settings.inner.enabled {
                    continue;
                }
                let r = inner_width;
                // Image edges count as transparent
                let touches_edge = x < r || y < r || x + r >= width || y + r >= height;
                let (x0, y0, x1, y1) = window(x, y, r, width, height);
                if touches_edge || transparent.count(x0, y0, x1, y1) > 0 {
                    inner.set(x, y, true);
                }
            } else if settings.outer.enabled {
                let (x0, y0, x1, y1) = window(x, y, outer_width, width, height);
                if opaque.count(x0, y0, x1, y1) > 0 {
                    outer.set(x, y, true);
                }
            }
        }
    }

    OutlineStrokes { inner, outer }
}

// ============================================================================
// PAINTING
// ============================================================================

fn paint(img: &mut RgbaImage, mask: &PixelMask, color: Color) -> usize {
    let rgba = Rgba([color[0], color[1], color[2], 255]);
    let mut painted = 0;
    for (x, y) in mask.iter_selected() {
        img.put_pixel(x, y, rgba);
        painted += 1;
    }
    painted
}

/// Add inner and/or outer outlines around the opaque content.
///
/// The alpha snapshot is taken once, then inner is painted (over opaque pixels) and
/// outer is painted (turning transparent pixels opaque), both at full alpha.
///
/// **Warning**: Applying outline to an already-outlined image grows the outline.
pub fn add_outline(img: &mut RgbaImage, settings: &OutlineSettings) -> OutlineResult {
    if !settings.any_enabled() {
        return OutlineResult::default();
    }

    let alpha = PixelMask::opaque(img);
    let strokes = detect(&alpha, settings);

    let inner_painted = paint(img, &strokes.inner, settings.inner.color);
    let outer_painted = paint(img, &strokes.outer, settings.outer.color);

    tracing::debug!(inner_painted, outer_painted, "Outline applied");

    OutlineResult {
        inner_painted,
        outer_painted,
    }
}

// ============================================================================
// TESTS
// ============================================================================
