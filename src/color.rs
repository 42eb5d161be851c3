//! Color helpers shared by every stage.
//!
//! Colors are plain 8-bit RGB triples (`image::Rgb<u8>`). Distances are Euclidean in
//! RGB space; comparisons use the squared form so no stage ever takes a square root
//! inside a per-pixel loop.

use image::{Rgb, Rgba};
use palette::Srgb;
use std::str::FromStr;

/// An (r, g, b) triple, 0-255 per channel
pub type Color = Rgb<u8>;

/// Largest possible RGB distance, sqrt(255² × 3) rounded
pub const MAX_RGB_DISTANCE: f64 = 442.0;

/// Alpha above this value counts as opaque when building alpha masks
pub const ALPHA_THRESHOLD: u8 = 128;

// ============================================================================
// HEX CONVERSION
// ============================================================================

/// Parse `#RRGGBB` (or `RRGGBB` / `#RGB`) into a color
pub fn parse_hex(hex: &str) -> Option<Color> {
    let trimmed = hex.trim();
    let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
    if !matches!(digits.len(), 3 | 6) || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let srgb = Srgb::<u8>::from_str(digits).ok()?;
    Some(Rgb([srgb.red, srgb.green, srgb.blue]))
}

/// Parse a hex color, falling back to `fallback` when the string is malformed
pub fn parse_hex_or(hex: &str, fallback: Color, field: &str) -> Color {
    match parse_hex(hex) {
        Some(color) => color,
        None => {
            tracing::warn!(field, value = hex, "Malformed hex color, using fallback");
            fallback
        }
    }
}

/// Format as uppercase `#RRGGBB`
pub fn to_hex(color: Color) -> String {
    format!("#{:02X}{:02X}{:02X}", color[0], color[1], color[2])
}

/// RGB part of an RGBA pixel
#[inline]
pub fn rgb_of(pixel: &Rgba<u8>) -> Color {
    Rgb([pixel[0], pixel[1], pixel[2]])
}

// ============================================================================
// DISTANCE
// ============================================================================

/// Squared Euclidean distance in RGB space
#[inline]
pub fn distance_sq(a: Color, b: Color) -> u32 {
    let dr = a[0] as i32 - b[0] as i32;
    let dg = a[1] as i32 - b[1] as i32;
    let db = a[2] as i32 - b[2] as i32;
    (dr * dr + dg * dg + db * db) as u32
}

/// Euclidean distance in RGB space
pub fn distance(a: Color, b: Color) -> f64 {
    (distance_sq(a, b) as f64).sqrt()
}

/// Map a 0-100 tolerance onto a squared-distance threshold: `(t / 100 × 442)²`
pub fn tolerance_threshold(tolerance: f64) -> f64 {
    let radius = (tolerance.clamp(0.0, 100.0) / 100.0) * MAX_RGB_DISTANCE;
    radius * radius
}

#[inline]
pub fn within_tolerance(a: Color, b: Color, threshold: f64) -> bool {
    distance_sq(a, b) as f64 <= threshold
}
