//! Palette quantization.
//!
//! Two ways of choosing a palette:
//! 1. A fixed named palette (see `palettes`)
//! 2. An adaptive palette of k colors found by k-means over the opaque pixels
//!
//! Either way every opaque pixel is snapped to its nearest palette entry by squared
//! RGB distance, first minimum winning ties. Transparent pixels are never touched.

use image::{Rgb, RgbaImage};
use rand::Rng;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::color::{distance_sq, rgb_of, to_hex, Color};

/// Lloyd iterations per quantizer run
pub const KMEANS_ITERATIONS: usize = 5;

/// Upper bound for the adaptive palette size
pub const MAX_REDUCE_COLORS: u32 = 32;

// ============================================================================
// NEAREST COLOR
// ============================================================================

/// Index of the nearest palette entry; `None` for an empty palette
pub fn nearest_index(color: Color, palette: &[Color]) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;
    for (i, &candidate) in palette.iter().enumerate() {
        let dist = distance_sq(color, candidate);
        match best {
            Some((_, best_dist)) if dist >= best_dist => {}
            _ => best = Some((i, dist)),
        }
    }
    best.map(|(i, _)| i)
}

/// Nearest palette entry, or the color itself when the palette is empty
pub fn nearest_color(color: Color, palette: &[Color]) -> Color {
    nearest_index(color, palette).map_or(color, |i| palette[i])
}

/// Snap every non-transparent pixel to its nearest palette color.
///
/// Returns the number of pixels whose color changed.
pub fn map_to_palette(img: &mut RgbaImage, palette: &[Color]) -> usize {
    if palette.is_empty() {
        return 0;
    }

    img.par_chunks_mut(4)
        .map(|px| {
            if px[3] == 0 {
                return 0;
            }
            let Rgb([r, g, b]) = nearest_color(Rgb([px[0], px[1], px[2]]), palette);
            let changed = (px[0], px[1], px[2]) != (r, g, b);
            px[0] = r;
            px[1] = g;
            px[2] = b;
            usize::from(changed)
        })
        .sum()
}

// ============================================================================
// K-MEANS
// ============================================================================

/// Colors of every pixel with alpha > 0, row-major (duplicates kept)
pub fn opaque_colors(img: &RgbaImage) -> Vec<Color> {
    img.pixels().filter(|p| p[3] > 0).map(rgb_of).collect()
}

fn unique_in_order(colors: &[Color]) -> Vec<Color> {
    let mut seen: HashSet<Color> = HashSet::new();
    let mut unique = Vec::new();
    for &color in colors {
        if seen.insert(color) {
            unique.push(color);
        }
    }
    unique
}

fn to_point(color: Color) -> [f32; 3] {
    [color[0] as f32, color[1] as f32, color[2] as f32]
}

fn to_color(point: [f32; 3]) -> Color {
    Rgb(point.map(|v| v.round().clamp(0.0, 255.0) as u8))
}

fn nearest_centroid(point: [f32; 3], centroids: &[[f32; 3]]) -> usize {
    let mut best = 0;
    let mut best_dist = f32::MAX;
    for (i, c) in centroids.iter().enumerate() {
        let dr = point[0] - c[0];
        let dg = point[1] - c[1];
        let db = point[2] - c[2];
        let dist = dr * dr + dg * dg + db * db;
        if dist < best_dist {
            best_dist = dist;
            best = i;
        }
    }
    best
}

/// Find up to `k` representative colors with Lloyd's algorithm.
///
/// Centroids start as uniform random samples of the population; empty clusters are
/// reseeded with a random population color. When the population has no more than `k`
/// distinct colors those colors are returned as-is.
pub fn kmeans<R: Rng + ?Sized>(colors: &[Color], k: usize, rng: &mut R) -> Vec<Color> {
    if k == 0 || colors.is_empty() {
        return Vec::new();
    }

    let distinct = unique_in_order(colors);
    if distinct.len() <= k {
        return distinct;
    }

    let points: Vec<[f32; 3]> = colors.iter().map(|&c| to_point(c)).collect();
    let mut centroids: Vec<[f32; 3]> = (0..k)
        .map(|_| points[rng.gen_range(0..points.len())])
        .collect();

    for _ in 0..KMEANS_ITERATIONS {
        let assignments: Vec<usize> = points
            .par_iter()
            .map(|&p| nearest_centroid(p, &centroids))
            .collect();

        let mut sums = vec![[0f64; 3]; k];
        let mut counts = vec![0usize; k];
        for (point, &cluster) in points.iter().zip(&assignments) {
            for channel in 0..3 {
                sums[cluster][channel] += point[channel] as f64;
            }
            counts[cluster] += 1;
        }

        for (i, centroid) in centroids.iter_mut().enumerate() {
            if counts[i] == 0 {
                *centroid = points[rng.gen_range(0..points.len())];
            } else {
                let n = counts[i] as f64;
                *centroid = [
                    (sums[i][0] / n) as f32,
                    (sums[i][1] / n) as f32,
                    (sums[i][2] / n) as f32,
                ];
            }
        }
    }

    let palette: Vec<Color> = centroids.into_iter().map(to_color).collect();
    unique_in_order(&palette)
}

/// Reduce the opaque pixels of `img` to at most `k` adaptive colors.
///
/// Returns the palette that was applied.
pub fn reduce_colors<R: Rng + ?Sized>(img: &mut RgbaImage, k: usize, rng: &mut R) -> Vec<Color> {
    let population = opaque_colors(img);
    let palette = kmeans(&population, k, rng);
    let changed = map_to_palette(img, &palette);

    tracing::debug!(
        requested = k,
        palette_size = palette.len(),
        population = population.len(),
        changed,
        "Adaptive palette applied"
    );
    palette
}

// ============================================================================
// PALETTE ANALYSIS
// ============================================================================

/// One distinct color of an analyzed image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColorCount {
    pub hex: String,
    pub rgb: (u8, u8, u8),
    pub count: usize,
}

/// Distinct colors among pixels with alpha > 0, most frequent first.
///
/// Ties keep first-appearance (row-major) order. Pure read.
pub fn analyze_palette(img: &RgbaImage) -> Vec<ColorCount> {
    let mut order: Vec<Color> = Vec::new();
    let mut counts: HashMap<Color, usize> = HashMap::new();

    for pixel in img.pixels() {
        if pixel[3] == 0 {
            continue;
        }
        let color = rgb_of(pixel);
        let entry = counts.entry(color).or_insert_with(|| {
            order.push(color);
            0
        });
        *entry += 1;
    }

    let mut result: Vec<ColorCount> = order
        .into_iter()
        .map(|color| ColorCount {
            hex: to_hex(color),
            rgb: (color[0], color[1], color[2]),
            count: counts[&color],
        })
        .collect();
    // Stable sort keeps first-appearance order among equal counts
    result.sort_by(|a, b| b.count.cmp(&a.count));
    result
}

// ============================================================================
// TESTS
// ============================================================================
