//! Post-processing pipeline.
//!
//! Every render starts from the original source bitmap and runs the stages in a
//! fixed order on one working buffer:
//!
//! 1. Nearest-neighbor downscale + brightness/contrast/saturation/hue
//! 2. Chroma key (corner flood fill or global)
//! 3. Inner then outer outline, only when the chroma key ran
//! 4. Additive noise
//! 5. Named palette mapping, or adaptive k-means when no palette is selected
//! 6. Palette analysis (read only)

use image::{Rgb, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::color::{parse_hex, parse_hex_or, Color};
use crate::filter::{self, AdjustSettings};
use crate::flood_fill::{self, ChromaKeySettings};
use crate::outline::{self, OutlineResult, OutlineSettings, StrokeSettings, MAX_STROKE_WIDTH, MIN_STROKE_WIDTH};
use crate::palettes::{self, NamedPalette, NO_PALETTE};
use crate::quantize::{self, ColorCount, MAX_REDUCE_COLORS};

const DEFAULT_OUTER_COLOR: Color = Rgb([255, 255, 255]);
const DEFAULT_INNER_COLOR: Color = Rgb([0, 0, 0]);

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Complete set of pipeline parameters, treated as an immutable snapshot per render
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PostProcessConfig {
    /// Downscale divisor (>= 1)
    pub pixel_size: u32,
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    /// Degrees, -180..180
    pub hue: f32,
    /// Per-channel noise magnitude, 0..100
    pub noise: u32,
    /// Named palette key or `"none"`
    pub palette: String,
    /// Adaptive palette size, 0 = off
    pub reduce_colors: u32,

    pub remove_background: bool,
    pub transparent_color: String,
    /// 0..100
    pub transparency_tolerance: f64,
    pub contiguous: bool,

    pub outline_outer: bool,
    pub outline_outer_color: String,
    pub outline_outer_width: u32,
    pub outline_inner: bool,
    pub outline_inner_color: String,
    pub outline_inner_width: u32,

    // Display only, never applied to the processed bitmap
    pub show_grid: bool,
    pub grid_size: u32,
    pub grid_opacity: f32,
    pub grid_color: String,
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            pixel_size: 4,
            brightness: 0.0,
            contrast: 0.0,
            saturation: 0.0,
            hue: 0.0,
            noise: 0,
            palette: NO_PALETTE.to_string(),
            reduce_colors: 0,
            remove_background: false,
            transparent_color: "#FF00FF".to_string(),
            transparency_tolerance: 10.0,
            contiguous: true,
            outline_outer: false,
            outline_outer_color: "#FFFFFF".to_string(),
            outline_outer_width: 1,
            outline_inner: false,
            outline_inner_color: "#000000".to_string(),
            outline_inner_width: 1,
            show_grid: false,
            grid_size: 1,
            grid_opacity: 0.5,
            grid_color: "#00f0ff".to_string(),
        }
    }
}

fn clamp_f32(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

impl PostProcessConfig {
    /// Copy with every numeric field clamped into its documented range
    pub fn sanitized(&self) -> Self {
        let tolerance = if self.transparency_tolerance.is_finite() {
            self.transparency_tolerance.clamp(0.0, 100.0)
        } else {
            10.0
        };

        Self {
            pixel_size: self.pixel_size.max(1),
            brightness: clamp_f32(self.brightness, -100.0, 100.0, 0.0),
            contrast: clamp_f32(self.contrast, -100.0, 100.0, 0.0),
            saturation: clamp_f32(self.saturation, -100.0, 100.0, 0.0),
            hue: clamp_f32(self.hue, -180.0, 180.0, 0.0),
            noise: self.noise.min(100),
            reduce_colors: self.reduce_colors.min(MAX_REDUCE_COLORS),
            transparency_tolerance: tolerance,
            outline_outer_width: self.outline_outer_width.clamp(MIN_STROKE_WIDTH, MAX_STROKE_WIDTH),
            outline_inner_width: self.outline_inner_width.clamp(MIN_STROKE_WIDTH, MAX_STROKE_WIDTH),
            grid_size: self.grid_size.max(1),
            grid_opacity: clamp_f32(self.grid_opacity, 0.0, 1.0, 0.5),
            ..self.clone()
        }
    }

    pub fn adjustments(&self) -> AdjustSettings {
        AdjustSettings {
            brightness: self.brightness,
            contrast: self.contrast,
            saturation: self.saturation,
            hue: self.hue,
        }
    }

    /// Chroma-key settings, or `None` when background removal is off or the key
    /// color does not parse
    pub fn chroma_key(&self) -> Option<ChromaKeySettings> {
        if !self.remove_background {
            return None;
        }
        match parse_hex(&self.transparent_color) {
            Some(color) => Some(ChromaKeySettings {
                color,
                tolerance: self.transparency_tolerance,
                contiguous: self.contiguous,
            }),
            None => {
                tracing::warn!(
                    value = %self.transparent_color,
                    "Malformed transparent color, skipping background removal"
                );
                None
            }
        }
    }

    pub fn outline(&self) -> OutlineSettings {
        OutlineSettings {
            inner: StrokeSettings {
                enabled: self.outline_inner,
                color: parse_hex_or(&self.outline_inner_color, DEFAULT_INNER_COLOR, "outlineInnerColor"),
                width: self.outline_inner_width,
            },
            outer: StrokeSettings {
                enabled: self.outline_outer,
                color: parse_hex_or(&self.outline_outer_color, DEFAULT_OUTER_COLOR, "outlineOuterColor"),
                width: self.outline_outer_width,
            },
        }
    }

    /// Selected fixed palette. Unknown keys behave like `"none"`.
    pub fn named_palette(&self) -> Option<&'static NamedPalette> {
        let key = self.palette.trim();
        if key.is_empty() || key.eq_ignore_ascii_case(NO_PALETTE) {
            return None;
        }
        let found = palettes::lookup(key);
        if found.is_none() {
            tracing::warn!(palette = key, "Unknown palette, skipping palette mapping");
        }
        found
    }
}

// ============================================================================
// OUTPUT
// ============================================================================

/// What each stage did during one render
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageReport {
    pub background_removed: usize,
    pub chroma_keyed: bool,
    pub outline: OutlineResult,
    pub noised: usize,
    pub palette_name: Option<String>,
    pub quantized_colors: usize,
}

/// Result of one render, published as a unit
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub image: RgbaImage,
    pub width: u32,
    pub height: u32,
    /// Distinct opaque colors of `image`, most frequent first
    pub palette: Vec<ColorCount>,
    /// Palette the quantization stage mapped to (empty when it was skipped)
    pub applied_palette: Vec<Color>,
    pub report: StageReport,
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Pipeline runner owning the random source used by noise and k-means
#[derive(Debug, Clone)]
pub struct Pipeline<R = StdRng> {
    rng: R,
}

impl Pipeline<StdRng> {
    pub fn new() -> Self {
        Self { rng: StdRng::from_entropy() }
    }

    /// Reproducible runner for tests and batch jobs
    pub fn seeded(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }
}

impl Default for Pipeline<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> Pipeline<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    /// Run all stages on a fresh copy of `source`.
    ///
    /// Returns `None` for a zero-area source; nothing else fails.
    pub fn process(&mut self, source: &RgbaImage, config: &PostProcessConfig) -> Option<PipelineOutput> {
        let (src_width, src_height) = source.dimensions();
        if src_width == 0 || src_height == 0 {
            tracing::debug!("Empty source bitmap, nothing to process");
            return None;
        }

        let config = config.sanitized();
        let mut report = StageReport::default();

        // 1. Downscale + color filter
        let mut image = filter::pixelate(source, config.pixel_size, &config.adjustments());

        // 2. Chroma key
        if let Some(key) = config.chroma_key() {
            report.background_removed = flood_fill::remove_background(&mut image, &key);
            report.chroma_keyed = true;
        }

        // 3. Outlines need a resolved transparent region
        let outline = config.outline();
        if report.chroma_keyed && outline.any_enabled() {
            report.outline = outline::add_outline(&mut image, &outline);
        }

        // 4. Noise
        report.noised = filter::add_noise(&mut image, config.noise, &mut self.rng);

        // 5. Quantization
        let applied_palette = if let Some(named) = config.named_palette() {
            quantize::map_to_palette(&mut image, named.colors);
            report.palette_name = Some(named.key.to_string());
            named.colors.to_vec()
        } else if config.reduce_colors > 0 {
            quantize::reduce_colors(&mut image, config.reduce_colors as usize, &mut self.rng)
        } else {
            Vec::new()
        };
        report.quantized_colors = applied_palette.len();

        // 6. Analysis
        let palette = quantize::analyze_palette(&image);
        let (width, height) = image.dimensions();

        tracing::debug!(
            width,
            height,
            colors = palette.len(),
            removed = report.background_removed,
            outer = report.outline.outer_painted,
            inner = report.outline.inner_painted,
            "Pipeline finished"
        );

        Some(PipelineOutput {
            image,
            width,
            height,
            palette,
            applied_palette,
            report,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantize::nearest_color;
    use image::Rgba;

    const MAGENTA: Rgba<u8> = Rgba([255, 0, 255, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    /// Magenta canvas with an opaque blue square at `[lo, hi)` on both axes
    fn square_on_magenta(size: u32, lo: u32, hi: u32) -> RgbaImage {
        RgbaImage::from_fn(size, size, |x, y| {
            if (lo..hi).contains(&x) && (lo..hi).contains(&y) {
                BLUE
            } else {
                MAGENTA
            }
        })
    }

    fn keyed_config() -> PostProcessConfig {
        PostProcessConfig {
            pixel_size: 1,
            remove_background: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_source() {
        let img = RgbaImage::new(0, 10);
        assert!(Pipeline::seeded(1).process(&img, &PostProcessConfig::default()).is_none());
    }

    #[test]
    fn test_output_dimensions() {
        let img = RgbaImage::from_pixel(65, 9, BLUE);
        let mut pipeline = Pipeline::seeded(1);

        let out = pipeline.process(&img, &PostProcessConfig::default()).unwrap();
        assert_eq!((out.width, out.height), (16, 2));
        assert_eq!(out.image.dimensions(), (16, 2));

        let config = PostProcessConfig { pixel_size: 0, ..Default::default() };
        let out = pipeline.process(&img, &config).unwrap();
        assert_eq!((out.width, out.height), (65, 9));

        let config = PostProcessConfig { pixel_size: 500, ..Default::default() };
        let out = pipeline.process(&img, &config).unwrap();
        assert_eq!((out.width, out.height), (1, 1));
    }

    #[test]
    fn test_source_is_not_mutated() {
        let img = square_on_magenta(8, 2, 6);
        let before = img.clone();
        let config = PostProcessConfig {
            outline_outer: true,
            noise: 30,
            reduce_colors: 2,
            ..keyed_config()
        };
        Pipeline::seeded(3).process(&img, &config).unwrap();
        assert_eq!(img, before);
    }

    #[test]
    fn test_alpha_is_binary_after_chroma_key() {
        let mut img = square_on_magenta(8, 2, 6);
        img.put_pixel(3, 3, Rgba([0, 0, 255, 60]));
        img.put_pixel(4, 4, Rgba([0, 0, 255, 200]));

        let out = Pipeline::seeded(1).process(&img, &keyed_config()).unwrap();
        assert!(out.image.pixels().all(|p| p[3] == 0 || p[3] == 255));
        assert_eq!(out.image.get_pixel(3, 3)[3], 0);
        assert_eq!(out.image.get_pixel(4, 4)[3], 255);
        assert_eq!(out.image.get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn test_outline_requires_chroma_key() {
        let img = square_on_magenta(8, 2, 6);
        let config = PostProcessConfig {
            pixel_size: 1,
            outline_outer: true,
            outline_inner: true,
            ..Default::default()
        };
        let out = Pipeline::seeded(1).process(&img, &config).unwrap();
        assert_eq!(out.image, img);
        assert_eq!(out.report.outline, OutlineResult::default());
    }

    #[test]
    fn test_malformed_key_color_skips_background_and_outline() {
        let img = square_on_magenta(8, 2, 6);
        let config = PostProcessConfig {
            transparent_color: "magenta-ish".to_string(),
            outline_outer: true,
            ..keyed_config()
        };
        let out = Pipeline::seeded(1).process(&img, &config).unwrap();
        assert!(!out.report.chroma_keyed);
        assert_eq!(out.image, img);
    }

    #[test]
    fn test_malformed_outline_colors_fall_back() {
        let img = square_on_magenta(8, 2, 6);
        let config = PostProcessConfig {
            outline_outer: true,
            outline_outer_color: "#GG0000".to_string(),
            outline_inner: true,
            outline_inner_color: String::new(),
            ..keyed_config()
        };
        let out = Pipeline::seeded(1).process(&img, &config).unwrap();

        // Ring around the square is white, square border is black, center stays blue
        assert_eq!(*out.image.get_pixel(1, 1), Rgba([255, 255, 255, 255]));
        assert_eq!(*out.image.get_pixel(2, 2), Rgba([0, 0, 0, 255]));
        assert_eq!(*out.image.get_pixel(3, 3), BLUE);
        assert_eq!(out.image.get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn test_non_ascii_colors_fall_back() {
        let img = square_on_magenta(8, 2, 6);
        let config = PostProcessConfig {
            outline_outer: true,
            outline_outer_color: "#€€".to_string(),
            grid_color: "#€".to_string(),
            ..keyed_config()
        };
        let out = Pipeline::seeded(1).process(&img, &config).unwrap();
        assert_eq!(*out.image.get_pixel(1, 1), Rgba([255, 255, 255, 255]));
        assert_eq!(out.report.outline.outer_painted, 6 * 6 - 4 * 4);

        // a key color that is not hex skips the chroma key instead of failing
        let config = PostProcessConfig {
            transparent_color: "#+F+F+F".to_string(),
            ..keyed_config()
        };
        let out = Pipeline::seeded(1).process(&img, &config).unwrap();
        assert!(!out.report.chroma_keyed);
        assert_eq!(out.image, img);
    }

    #[test]
    fn test_named_palette_wins_over_reduce_colors() {
        let img = RgbaImage::from_fn(16, 16, |x, y| Rgba([(x * 16) as u8, (y * 16) as u8, 90, 255]));
        let config = PostProcessConfig {
            pixel_size: 1,
            palette: "gameboy".to_string(),
            reduce_colors: 2,
            ..Default::default()
        };
        let out = Pipeline::seeded(1).process(&img, &config).unwrap();
        let gameboy = palettes::lookup("gameboy").unwrap().colors;

        assert_eq!(out.applied_palette, gameboy.to_vec());
        assert_eq!(out.report.palette_name.as_deref(), Some("gameboy"));
        for p in out.image.pixels() {
            assert!(gameboy.contains(&Rgb([p[0], p[1], p[2]])));
        }
    }

    #[test]
    fn test_unknown_palette_falls_through_to_reduce_colors() {
        let img = RgbaImage::from_fn(16, 16, |x, y| Rgba([(x * 16) as u8, (y * 16) as u8, 90, 255]));
        let config = PostProcessConfig {
            pixel_size: 1,
            palette: "vaporwave".to_string(),
            reduce_colors: 3,
            ..Default::default()
        };
        let out = Pipeline::seeded(9).process(&img, &config).unwrap();
        assert!(out.report.palette_name.is_none());
        assert!(!out.applied_palette.is_empty() && out.applied_palette.len() <= 3);
        assert!(out.palette.len() <= 3);
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let img = RgbaImage::from_fn(24, 24, |x, y| Rgba([(x * 10) as u8, (y * 10) as u8, ((x + y) * 5) as u8, 255]));
        let config = PostProcessConfig {
            pixel_size: 2,
            noise: 25,
            reduce_colors: 5,
            ..Default::default()
        };
        let a = Pipeline::seeded(42).process(&img, &config).unwrap();
        let b = Pipeline::seeded(42).process(&img, &config).unwrap();
        assert_eq!(a.image, b.image);
        assert_eq!(a.palette, b.palette);
    }

    #[test]
    fn test_outline_color_snaps_to_palette() {
        // Silver outline under a 1-bit palette ends up as its nearest entry
        let img = square_on_magenta(10, 3, 7);
        let silver = Rgb([0xC0, 0xC0, 0xC0]);
        let config = PostProcessConfig {
            outline_outer: true,
            outline_outer_color: "#C0C0C0".to_string(),
            palette: "1bit".to_string(),
            ..keyed_config()
        };
        let out = Pipeline::seeded(1).process(&img, &config).unwrap();
        let one_bit = palettes::lookup("1bit").unwrap().colors;
        let expected = nearest_color(silver, one_bit);

        assert_eq!(expected, Rgb([255, 255, 255]));
        assert_eq!(out.report.outline.outer_painted, 6 * 6 - 4 * 4);
        for y in 2..8 {
            for x in 2..8 {
                let ring = !(3..7).contains(&x) || !(3..7).contains(&y);
                if ring {
                    let p = out.image.get_pixel(x, y);
                    assert_eq!(Rgb([p[0], p[1], p[2]]), expected);
                    assert_eq!(p[3], 255);
                }
            }
        }
    }

    #[test]
    fn test_palette_excludes_transparent_pixels() {
        let img = square_on_magenta(8, 2, 6);
        let out = Pipeline::seeded(1).process(&img, &keyed_config()).unwrap();
        assert_eq!(out.palette.len(), 1);
        assert_eq!(out.palette[0].hex, "#0000FF");
        assert_eq!(out.palette[0].count, 16);
    }

    #[test]
    fn test_sanitized_clamps() {
        let config = PostProcessConfig {
            pixel_size: 0,
            brightness: 250.0,
            hue: -720.0,
            saturation: f32::NAN,
            noise: 1000,
            reduce_colors: 99,
            transparency_tolerance: -5.0,
            outline_outer_width: 0,
            outline_inner_width: 40,
            grid_size: 0,
            grid_opacity: 3.0,
            ..Default::default()
        }
        .sanitized();

        assert_eq!(config.pixel_size, 1);
        assert_eq!(config.brightness, 100.0);
        assert_eq!(config.hue, -180.0);
        assert_eq!(config.saturation, 0.0);
        assert_eq!(config.noise, 100);
        assert_eq!(config.reduce_colors, 32);
        assert_eq!(config.transparency_tolerance, 0.0);
        assert_eq!(config.outline_outer_width, 1);
        assert_eq!(config.outline_inner_width, 8);
        assert_eq!(config.grid_size, 1);
        assert_eq!(config.grid_opacity, 1.0);
    }

    #[test]
    fn test_config_json_uses_camel_case_and_defaults() {
        let config: PostProcessConfig = serde_json::from_str(
            r##"{"pixelSize": 2, "removeBackground": true, "outlineOuterColor": "#123456"}"##,
        )
        .unwrap();
        assert_eq!(config.pixel_size, 2);
        assert!(config.remove_background);
        assert_eq!(config.outline_outer_color, "#123456");
        assert_eq!(config.transparent_color, "#FF00FF");
        assert_eq!(config.transparency_tolerance, 10.0);
        assert!(config.contiguous);

        let json = serde_json::to_value(&config).unwrap();
        assert!(json.get("transparencyTolerance").is_some());
        assert!(json.get("outlineInnerWidth").is_some());
    }
}
