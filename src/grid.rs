//! Display-only grid overlay.
//!
//! Drawn onto an upscaled preview copy, never onto the processed or exported bitmap.

use image::{Rgb, Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut, Blend};
use imageproc::rect::Rect;

use crate::color::{parse_hex_or, Color};
use crate::filter::resample_nearest;
use crate::pipeline::PostProcessConfig;

const FALLBACK_GRID_COLOR: Color = Rgb([0, 240, 255]);
const BORDER_COLOR: Rgba<u8> = Rgba([255, 255, 255, 77]);

/// Longest preview edge the scale factor may produce
pub const MAX_PREVIEW_EDGE: u32 = 8192;

#[derive(Debug, Clone, PartialEq)]
pub struct GridSettings {
    /// Cell size in art pixels
    pub size: u32,
    /// 0..1
    pub opacity: f32,
    pub color: Color,
}

impl GridSettings {
    /// Grid settings from a config, `None` when the grid is hidden
    pub fn from_config(config: &PostProcessConfig) -> Option<Self> {
        if !config.show_grid {
            return None;
        }
        let config = config.sanitized();
        Some(Self {
            size: config.grid_size,
            opacity: config.grid_opacity,
            color: parse_hex_or(&config.grid_color, FALLBACK_GRID_COLOR, "gridColor"),
        })
    }

    fn stroke(&self) -> Rgba<u8> {
        let alpha = (self.opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
        Rgba([self.color[0], self.color[1], self.color[2], alpha])
    }
}

/// `scale` clamped so the preview's long edge stays within [`MAX_PREVIEW_EDGE`]
/// (never below 1)
pub fn preview_scale(width: u32, height: u32, scale: u32) -> u32 {
    let longest = width.max(height).max(1);
    scale.min(MAX_PREVIEW_EDGE / longest).max(1)
}

/// Upscale `img` by `scale` for display and draw the grid on top
pub fn render_preview(img: &RgbaImage, grid: Option<&GridSettings>, scale: u32) -> RgbaImage {
    let (width, height) = img.dimensions();
    let scale = preview_scale(width, height, scale);
    let preview = resample_nearest(img, width * scale, height * scale);

    let Some(grid) = grid else {
        return preview;
    };
    let (out_width, out_height) = preview.dimensions();
    if out_width == 0 || out_height == 0 {
        return preview;
    }

    let mut canvas = Blend(preview);
    let step = grid.size.max(1).saturating_mul(scale);
    let stroke = grid.stroke();

    for x in (step..out_width).step_by(step as usize) {
        draw_line_segment_mut(&mut canvas, (x as f32, 0.0), (x as f32, (out_height - 1) as f32), stroke);
    }
    for y in (step..out_height).step_by(step as usize) {
        draw_line_segment_mut(&mut canvas, (0.0, y as f32), ((out_width - 1) as f32, y as f32), stroke);
    }

    draw_hollow_rect_mut(&mut canvas, Rect::at(0, 0).of_size(out_width, out_height), BORDER_COLOR);

    canvas.0
}
