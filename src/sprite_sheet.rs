//! Sprite-sheet frame extraction, auto-centering and playback.
//!
//! Frame geometry comes only from columns/rows against the actual bitmap size;
//! `padding` is advisory (it is passed to the generator prompt) and ignored here.

use image::{imageops, RgbaImage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::pipeline::PipelineOutput;

pub const MAX_GRID_CELLS: u32 = 12;
pub const MIN_FPS: u32 = 1;
pub const MAX_FPS: u32 = 60;

// ============================================================================
// SETTINGS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpriteSheetConfig {
    pub columns: u32,
    pub rows: u32,
    /// Pixels between sprites, requested from the generator only
    pub padding: u32,
}

impl Default for SpriteSheetConfig {
    fn default() -> Self {
        Self {
            columns: 4,
            rows: 1,
            padding: 8,
        }
    }
}

impl SpriteSheetConfig {
    pub fn sanitized(&self) -> Self {
        Self {
            columns: self.columns.clamp(1, MAX_GRID_CELLS),
            rows: self.rows.clamp(1, MAX_GRID_CELLS),
            padding: self.padding,
        }
    }

    pub fn frame_count(&self) -> u32 {
        self.columns.max(1) * self.rows.max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaybackConfig {
    /// Frames per second
    pub animation_speed: u32,
    pub auto_center: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            animation_speed: 8,
            auto_center: true,
        }
    }
}

impl PlaybackConfig {
    pub fn sanitized(&self) -> Self {
        Self {
            animation_speed: self.animation_speed.clamp(MIN_FPS, MAX_FPS),
            auto_center: self.auto_center,
        }
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.animation_speed.clamp(MIN_FPS, MAX_FPS) as f64)
    }
}

// ============================================================================
// GEOMETRY
// ============================================================================

/// Inclusive bounding box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Bounds {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl Bounds {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }
}

/// `(⌊w/columns⌋, ⌊h/rows⌋)`, or `None` when that is zero-area
pub fn frame_size(sheet_width: u32, sheet_height: u32, config: &SpriteSheetConfig) -> Option<(u32, u32)> {
    let frame_width = sheet_width / config.columns.max(1);
    let frame_height = sheet_height / config.rows.max(1);
    if frame_width == 0 || frame_height == 0 {
        None
    } else {
        Some((frame_width, frame_height))
    }
}

/// Bounding box of every pixel with alpha > 0
pub fn opaque_bounds(img: &RgbaImage) -> Option<Bounds> {
    let mut bounds: Option<Bounds> = None;

    for (x, y, pixel) in img.enumerate_pixels() {
        if pixel[3] == 0 {
            continue;
        }
        bounds = Some(match bounds {
            None => Bounds { min_x: x, min_y: y, max_x: x, max_y: y },
            Some(b) => Bounds {
                min_x: b.min_x.min(x),
                min_y: b.min_y.min(y),
                max_x: b.max_x.max(x),
                max_y: b.max_y.max(y),
            },
        });
    }

    bounds
}

// ============================================================================
// EXTRACTION
// ============================================================================

/// Move the opaque content so its bounding box is centered in the frame.
///
/// Frame dimensions never change. An empty frame is returned as-is.
pub fn auto_center(frame: &RgbaImage) -> RgbaImage {
    let Some(bounds) = opaque_bounds(frame) else {
        return frame.clone();
    };

    let (width, height) = frame.dimensions();
    let dx = (width - bounds.width()) as i64 / 2 - bounds.min_x as i64;
    let dy = (height - bounds.height()) as i64 / 2 - bounds.min_y as i64;
    if dx == 0 && dy == 0 {
        return frame.clone();
    }

    let mut centered = RgbaImage::new(width, height);
    imageops::replace(&mut centered, frame, dx, dy);
    centered
}

/// Extract frame `index` (row-major) from a processed sheet.
///
/// `None` when the index is out of range or the frames would be zero-area.
pub fn extract_frame(
    sheet: &RgbaImage,
    config: &SpriteSheetConfig,
    index: u32,
    center: bool,
) -> Option<RgbaImage> {
    let config = config.sanitized();
    if index >= config.frame_count() {
        return None;
    }
    let (frame_width, frame_height) = frame_size(sheet.width(), sheet.height(), &config)?;

    let col = index % config.columns;
    let row = index / config.columns;
    let frame = imageops::crop_imm(sheet, col * frame_width, row * frame_height, frame_width, frame_height).to_image();

    Some(if center { auto_center(&frame) } else { frame })
}

/// All frames in row-major order; empty when the frames would be zero-area
pub fn extract_frames(sheet: &RgbaImage, config: &SpriteSheetConfig, center: bool) -> Vec<RgbaImage> {
    let config = config.sanitized();
    let frames: Vec<RgbaImage> = (0..config.frame_count())
        .filter_map(|index| extract_frame(sheet, &config, index, center))
        .collect();

    if frames.is_empty() {
        tracing::debug!(
            width = sheet.width(),
            height = sheet.height(),
            columns = config.columns,
            rows = config.rows,
            "Sheet too small for its grid, no frames"
        );
    }
    frames
}

// ============================================================================
// PLAYBACK
// ============================================================================

/// One rendered animation frame
#[derive(Debug, Clone)]
pub struct AnimationFrame {
    pub index: u32,
    pub image: RgbaImage,
}

/// Frame cursor advanced once per timer tick.
///
/// The sheet is passed on every tick, so a re-render published mid-playback is
/// picked up by the next frame.
#[derive(Debug, Clone)]
pub struct AnimationPlayer {
    sheet: SpriteSheetConfig,
    playback: PlaybackConfig,
    cursor: u32,
}

impl AnimationPlayer {
    pub fn new(sheet: SpriteSheetConfig, playback: PlaybackConfig) -> Self {
        Self {
            sheet: sheet.sanitized(),
            playback: playback.sanitized(),
            cursor: 0,
        }
    }

    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    pub fn frame_interval(&self) -> Duration {
        self.playback.frame_interval()
    }

    /// Swap configuration; the cursor wraps into the new frame range
    pub fn reconfigure(&mut self, sheet: SpriteSheetConfig, playback: PlaybackConfig) {
        self.sheet = sheet.sanitized();
        self.playback = playback.sanitized();
        self.cursor %= self.sheet.frame_count();
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Render the frame under the cursor, then advance it
    pub fn tick(&mut self, sheet: &RgbaImage) -> Option<AnimationFrame> {
        let index = self.cursor;
        self.cursor = (self.cursor + 1) % self.sheet.frame_count();

        extract_frame(sheet, &self.sheet, index, self.playback.auto_center)
            .map(|image| AnimationFrame { index, image })
    }
}

/// Drive `player` on a timer, reading the latest published output on every tick.
///
/// Runs until the receiver is dropped.
pub fn spawn_playback<F>(
    mut player: AnimationPlayer,
    latest: F,
    frames: mpsc::Sender<AnimationFrame>,
) -> JoinHandle<()>
where
    F: Fn() -> Option<Arc<PipelineOutput>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(player.frame_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            let Some(output) = latest() else {
                continue;
            };
            let Some(frame) = player.tick(&output.image) else {
                continue;
            };
            if frames.send(frame).await.is_err() {
                tracing::debug!("Playback receiver dropped, stopping");
                break;
            }
        }
    })
}

// ============================================================================
// TESTS
// ============================================================================
