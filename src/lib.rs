//! Pixel-art post-processing.
//!
//! Takes a generated or uploaded bitmap and runs a fixed chain of transforms on it:
//! nearest-neighbor pixelation with color adjustments, chroma-key transparency,
//! inner/outer outlines, noise, and palette quantization. Processed sprite sheets
//! can be sliced into auto-centered animation frames.

pub mod color;
pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod flood_fill;
pub mod generator;
pub mod grid;
pub mod mask;
pub mod outline;
pub mod palettes;
pub mod pipeline;
pub mod quantize;
pub mod session;
pub mod sprite_sheet;

pub use config::PixelConfig;
pub use error::{PixelsError, Result};
pub use generator::{GenerationRequest, ImageGenerator, OutputType, PixelStyle};
pub use mask::PixelMask;
pub use pipeline::{Pipeline, PipelineOutput, PostProcessConfig};
pub use session::RenderSession;
pub use sprite_sheet::{AnimationPlayer, PlaybackConfig, SpriteSheetConfig};
