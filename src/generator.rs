//! Generative image producer seam.
//!
//! The pipeline only needs "give me an encoded bitmap for this request". The
//! network client lives outside this crate and implements [`ImageGenerator`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::sprite_sheet::SpriteSheetConfig;

/// Console / era aesthetic requested from the generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PixelStyle {
    #[default]
    Snes,
    Sega,
    Gameboy,
    Gbc,
    Nes,
    Ps1,
    Atari,
    Modern,
    Isometric,
    Cyberpunk,
    Fantasy,
    PointAndClick,
}

impl PixelStyle {
    pub fn label(&self) -> &'static str {
        match self {
            PixelStyle::Snes => "SNES (16-bit)",
            PixelStyle::Sega => "Sega Genesis",
            PixelStyle::Gameboy => "Game Boy (Green)",
            PixelStyle::Gbc => "Game Boy Color",
            PixelStyle::Nes => "NES (8-bit)",
            PixelStyle::Ps1 => "PS1 (Low Poly)",
            PixelStyle::Atari => "Atari 2600",
            PixelStyle::Modern => "Modern Pixel Art",
            PixelStyle::Isometric => "Isometric RPG",
            PixelStyle::Cyberpunk => "Cyberpunk / Neon",
            PixelStyle::Fantasy => "Fantasy Console (Pico-8)",
            PixelStyle::PointAndClick => "Point & Click Adventure",
        }
    }
}

impl fmt::Display for PixelStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What kind of asset to generate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputType {
    #[default]
    Single,
    Sheet,
    Scene,
    Icon,
    Portrait,
    Tile,
}

impl OutputType {
    pub fn label(&self) -> &'static str {
        match self {
            OutputType::Single => "Single Sprite",
            OutputType::Sheet => "Sprite Sheet",
            OutputType::Scene => "Full Scene / Background",
            OutputType::Icon => "Icon / Item",
            OutputType::Portrait => "Character Portrait",
            OutputType::Tile => "Seamless Tile",
        }
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Everything the generator is asked for
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationRequest {
    pub prompt: String,
    pub style: PixelStyle,
    pub output_type: OutputType,
    /// `"1:1"`, `"16:9"`, `"9:16"`, `"4:3"` or `"3:4"`
    pub aspect_ratio: String,
    pub sheet: SpriteSheetConfig,
    /// Solid background to request (hex), or `None` / `"none"` for a natural one
    pub background: Option<String>,
    /// Encoded bitmap to edit in place
    #[serde(skip)]
    pub reference_image: Option<Vec<u8>>,
}

impl GenerationRequest {
    fn solid_background(&self) -> Option<&str> {
        self.background
            .as_deref()
            .map(str::trim)
            .filter(|bg| !bg.is_empty() && !bg.eq_ignore_ascii_case("none"))
    }

    /// Text prompt sent alongside the optional reference bitmap
    pub fn build_prompt(&self) -> String {
        let subject = self.prompt.trim();

        if self.reference_image.is_some() {
            return format!(
                "Edit the provided image based on this instruction: {subject}.\n\
                 - Keep the {style} pixel art look.\n\
                 - If the instruction asks for a different style, switch to that style.\n\
                 - Fit any added or removed elements to the existing pixel grid.\n",
                style = self.style,
            );
        }

        let mut prompt = format!(
            "Generate a pixel art image.\n\
             Subject: {subject}.\n\
             Style: {style}.\n\
             Type: {kind}.\n\
             \n\
             Framing:\n\
             - Fill the canvas with the subject and crop tightly.\n\
             - The subject covers at least 90% of the image in both directions.\n\
             - No large empty margins.\n\
             \n\
             Rendering:\n\
             - Hard pixel edges at the requested bit depth.\n\
             - No anti-aliasing and no blur.\n",
            style = self.style,
            kind = self.output_type,
        );

        match self.solid_background() {
            Some(bg) => prompt.push_str(&format!(
                "- Flat background of exactly {bg} so it can be keyed out.\n"
            )),
            None => prompt.push_str("- Background may be natural or fill the canvas.\n"),
        }

        match self.output_type {
            OutputType::Sheet => {
                let sheet = self.sheet.sanitized();
                prompt.push_str(&format!(
                    "- Lay out a sprite sheet of exactly {} columns by {} rows.\n\
                     - Leave about {}px between sprites.\n\
                     - Keep every sprite aligned to the grid.\n",
                    sheet.columns, sheet.rows, sheet.padding
                ));
            }
            OutputType::Tile => prompt.push_str(
                "- Seamless repeating texture covering the whole canvas.\n\
                 - No margins and no background color.\n\
                 - Opposite edges must match when tiled.\n\
                 - Flat top-down view for map tiles.\n",
            ),
            OutputType::Icon => prompt.push_str(
                "- One centered item touching the canvas edges.\n\
                 - Readable at small sizes.\n",
            ),
            OutputType::Single => prompt.push_str(
                "- One character or object, zoomed in as far as possible.\n",
            ),
            OutputType::Scene | OutputType::Portrait => {}
        }

        prompt
    }
}

/// Source of bitmaps from a text (and optional image) prompt.
///
/// Returns the encoded payload (PNG, JPEG, ...). Failures carry a human-readable
/// message in [`crate::PixelsError::Generator`].
pub trait ImageGenerator: Send + Sync {
    fn generate(&self, request: &GenerationRequest) -> Result<Vec<u8>>;
}
