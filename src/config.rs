//! Configuration document.
//!
//! One JSON file holding post-processing, sprite-sheet and playback settings, in
//! the same camelCase shape the UI layer produces.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::pipeline::PostProcessConfig;
use crate::sprite_sheet::{PlaybackConfig, SpriteSheetConfig};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PixelConfig {
    pub post_process: PostProcessConfig,
    pub sheet_config: SpriteSheetConfig,
    pub playback: PlaybackConfig,
}

impl PixelConfig {
    /// Read a config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PixelConfig = serde_json::from_str(&content)?;
        tracing::debug!(path = %path.display(), "Config loaded");
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Copy with every numeric field clamped into range
    pub fn sanitized(&self) -> Self {
        Self {
            post_process: self.post_process.sanitized(),
            sheet_config: self.sheet_config.sanitized(),
            playback: self.playback.sanitized(),
        }
    }
}
