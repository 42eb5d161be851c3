//! Loading, encoding and saving bitmaps.
//!
//! Downloads come in two sizes: the native processed bitmap, and an "HD" copy
//! upscaled by an integer nearest-neighbor factor to roughly 2048px.

use chrono::{DateTime, Utc};
use image::RgbaImage;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::error::{PixelsError, Result};
use crate::filter::resample_nearest;

/// Target long edge of the HD export
pub const HD_TARGET: u32 = 2048;

const FILENAME_PREFIX: &str = "pixel-banana";

/// Encoded bitmap ready for a save dialog
#[derive(Debug, Clone)]
pub struct Download {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Load an image from disk into memory
pub fn load_image(path: &Path) -> Result<RgbaImage> {
    let img = image::open(path)
        .map_err(|e| PixelsError::Processing(format!("Failed to load {}: {}", path.display(), e)))?;
    Ok(img.to_rgba8())
}

/// Save an in-memory image to disk, creating parent directories
pub fn save_image(img: &RgbaImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    img.save(path)?;
    Ok(())
}

/// Encode image as PNG bytes
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, image::ImageFormat::Png)
        .map_err(|e| PixelsError::Processing(format!("Failed to encode PNG: {}", e)))?;
    Ok(buffer.into_inner())
}

/// `ceil(2048 / max(w, h))`, at least 1
pub fn hd_factor(width: u32, height: u32) -> u32 {
    let longest = width.max(height).max(1);
    HD_TARGET.div_ceil(longest).max(1)
}

/// Nearest-neighbor upscale by [`hd_factor`]
pub fn upscale_hd(img: &RgbaImage) -> RgbaImage {
    let (width, height) = img.dimensions();
    let factor = hd_factor(width, height);
    if factor == 1 {
        return img.clone();
    }
    resample_nearest(img, width * factor, height * factor)
}

pub fn native_filename(now: DateTime<Utc>) -> String {
    format!("{}-native-{}.png", FILENAME_PREFIX, now.timestamp_millis())
}

pub fn hd_filename(now: DateTime<Utc>) -> String {
    format!("{}-hd-{}.png", FILENAME_PREFIX, now.timestamp_millis())
}

pub fn native_download(img: &RgbaImage, now: DateTime<Utc>) -> Result<Download> {
    Ok(Download {
        filename: native_filename(now),
        bytes: encode_png(img)?,
    })
}

pub fn hd_download(img: &RgbaImage, now: DateTime<Utc>) -> Result<Download> {
    Ok(Download {
        filename: hd_filename(now),
        bytes: encode_png(&upscale_hd(img))?,
    })
}

/// Write a download into `dir`, returning the full path
pub fn write_download(download: &Download, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(&download.filename);
    std::fs::write(&path, &download.bytes)?;
    Ok(path)
}

/// Save animation frames as `<stem>-<index>.png` in `dir`
pub fn save_frames(frames: &[RgbaImage], dir: &Path, stem: &str) -> Result<Vec<PathBuf>> {
    frames
        .iter()
        .enumerate()
        .map(|(index, frame)| {
            let path = dir.join(format!("{}-{:02}.png", stem, index));
            save_image(frame, &path)?;
            Ok(path)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use image::Rgba;

    #[test]
    fn test_hd_factor() {
        assert_eq!(hd_factor(32, 32), 64);
        assert_eq!(hd_factor(100, 30), 21);
        assert_eq!(hd_factor(2048, 10), 1);
        assert_eq!(hd_factor(5000, 5000), 1);
        assert_eq!(hd_factor(0, 0), 2048);
    }

    #[test]
    fn test_upscale_is_blocky() {
        let img = RgbaImage::from_fn(2, 1, |x, _| {
            if x == 0 { Rgba([255, 0, 0, 255]) } else { Rgba([0, 0, 255, 0]) }
        });
        let hd = upscale_hd(&img);
        assert_eq!(hd.dimensions(), (2048, 1024));
        assert_eq!(*hd.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(*hd.get_pixel(1023, 1023), Rgba([255, 0, 0, 255]));
        assert_eq!(*hd.get_pixel(1024, 0), Rgba([0, 0, 255, 0]));
        assert_eq!(*hd.get_pixel(2047, 1023), Rgba([0, 0, 255, 0]));
    }

    #[test]
    fn test_filenames() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(native_filename(now), "pixel-banana-native-1700000000123.png");
        assert_eq!(hd_filename(now), "pixel-banana-hd-1700000000123.png");
    }

    #[test]
    fn test_encode_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let img = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 255]));

        let bytes = encode_png(&img).unwrap();
        assert_eq!(&bytes[..4], b"\x89PNG");
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded, img);

        let path = dir.path().join("nested/out.png");
        save_image(&img, &path).unwrap();
        assert_eq!(load_image(&path).unwrap(), img);

        let frames = vec![img.clone(), img];
        let paths = save_frames(&frames, dir.path(), "walk").unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[1].ends_with("walk-01.png"));
    }
}
