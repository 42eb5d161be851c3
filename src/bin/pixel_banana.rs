use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pixel_banana::export;
use pixel_banana::grid::{self, GridSettings};
use pixel_banana::session::SourceImage;
use pixel_banana::sprite_sheet::{self, SpriteSheetConfig};
use pixel_banana::{PixelConfig, RenderSession};

#[derive(Parser)]
#[command(author, version, about = "Pixel-art post-processing", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the post-processing pipeline on an image
    Process {
        /// Source image
        #[arg(short, long)]
        input: PathBuf,
        /// Processed PNG to write
        #[arg(short, long)]
        output: PathBuf,
        /// JSON config (defaults when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Override pixelSize from the config
        #[arg(long)]
        pixel_size: Option<u32>,
        /// Override the named palette from the config
        #[arg(long)]
        palette: Option<String>,
        /// Seed for noise and adaptive palettes
        #[arg(long)]
        seed: Option<u64>,
        /// Also write a ~2048px nearest-neighbor upscale next to the output
        #[arg(long)]
        hd: bool,
        /// Slice the result into sprite-sheet frames in this directory
        #[arg(long)]
        frames: Option<PathBuf>,
    },
    /// Slice an already processed sprite sheet into frames
    Frames {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        out_dir: PathBuf,
        #[arg(long, default_value_t = 4)]
        columns: u32,
        #[arg(long, default_value_t = 1)]
        rows: u32,
        /// Keep frames unshifted
        #[arg(long)]
        no_center: bool,
    },
    /// Upscale an image for display with the grid overlay
    Preview {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Screen pixels per art pixel
        #[arg(long, default_value_t = 8)]
        scale: u32,
    },
    /// Write a config file with every default filled in
    InitConfig {
        #[arg(short, long, default_value = "pixel-banana.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pixel_banana=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            input,
            output,
            config,
            pixel_size,
            palette,
            seed,
            hd,
            frames,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(pixel_size) = pixel_size {
                config.post_process.pixel_size = pixel_size;
            }
            if let Some(palette) = palette {
                config.post_process.palette = palette;
            }
            process(&input, &output, &config, seed, hd, frames.as_deref()).await?;
        }
        Commands::Frames {
            input,
            out_dir,
            columns,
            rows,
            no_center,
        } => {
            let sheet = export::load_image(&input)?;
            let sheet_config = SpriteSheetConfig { columns, rows, padding: 0 };
            write_frames(&sheet, &sheet_config, !no_center, &out_dir)?;
        }
        Commands::Preview {
            input,
            output,
            config,
            scale,
        } => {
            let config = load_config(config.as_deref())?;
            let img = export::load_image(&input)?;
            let mut post = config.post_process;
            post.show_grid = true;
            let grid = GridSettings::from_config(&post);
            let preview = grid::render_preview(&img, grid.as_ref(), scale);
            export::save_image(&preview, &output)?;
            info!(path = %output.display(), "Preview written");
        }
        Commands::InitConfig { output } => {
            PixelConfig::default()
                .save(&output)
                .with_context(|| format!("writing {}", output.display()))?;
            info!(path = %output.display(), "Default config written");
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<PixelConfig> {
    match path {
        Some(path) => PixelConfig::load(path).with_context(|| format!("reading config {}", path.display())),
        None => Ok(PixelConfig::default()),
    }
}

async fn process(
    input: &Path,
    output: &Path,
    config: &PixelConfig,
    seed: Option<u64>,
    hd: bool,
    frames_dir: Option<&Path>,
) -> Result<()> {
    let source = export::load_image(input)?;
    info!(path = %input.display(), width = source.width(), height = source.height(), "Source loaded");

    let session = Arc::new(RenderSession::new());
    let ticket = session.begin_load();
    session.set_source(&ticket, SourceImage::new(source));

    if !session.render(config.post_process.clone(), seed).await? {
        bail!("nothing was rendered from {}", input.display());
    }
    let Some(result) = session.latest() else {
        bail!("no output published");
    };

    export::save_image(&result.image, output)?;
    info!(
        path = %output.display(),
        width = result.width,
        height = result.height,
        colors = result.palette.len(),
        "Processed image written"
    );

    if hd {
        let dir = output.parent().unwrap_or_else(|| Path::new("."));
        let download = export::hd_download(&result.image, chrono::Utc::now())?;
        let path = export::write_download(&download, dir)?;
        info!(path = %path.display(), "HD copy written");
    }

    if let Some(dir) = frames_dir {
        write_frames(&result.image, &config.sheet_config, config.playback.auto_center, dir)?;
    }

    for entry in &result.palette {
        println!("{} {}", entry.hex, entry.count);
    }

    Ok(())
}

fn write_frames(sheet: &image::RgbaImage, config: &SpriteSheetConfig, center: bool, dir: &Path) -> Result<()> {
    let frames = sprite_sheet::extract_frames(sheet, config, center);
    if frames.is_empty() {
        bail!(
            "{}x{} sheet is too small for {} columns x {} rows",
            sheet.width(),
            sheet.height(),
            config.columns,
            config.rows
        );
    }
    let paths = export::save_frames(&frames, dir, "frame")?;
    info!(count = paths.len(), dir = %dir.display(), "Frames written");
    Ok(())
}
