//! bitframe control tool
//!
//! Runs the transcoding pipeline on local files and inspects packed blobs
//! without a running daemon.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bitframe_codec::{unpack, BlobLayout, DecodeLimits, Variant};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum CliVariant {
    /// 1-bit thresholded bitmap with size header
    #[default]
    Mono,
    /// 16-bit big-endian RGB565
    Color,
}

impl From<CliVariant> for Variant {
    fn from(variant: CliVariant) -> Self {
        match variant {
            CliVariant::Mono => Variant::Mono,
            CliVariant::Color => Variant::Color,
        }
    }
}

#[derive(Parser)]
#[command(name = "bitframectl")]
#[command(about = "Transcode images into device bitmaps and inspect the results")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transcode a local image file into a packed blob
    Transcode {
        /// Source image (PNG, GIF, JPEG, ...)
        input: PathBuf,
        /// Output blob path
        #[arg(short, long, default_value = "image.bin")]
        output: PathBuf,
        /// Pixel encoding
        #[arg(long, default_value = "mono", value_enum)]
        variant: CliVariant,
        /// Target width (defaults per variant)
        #[arg(long)]
        width: Option<u32>,
        /// Target height (defaults per variant)
        #[arg(long)]
        height: Option<u32>,
        /// Also write normalized frames as PNG into this directory
        #[arg(long)]
        frames_dir: Option<PathBuf>,
    },
    /// Describe the layout of a packed blob
    Inspect {
        /// Blob path
        input: PathBuf,
        #[arg(long, default_value = "mono", value_enum)]
        variant: CliVariant,
        /// Frame width, required for color blobs
        #[arg(long)]
        width: Option<u32>,
        /// Frame height, required for color blobs
        #[arg(long)]
        height: Option<u32>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Render one frame of a packed blob to PNG
    Preview {
        /// Blob path
        input: PathBuf,
        /// Output PNG path
        #[arg(short, long, default_value = "preview.png")]
        output: PathBuf,
        #[arg(long, default_value = "mono", value_enum)]
        variant: CliVariant,
        /// Frame width, required for color blobs
        #[arg(long)]
        width: Option<u32>,
        /// Frame height, required for color blobs
        #[arg(long)]
        height: Option<u32>,
        /// Frame index
        #[arg(long, default_value_t = 0)]
        frame: usize,
    },
}

/// Summary printed by `inspect`.
#[derive(Serialize)]
struct BlobSummary {
    variant: String,
    width: u32,
    height: u32,
    frames: usize,
    header_bytes: usize,
    frame_bytes: usize,
    total_bytes: usize,
}

impl From<&BlobLayout> for BlobSummary {
    fn from(layout: &BlobLayout) -> Self {
        Self {
            variant: layout.variant.to_string(),
            width: layout.width,
            height: layout.height,
            frames: layout.frames,
            header_bytes: layout.header_len(),
            frame_bytes: layout.frame_len(),
            total_bytes: layout.len(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Transcode {
            input,
            output,
            variant,
            width,
            height,
            frames_dir,
        } => handle_transcode(&input, &output, variant.into(), width, height, frames_dir.as_deref()),
        Commands::Inspect {
            input,
            variant,
            width,
            height,
            json,
        } => handle_inspect(&input, variant.into(), dimensions(width, height)?, json),
        Commands::Preview {
            input,
            output,
            variant,
            width,
            height,
            frame,
        } => handle_preview(&input, &output, variant.into(), dimensions(width, height)?, frame),
    }
}

fn dimensions(width: Option<u32>, height: Option<u32>) -> Result<Option<(u32, u32)>> {
    match (width, height) {
        (Some(w), Some(h)) => Ok(Some((w, h))),
        (None, None) => Ok(None),
        _ => bail!("--width and --height must be given together"),
    }
}

fn handle_transcode(
    input: &Path,
    output: &Path,
    variant: Variant,
    width: Option<u32>,
    height: Option<u32>,
    frames_dir: Option<&Path>,
) -> Result<()> {
    let (default_width, default_height) = variant.default_dimensions();
    let width = width.unwrap_or(default_width);
    let height = height.unwrap_or(default_height);

    let source = std::fs::read(input).with_context(|| format!("Failed to read {:?}", input))?;
    debug!("Read {} bytes from {:?}", source.len(), input);

    let transcoded = bitframe_codec::transcode(&source, variant, width, height, &DecodeLimits::default())
        .with_context(|| format!("Failed to transcode {:?}", input))?;

    if let Some(dir) = frames_dir {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
        for frame in &transcoded.normalized {
            let path = dir.join(format!("frame_{:03}_t.png", frame.index));
            frame
                .image
                .save(&path)
                .with_context(|| format!("Failed to write {:?}", path))?;
        }
    }

    std::fs::write(output, transcoded.blob.as_bytes())
        .with_context(|| format!("Failed to write {:?}", output))?;

    println!(
        "Wrote {} {}x{} frame(s) as {} to {:?} ({} bytes)",
        transcoded.normalized.len(),
        width,
        height,
        variant,
        output,
        transcoded.blob.len()
    );
    Ok(())
}

fn read_layout(input: &Path, variant: Variant, dims: Option<(u32, u32)>) -> Result<(Vec<u8>, BlobLayout)> {
    let blob = std::fs::read(input).with_context(|| format!("Failed to read {:?}", input))?;
    if !variant.has_header() && dims.is_none() {
        bail!("Color blobs carry no header; pass --width and --height");
    }
    let layout = BlobLayout::detect(variant, &blob, dims)?;
    Ok((blob, layout))
}

fn handle_inspect(input: &Path, variant: Variant, dims: Option<(u32, u32)>, json: bool) -> Result<()> {
    let (_, layout) = read_layout(input, variant, dims)?;
    let summary = BlobSummary::from(&layout);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Blob {:?}:", input);
        println!("  Variant: {}", summary.variant);
        println!("  Frame size: {}x{}", summary.width, summary.height);
        println!("  Frames: {}", summary.frames);
        println!("  Header: {} bytes", summary.header_bytes);
        println!("  Per frame: {} bytes", summary.frame_bytes);
        println!("  Total: {} bytes", summary.total_bytes);
    }
    Ok(())
}

fn handle_preview(
    input: &Path,
    output: &Path,
    variant: Variant,
    dims: Option<(u32, u32)>,
    frame: usize,
) -> Result<()> {
    let (blob, layout) = read_layout(input, variant, dims)?;
    if frame >= layout.frames {
        bail!("Frame {} out of range, blob has {} frame(s)", frame, layout.frames);
    }

    let mut frames = unpack(&blob, &layout)?;
    let image = frames.swap_remove(frame);
    image
        .save(output)
        .with_context(|| format!("Failed to write {:?}", output))?;

    println!("Frame {} saved to: {:?}", frame, output);
    Ok(())
}
