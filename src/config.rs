//! Configuration for the series reader and the `series-info` tool.
//!
//! This module provides:
//! - [`ReaderOptions`], the library-level knobs of a [`SeriesReader`](crate::series::SeriesReader)
//! - Command-line arguments via clap, with environment variables using the
//!   `ISR_` prefix
//!
//! # Example
//!
//! ```ignore
//! use image_series_reader::config::Cli;
//!
//! // Parse from command line and environment
//! let cli = Cli::parse();
//! match cli.into_command() { /* ... */ }
//! ```
//!
//! # Environment Variables
//!
//! - `ISR_CACHE_BYTES` - Plane cache capacity in bytes (default: 256MB, 0 disables)
//! - `ISR_MAX_PLANE_BYTES` - Largest plane read in one buffer (default: 2^31 - 1)
//! - `ISR_SERIES` - Series to read (default: 0)
//! - `ISR_QUALITY` - JPEG quality for image output (default: 75)
//! - `ISR_FORMAT` - Report format for `info`, `text` or `json` (default: text)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::pyramid::MAX_PLANE_BYTES;
use crate::render::{OutputFormat, DEFAULT_QUALITY};
use crate::series::{PlaneCoordinate, DEFAULT_PLANE_CACHE_CAPACITY};

// =============================================================================
// Reader Options
// =============================================================================

/// Tunables of a single reader instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Plane cache capacity in bytes; 0 disables the cache.
    pub plane_cache_bytes: usize,

    /// Planes larger than this fall back to the coarsest pyramid level.
    pub max_plane_bytes: u64,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            plane_cache_bytes: DEFAULT_PLANE_CACHE_CAPACITY,
            max_plane_bytes: MAX_PLANE_BYTES,
        }
    }
}

impl ReaderOptions {
    /// Validate the options and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_plane_bytes == 0 {
            return Err("max_plane_bytes must be greater than 0".to_string());
        }
        if self.max_plane_bytes > MAX_PLANE_BYTES {
            return Err(format!(
                "max_plane_bytes must not exceed {} (2^31 - 1)",
                MAX_PLANE_BYTES
            ));
        }
        Ok(())
    }

    pub fn with_plane_cache_bytes(mut self, bytes: usize) -> Self {
        self.plane_cache_bytes = bytes;
        self
    }

    pub fn with_max_plane_bytes(mut self, bytes: u64) -> Self {
        self.max_plane_bytes = bytes;
        self
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// series-info - Inspect multi-dimensional image series.
///
/// Reads companion-metadata datasets (OME-XML document plus per-plane TIFFs),
/// prints series metadata and extracts planes, regions and associated images.
#[derive(Parser, Debug, Clone)]
#[command(name = "series-info")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print metadata of one or all series.
    Info(InfoConfig),

    /// Extract one full plane as PNG or JPEG.
    Plane(PlaneConfig),

    /// Extract a rectangle at a pyramid level or downsample.
    Region(RegionConfig),

    /// List or extract associated images (label, macro, ...).
    Associated(AssociatedConfig),
}

/// Report format for `info`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// Human-readable text
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

// =============================================================================
// Shared Arguments
// =============================================================================

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct ReaderArgs {
    /// Path to the metadata document.
    pub path: PathBuf,

    /// Plane cache capacity in bytes (0 disables the cache).
    #[arg(long, default_value_t = DEFAULT_PLANE_CACHE_CAPACITY, env = "ISR_CACHE_BYTES")]
    pub cache_bytes: usize,

    /// Largest plane read in one buffer before falling back to the coarsest level.
    #[arg(long, default_value_t = MAX_PLANE_BYTES, env = "ISR_MAX_PLANE_BYTES")]
    pub max_plane_bytes: u64,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl ReaderArgs {
    pub fn options(&self) -> ReaderOptions {
        ReaderOptions {
            plane_cache_bytes: self.cache_bytes,
            max_plane_bytes: self.max_plane_bytes,
        }
    }
}

/// Plane selection shared by plane and region extraction.
#[derive(Args, Debug, Clone, Copy)]
pub struct PlaneArgs {
    /// Series index.
    #[arg(short, long, default_value_t = 0, env = "ISR_SERIES")]
    pub series: usize,

    /// Z section.
    #[arg(short, long, default_value_t = 0)]
    pub z: u32,

    /// Effective channel.
    #[arg(short, long, default_value_t = 0)]
    pub c: u32,

    /// Timepoint.
    #[arg(short, long, default_value_t = 0)]
    pub t: u32,
}

impl PlaneArgs {
    pub fn coordinate(&self) -> PlaneCoordinate {
        PlaneCoordinate::new(self.z, self.c, self.t)
    }
}

/// Image output shared by every extracting subcommand.
#[derive(Args, Debug, Clone)]
pub struct ImageArgs {
    /// Output file.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Image format of the output file.
    #[arg(long, value_enum, default_value_t = OutputFormat::Png)]
    pub image_format: OutputFormat,

    /// JPEG quality (1-100).
    #[arg(long, default_value_t = DEFAULT_QUALITY, env = "ISR_QUALITY")]
    pub quality: u8,
}

fn validate_quality(quality: u8) -> Result<(), String> {
    if quality == 0 || quality > 100 {
        return Err("quality must be between 1 and 100".to_string());
    }
    Ok(())
}

// =============================================================================
// Subcommand Configurations
// =============================================================================

/// Configuration for `info`.
#[derive(Args, Debug, Clone)]
pub struct InfoConfig {
    #[command(flatten)]
    pub reader: ReaderArgs,

    /// Only print this series (default: all series).
    #[arg(short, long, env = "ISR_SERIES")]
    pub series: Option<usize>,

    /// Report format.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text, env = "ISR_FORMAT")]
    pub format: ReportFormat,

    /// Include the engine's full metadata document.
    #[arg(long, default_value_t = false)]
    pub document: bool,
}

impl InfoConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.reader.options().validate()
    }
}

/// Configuration for `plane`.
#[derive(Args, Debug, Clone)]
pub struct PlaneConfig {
    #[command(flatten)]
    pub reader: ReaderArgs,

    #[command(flatten)]
    pub plane: PlaneArgs,

    #[command(flatten)]
    pub image: ImageArgs,
}

impl PlaneConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.reader.options().validate()?;
        validate_quality(self.image.quality)
    }
}

/// Configuration for `region`.
#[derive(Args, Debug, Clone)]
pub struct RegionConfig {
    #[command(flatten)]
    pub reader: ReaderArgs,

    #[command(flatten)]
    pub plane: PlaneArgs,

    #[command(flatten)]
    pub image: ImageArgs,

    /// Left edge (level pixels with --level, full-resolution pixels with --downsample).
    #[arg(long, default_value_t = 0)]
    pub x: u32,

    /// Top edge.
    #[arg(long, default_value_t = 0)]
    pub y: u32,

    /// Width of the rectangle.
    #[arg(long)]
    pub width: u32,

    /// Height of the rectangle.
    #[arg(long)]
    pub height: u32,

    /// Pyramid level to read from.
    #[arg(long, conflicts_with = "downsample")]
    pub level: Option<usize>,

    /// Target downsample factor; the closest level is chosen and the rest is resampled.
    #[arg(long)]
    pub downsample: Option<f64>,
}

impl RegionConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.reader.options().validate()?;
        validate_quality(self.image.quality)?;

        if self.width == 0 || self.height == 0 {
            return Err("width and height must be greater than 0".to_string());
        }
        if let Some(d) = self.downsample {
            if !d.is_finite() || d <= 0.0 {
                return Err("downsample must be a positive number".to_string());
            }
        }
        Ok(())
    }
}

/// Configuration for `associated`.
#[derive(Args, Debug, Clone)]
pub struct AssociatedConfig {
    #[command(flatten)]
    pub reader: ReaderArgs,

    /// Series index.
    #[arg(short, long, default_value_t = 0, env = "ISR_SERIES")]
    pub series: usize,

    /// Associated image to extract (default: list names).
    #[arg(long)]
    pub name: Option<String>,

    /// Output file (required with --name).
    #[arg(short, long, requires = "name")]
    pub output: Option<PathBuf>,

    /// Image format of the output file.
    #[arg(long, value_enum, default_value_t = OutputFormat::Png)]
    pub image_format: OutputFormat,

    /// JPEG quality (1-100).
    #[arg(long, default_value_t = DEFAULT_QUALITY, env = "ISR_QUALITY")]
    pub quality: u8,
}

impl AssociatedConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.reader.options().validate()?;
        validate_quality(self.quality)?;
        if self.name.is_some() && self.output.is_none() {
            return Err("--output is required when extracting an associated image".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
