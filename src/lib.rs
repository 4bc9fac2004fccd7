//! # Image Series Reader
//!
//! A uniform, cacheable reader for multi-series, multi-dimensional scientific
//! images and whole slide pyramids.
//!
//! A pluggable decode engine does the container-specific parsing. This crate
//! turns whatever it reports into one stable model: series of planes addressed
//! by (Z, C, T), always little-endian and pixel-interleaved, with a
//! resolution pyramid for tiled region reads.
//!
//! ## Features
//!
//! - **One-shot metadata**: Each series switch fetches its metadata in one batch
//! - **Normalized buffers**: Byte order and channel interleaving are fixed up once
//! - **Pyramid reads**: Region reads at an explicit level or any downsample factor
//! - **Bounded memory**: Planes above a byte ceiling fall back to coarser levels
//! - **Plane cache**: LRU cache of decoded planes, bounded by bytes
//! - **Shared engine runtime**: One explicitly owned runtime for many readers
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`series`] - The reader facade, metadata snapshot and plane cache
//! - [`engine`] - Decode engine trait, shared runtime handle, companion engine
//! - [`pyramid`] - Resolution levels and level selection
//! - [`mod@format`] - Pixel types, byte layouts and color models
//! - [`render`] - PNG/JPEG encoding of read results
//! - [`config`] - Reader options and CLI types
//!
//! ## Example
//!
//! ```rust,no_run
//! use image_series_reader::{
//!     CompanionProvider, EngineHandle, PlaneCoordinate, ReaderOptions, RegionRequest,
//!     SeriesReader,
//! };
//!
//! fn main() -> Result<(), image_series_reader::ReaderError> {
//!     let handle = EngineHandle::new(CompanionProvider::new());
//!     let mut reader = SeriesReader::new(handle, ReaderOptions::default())?;
//!
//!     reader.open("dataset/series.companion.ome")?;
//!     reader.select_series(0)?;
//!
//!     let plane = reader.read_plane_at(PlaneCoordinate::new(0, 1, 0))?;
//!     println!("{}x{} plane, {} bytes", plane.width, plane.height, plane.data.len());
//!
//!     let region = reader.read_region(RegionRequest::at_downsample(4.0, 0, 0, 1024, 1024))?;
//!     println!("level {} residual {}", region.level, region.residual);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod pyramid;
pub mod render;
pub mod series;

// Re-export commonly used types
pub use config::{Cli, Command, ReaderOptions};
pub use engine::{
    CompanionEngine, CompanionProvider, DecodeEngine, DimensionOrder, EngineHandle,
    EngineProvider, EngineSession,
};
pub use error::{EncodeError, EngineError, ReaderError};
pub use format::{
    AssociatedPixelType, ByteOrder, ChannelColor, ColorModel, LookupTable, LookupTable16,
    LookupTable8, PixelType,
};
pub use pyramid::{LevelSelection, Pyramid, ResolutionLevel, MAX_PLANE_BYTES};
pub use render::{OutputFormat, RegionEncoder, DEFAULT_QUALITY};
pub use series::{
    AssociatedImage, LevelTarget, PixelData, PlaneBuffer, PlaneCache, PlaneCoordinate,
    Region, RegionRequest, SeriesMetadata, SeriesReader, DEFAULT_PLANE_CACHE_CAPACITY,
};
