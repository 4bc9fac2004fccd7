//! Decode engine boundary.
//!
//! A decode engine does all of the actual file parsing, decompression and
//! color-space decoding. The reader treats it as an opaque, synchronous
//! service that may fail on any call.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              SeriesReader               │
//! │  (metadata cache, pyramid, plane cache) │
//! └────────────────────┬────────────────────┘
//!                      │ EngineSession
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │         EngineHandle (Arc-shared)       │
//! │   one runtime, many reader sessions     │
//! └────────────────────┬────────────────────┘
//!                      │
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//! ┌─────────────────┐    ┌─────────────────────┐
//! │ CompanionEngine │    │  other engines      │
//! │ (JSON + TIFFs)  │    │  (native bindings)  │
//! └─────────────────┘    └─────────────────────┘
//! ```
//!
//! Format differences live entirely behind [`DecodeEngine`]; the reader never
//! branches on the container format.

pub mod companion;
mod handle;
pub mod order;

use std::path::Path;

pub use companion::{CompanionEngine, CompanionProvider};
pub use handle::{EngineHandle, EngineProvider, EngineSession};
pub use order::DimensionOrder;

use crate::error::EngineError;
use crate::series::AssociatedImage;

/// Synchronous call interface to a format-decoding engine.
///
/// Every call is a blocking round trip. Implementations are driven by one
/// thread at a time; they need to be `Send` so a reader can be moved to a
/// worker thread, but never `Sync`.
///
/// Sizes returned by `size_x`/`size_y` refer to the current resolution level.
/// `set_series` resets the resolution level to 0.
pub trait DecodeEngine: Send {
    /// Open a file. Fails when the path is unreadable or the format unknown.
    fn open(&mut self, path: &Path) -> Result<(), EngineError>;

    /// Close the current file and release engine-side resources.
    fn close(&mut self) -> Result<(), EngineError>;

    /// Re-establish the file handle of the currently open file.
    fn reopen(&mut self) -> Result<(), EngineError>;

    /// Number of series in the file.
    fn series_count(&self) -> Result<usize, EngineError>;

    /// Make `series` the active series.
    fn set_series(&mut self, series: usize) -> Result<(), EngineError>;

    /// The active series.
    fn series(&self) -> Result<usize, EngineError>;

    /// Total number of planes in the active series.
    fn image_count(&self) -> Result<u32, EngineError>;

    fn size_x(&self) -> Result<u32, EngineError>;

    fn size_y(&self) -> Result<u32, EngineError>;

    fn size_z(&self) -> Result<u32, EngineError>;

    /// Number of independently addressable channels.
    fn effective_size_c(&self) -> Result<u32, EngineError>;

    fn size_t(&self) -> Result<u32, EngineError>;

    /// Physical pixel width in millimetres.
    fn physical_size_x(&self) -> Result<Option<f64>, EngineError>;

    /// Physical pixel height in millimetres.
    fn physical_size_y(&self) -> Result<Option<f64>, EngineError>;

    /// Physical section thickness in millimetres.
    fn physical_size_z(&self) -> Result<Option<f64>, EngineError>;

    /// Time increment between timepoints in seconds.
    fn physical_size_t(&self) -> Result<Option<f64>, EngineError>;

    /// Pixel type as an ordinal of [`crate::format::PixelType`].
    fn pixel_type(&self) -> Result<i32, EngineError>;

    /// Samples packed into one pixel (e.g. 3 for RGB).
    fn rgb_channel_count(&self) -> Result<u32, EngineError>;

    /// RGBA color of an effective channel, if the file declares one.
    fn channel_color(&self, channel: u32) -> Result<Option<[u8; 4]>, EngineError>;

    /// Byte order of buffers returned by `open_bytes`.
    fn is_little_endian(&self) -> Result<bool, EngineError>;

    /// Whether multi-sample pixels are returned interleaved.
    fn is_interleaved(&self) -> Result<bool, EngineError>;

    /// Linear plane index of a (Z, C, T) coordinate.
    fn plane_index(&self, z: u32, c: u32, t: u32) -> Result<u32, EngineError>;

    /// (Z, C, T) coordinate of a linear plane index.
    fn zct_coords(&self, index: u32) -> Result<[u32; 3], EngineError>;

    /// Raw bytes of one full plane at the current resolution.
    ///
    /// `Ok(None)` means the engine produced no data.
    fn open_bytes(&mut self, index: u32) -> Result<Option<Vec<u8>>, EngineError>;

    /// Raw bytes of a rectangle of one plane at the current resolution.
    fn open_bytes_region(
        &mut self,
        index: u32,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<Option<Vec<u8>>, EngineError>;

    /// 8-bit palette as channel-major rows, `None` when absent.
    fn lookup_table_8bit(&self) -> Result<Option<Vec<Vec<u8>>>, EngineError>;

    /// 16-bit palette as channel-major rows, `None` when absent.
    fn lookup_table_16bit(&self) -> Result<Option<Vec<Vec<u16>>>, EngineError>;

    fn optimal_tile_width(&self) -> Result<u32, EngineError>;

    fn optimal_tile_height(&self) -> Result<u32, EngineError>;

    /// Number of resolution levels in the active series.
    fn resolution_count(&self) -> Result<usize, EngineError>;

    fn set_resolution(&mut self, level: usize) -> Result<(), EngineError>;

    fn resolution(&self) -> Result<usize, EngineError>;

    /// Number of valid bits per sample, when narrower than the pixel type.
    fn bits_per_pixel(&self) -> Result<Option<u32>, EngineError> {
        Ok(None)
    }

    /// Dimensions of every resolution level, finest first.
    ///
    /// The default walks the resolutions and restores the current one.
    fn level_dimensions(&mut self) -> Result<Vec<(u32, u32)>, EngineError> {
        let current = self.resolution()?;
        let count = self.resolution_count()?;
        let mut dims = Vec::with_capacity(count);

        for level in 0..count {
            self.set_resolution(level)?;
            dims.push((self.size_x()?, self.size_y()?));
        }

        self.set_resolution(current)?;
        Ok(dims)
    }

    /// Downsample factor of every resolution level, when the engine knows them.
    ///
    /// `None` lets the reader derive factors from the level dimensions.
    fn level_downsamples(&self) -> Result<Option<Vec<f64>>, EngineError> {
        Ok(None)
    }

    /// Names of associated images (label, macro, thumbnail, ...).
    fn associated_image_names(&self) -> Result<Vec<String>, EngineError> {
        Ok(Vec::new())
    }

    /// Pixels of an associated image, `None` when the name is unknown.
    fn associated_image(&mut self, _name: &str) -> Result<Option<AssociatedImage>, EngineError> {
        Ok(None)
    }

    /// Full metadata document of the file (e.g. OME metadata), if available.
    fn metadata_document(&self) -> Result<Option<String>, EngineError> {
        Ok(None)
    }
}
