//! Per-series metadata snapshot.
//!
//! Selecting a series fetches every geometry, pixel and channel field from the
//! engine in one batch and freezes the result in a [`SeriesMetadata`]. All
//! getters on the reader read from this snapshot; the engine is not consulted
//! again until a different series is selected.

use serde::Serialize;
use tracing::debug;

use super::index::PlaneDimensions;
use crate::engine::DecodeEngine;
use crate::error::ReaderError;
use crate::format::{ByteOrder, ChannelColor, ColorModel, PixelType};
use crate::pyramid::Pyramid;

/// Metadata of the selected series.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesMetadata {
    pub series_index: usize,

    /// Total number of planes
    pub image_count: u32,

    /// Full-resolution width
    pub size_x: u32,

    /// Full-resolution height
    pub size_y: u32,

    pub size_z: u32,

    /// Effective channel count
    pub size_c: u32,

    pub size_t: u32,

    /// Physical pixel width in millimetres
    pub physical_size_x: Option<f64>,

    /// Physical pixel height in millimetres
    pub physical_size_y: Option<f64>,

    /// Physical section thickness in millimetres
    pub physical_size_z: Option<f64>,

    /// Time increment in seconds
    pub physical_size_t: Option<f64>,

    pub pixel_type: PixelType,

    /// Valid bits per sample
    pub bits_per_pixel: u32,

    /// Samples packed into one pixel
    pub rgb_channel_count: u32,

    pub channel_colors: ColorModel,

    /// Bytes of one full-resolution plane
    pub plane_byte_size: u64,

    pub optimal_tile_width: u32,

    pub optimal_tile_height: u32,

    #[serde(skip)]
    pub(crate) byte_order: ByteOrder,

    #[serde(skip)]
    pub(crate) interleaved: bool,

    pub pyramid: Pyramid,
}

/// Drop NaN and infinite sizes; engines use them for "unknown".
fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

impl SeriesMetadata {
    /// Fetch the metadata of the engine's active series at resolution 0.
    pub fn fetch<E>(engine: &mut E, series_index: usize) -> Result<Self, ReaderError>
    where
        E: DecodeEngine + ?Sized,
    {
        debug!(series = series_index, "Fetching series metadata");

        let ordinal = engine.pixel_type()?;
        let pixel_type = PixelType::from_ordinal(ordinal).ok_or(ReaderError::UnknownPixelType(ordinal))?;

        let size_x = engine.size_x()?;
        let size_y = engine.size_y()?;
        let size_c = engine.effective_size_c()?;
        let rgb_channel_count = engine.rgb_channel_count()?;

        let colors = (0..size_c)
            .map(|c| Ok(engine.channel_color(c)?.map(ChannelColor::from_rgba)))
            .collect::<Result<Vec<_>, ReaderError>>()?;

        let optimal_tile_width = engine.optimal_tile_width()?;
        let optimal_tile_height = engine.optimal_tile_height()?;
        let dimensions = engine.level_dimensions()?;
        let downsamples = engine.level_downsamples()?;
        let pyramid = Pyramid::from_dimensions(
            &dimensions,
            downsamples.as_deref(),
            (optimal_tile_width, optimal_tile_height),
        );

        let plane_byte_size = plane_byte_size(size_x, size_y, rgb_channel_count, pixel_type);
        let bits_per_pixel = engine
            .bits_per_pixel()?
            .unwrap_or(pixel_type.bytes_per_pixel() as u32 * 8);

        Ok(Self {
            series_index,
            image_count: engine.image_count()?,
            size_x,
            size_y,
            size_z: engine.size_z()?,
            size_c,
            size_t: engine.size_t()?,
            physical_size_x: finite(engine.physical_size_x()?),
            physical_size_y: finite(engine.physical_size_y()?),
            physical_size_z: finite(engine.physical_size_z()?),
            physical_size_t: finite(engine.physical_size_t()?),
            pixel_type,
            bits_per_pixel,
            rgb_channel_count,
            channel_colors: ColorModel::new(colors),
            plane_byte_size,
            optimal_tile_width,
            optimal_tile_height,
            byte_order: ByteOrder::from_little_endian(engine.is_little_endian()?),
            interleaved: engine.is_interleaved()?,
            pyramid,
        })
    }

    /// Z/C/T extent and plane count.
    pub fn dimensions(&self) -> PlaneDimensions {
        PlaneDimensions {
            size_z: self.size_z,
            size_c: self.size_c,
            size_t: self.size_t,
            image_count: self.image_count,
        }
    }

    /// Bytes of one pixel across all packed samples.
    pub fn pixel_bytes(&self) -> u64 {
        self.rgb_channel_count as u64 * self.pixel_type.bytes_per_pixel() as u64
    }

    /// Number of pyramid levels.
    pub fn level_count(&self) -> usize {
        self.pyramid.level_count()
    }
}

/// `size_x * size_y * rgb_channel_count * bytes_per_pixel`, saturating.
pub fn plane_byte_size(size_x: u32, size_y: u32, rgb_channel_count: u32, pixel_type: PixelType) -> u64 {
    (size_x as u64)
        .checked_mul(size_y as u64)
        .and_then(|n| n.checked_mul(rgb_channel_count as u64))
        .and_then(|n| n.checked_mul(pixel_type.bytes_per_pixel() as u64))
        .unwrap_or(u64::MAX)
}
