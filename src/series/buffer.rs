//! Pixel buffers returned by the reader.
//!
//! All buffers are little-endian and pixel-interleaved regardless of how the
//! engine stored them. Data is held in [`Bytes`] so a cached plane can be
//! handed out repeatedly without copying.

use bytes::Bytes;
use serde::Serialize;

use crate::format::{AssociatedPixelType, PixelType};

// =============================================================================
// PixelData
// =============================================================================

/// Typed view of a little-endian sample buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelData {
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl PixelData {
    /// Decode little-endian bytes as samples of `pixel_type`.
    ///
    /// `Bit` samples are one byte each and decode as `U8`.
    pub fn from_le_bytes(data: &[u8], pixel_type: PixelType) -> Self {
        match pixel_type {
            PixelType::Int8 => PixelData::I8(data.iter().map(|&b| b as i8).collect()),
            PixelType::Uint8 | PixelType::Bit => PixelData::U8(data.to_vec()),
            PixelType::Int16 => PixelData::I16(
                data.chunks_exact(2)
                    .map(|a| i16::from_le_bytes([a[0], a[1]]))
                    .collect(),
            ),
            PixelType::Uint16 => PixelData::U16(
                data.chunks_exact(2)
                    .map(|a| u16::from_le_bytes([a[0], a[1]]))
                    .collect(),
            ),
            PixelType::Int32 => PixelData::I32(
                data.chunks_exact(4)
                    .map(|a| i32::from_le_bytes([a[0], a[1], a[2], a[3]]))
                    .collect(),
            ),
            PixelType::Uint32 => PixelData::U32(
                data.chunks_exact(4)
                    .map(|a| u32::from_le_bytes([a[0], a[1], a[2], a[3]]))
                    .collect(),
            ),
            PixelType::Float => PixelData::F32(
                data.chunks_exact(4)
                    .map(|a| f32::from_le_bytes([a[0], a[1], a[2], a[3]]))
                    .collect(),
            ),
            PixelType::Double => PixelData::F64(
                data.chunks_exact(8)
                    .map(|a| f64::from_le_bytes([a[0], a[1], a[2], a[3], a[4], a[5], a[6], a[7]]))
                    .collect(),
            ),
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        match self {
            PixelData::I8(v) => v.len(),
            PixelData::U8(v) => v.len(),
            PixelData::I16(v) => v.len(),
            PixelData::U16(v) => v.len(),
            PixelData::I32(v) => v.len(),
            PixelData::U32(v) => v.len(),
            PixelData::F32(v) => v.len(),
            PixelData::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// PlaneBuffer
// =============================================================================

/// One full plane of the selected series.
#[derive(Debug, Clone)]
pub struct PlaneBuffer {
    /// Sample bytes, little-endian, pixel-interleaved
    pub data: Bytes,

    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    pub pixel_type: PixelType,

    /// Samples per pixel (1 for grayscale, 3 for RGB)
    pub samples_per_pixel: u32,

    /// Linear index of the plane
    pub plane_index: u32,

    /// Resolution level the plane was read at
    ///
    /// Differs from the requested level when an oversized plane fell back to
    /// the coarsest level.
    pub resolution: usize,
}

impl PlaneBuffer {
    /// Typed view of the samples.
    pub fn pixels(&self) -> PixelData {
        PixelData::from_le_bytes(&self.data, self.pixel_type)
    }

    /// Bytes per pixel across all samples.
    pub fn bytes_per_pixel(&self) -> usize {
        self.pixel_type.bytes_per_pixel() * self.samples_per_pixel as usize
    }
}

// =============================================================================
// Region
// =============================================================================

/// A rectangle read from one level of the pyramid.
#[derive(Debug, Clone)]
pub struct Region {
    /// Sample bytes, little-endian, pixel-interleaved
    pub data: Bytes,

    /// Width in level pixels
    pub width: u32,

    /// Height in level pixels
    pub height: u32,

    /// Level the rectangle was read from
    pub level: usize,

    /// Downsample factor of that level
    pub level_downsample: f64,

    /// Factor still to apply to reach the requested downsample
    ///
    /// 1.0 when the request mapped exactly onto a level, below 1.0 when the
    /// request was finer than level 0.
    pub residual: f64,

    pub pixel_type: PixelType,

    pub samples_per_pixel: u32,
}

impl Region {
    /// Typed view of the samples.
    pub fn pixels(&self) -> PixelData {
        PixelData::from_le_bytes(&self.data, self.pixel_type)
    }

    /// Size after applying the residual factor, rounded, at least 1x1.
    pub fn output_size(&self) -> (u32, u32) {
        if self.residual <= 1.0 {
            return (self.width, self.height);
        }
        let w = (self.width as f64 / self.residual).round().max(1.0) as u32;
        let h = (self.height as f64 / self.residual).round().max(1.0) as u32;
        (w, h)
    }
}

// =============================================================================
// AssociatedImage
// =============================================================================

/// A non-pyramidal image stored alongside the series (label, macro, ...).
///
/// Associated images use their own pixel type enumeration.
#[derive(Debug, Clone, Serialize)]
pub struct AssociatedImage {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub samples_per_pixel: u32,
    pub pixel_type: AssociatedPixelType,

    /// Sample bytes, little-endian, pixel-interleaved
    #[serde(skip)]
    pub data: Bytes,
}

impl AssociatedImage {
    /// Bytes the image data must contain for its geometry.
    pub fn expected_len(&self) -> usize {
        self.width as usize
            * self.height as usize
            * self.samples_per_pixel as usize
            * self.pixel_type.bytes_per_pixel()
    }
}
