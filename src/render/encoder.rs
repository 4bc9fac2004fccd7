//! PNG/JPEG encoder for planes, regions and associated images.
//!
//! This module turns reader buffers into viewable images.
//!
//! # Design Decisions
//!
//! - **Restricted numeric backend**: only `uint8`, `uint16` and `bit` samples
//!   with 1, 3 or 4 samples per pixel are encodable. Everything else is
//!   rejected with [`EncodeError::UnsupportedPixelType`] instead of being
//!   silently rescaled.
//!
//! - **Residual resampling**: regions carrying a residual factor above 1 are
//!   shrunk to their output size. Residuals below 1 are left alone; upsampling
//!   is up to the viewer.
//!
//! - **JPEG output**: alpha is dropped and 16-bit samples are reduced to 8 bits.

use bytes::Bytes;
use clap::ValueEnum;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageBuffer, Luma, Rgb, Rgba};
use serde::Serialize;

use crate::error::EncodeError;
use crate::format::{AssociatedPixelType, LookupTable8, PixelType};
use crate::series::{AssociatedImage, PlaneBuffer, Region};

/// Default JPEG quality (1-100).
pub const DEFAULT_QUALITY: u8 = 75;

/// Minimum allowed JPEG quality.
pub const MIN_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_QUALITY: u8 = 100;

// =============================================================================
// Output Format
// =============================================================================

/// Encoded image format.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
}

impl OutputFormat {
    /// Conventional file extension.
    pub const fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
        }
    }

    pub const fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }
}

/// Sample depth supported by the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SampleDepth {
    Eight,
    Sixteen,
    /// One byte per sample, values 0 or 1
    Bit,
}

impl SampleDepth {
    fn from_pixel_type(pixel_type: PixelType) -> Result<Self, EncodeError> {
        match pixel_type {
            PixelType::Uint8 => Ok(SampleDepth::Eight),
            PixelType::Uint16 => Ok(SampleDepth::Sixteen),
            PixelType::Bit => Ok(SampleDepth::Bit),
            other => Err(EncodeError::UnsupportedPixelType {
                pixel_type: other.name().to_string(),
            }),
        }
    }

    fn from_associated(pixel_type: AssociatedPixelType) -> Result<Self, EncodeError> {
        match pixel_type {
            AssociatedPixelType::Uint8 => Ok(SampleDepth::Eight),
            AssociatedPixelType::Uint16 => Ok(SampleDepth::Sixteen),
            other => Err(EncodeError::UnsupportedPixelType {
                pixel_type: other.name().to_string(),
            }),
        }
    }

    fn bytes(self) -> usize {
        match self {
            SampleDepth::Eight | SampleDepth::Bit => 1,
            SampleDepth::Sixteen => 2,
        }
    }
}

// =============================================================================
// Region Encoder
// =============================================================================

/// Encoder for reader buffers.
///
/// # Example
///
/// ```ignore
/// use image_series_reader::render::{OutputFormat, RegionEncoder};
///
/// let encoder = RegionEncoder::new(OutputFormat::Jpeg).with_quality(90)?;
/// let region = reader.read_region(request)?;
/// let jpeg = encoder.encode_region(&region)?;
/// ```
#[derive(Debug, Clone)]
pub struct RegionEncoder {
    format: OutputFormat,
    quality: u8,
    lookup_table: Option<LookupTable8>,
}

impl RegionEncoder {
    /// Create an encoder at the default quality.
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            quality: DEFAULT_QUALITY,
            lookup_table: None,
        }
    }

    /// Set the JPEG quality (1-100). Ignored for PNG.
    pub fn with_quality(mut self, quality: u8) -> Result<Self, EncodeError> {
        if !is_valid_quality(quality) {
            return Err(EncodeError::InvalidQuality { quality });
        }
        self.quality = quality;
        Ok(self)
    }

    /// Map single-channel 8-bit samples through a palette.
    pub fn with_lookup_table(mut self, lookup_table: Option<LookupTable8>) -> Self {
        self.lookup_table = lookup_table;
        self
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Encode a full plane at its native size.
    pub fn encode_plane(&self, plane: &PlaneBuffer) -> Result<Bytes, EncodeError> {
        let depth = SampleDepth::from_pixel_type(plane.pixel_type)?;
        let image = self.to_image(
            &plane.data,
            plane.width,
            plane.height,
            plane.samples_per_pixel,
            depth,
        )?;
        self.encode(image)
    }

    /// Encode a region, applying its residual factor when above 1.
    pub fn encode_region(&self, region: &Region) -> Result<Bytes, EncodeError> {
        let depth = SampleDepth::from_pixel_type(region.pixel_type)?;
        let image = self.to_image(
            &region.data,
            region.width,
            region.height,
            region.samples_per_pixel,
            depth,
        )?;

        let (width, height) = region.output_size();
        let image = if (width, height) != (region.width, region.height) {
            image.resize_exact(width, height, FilterType::Triangle)
        } else {
            image
        };

        self.encode(image)
    }

    /// Encode an associated image at its native size.
    pub fn encode_associated(&self, associated: &AssociatedImage) -> Result<Bytes, EncodeError> {
        let depth = SampleDepth::from_associated(associated.pixel_type)?;
        let image = self.to_image(
            &associated.data,
            associated.width,
            associated.height,
            associated.samples_per_pixel,
            depth,
        )?;
        self.encode(image)
    }

    /// Build an image from little-endian interleaved samples.
    fn to_image(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        samples: u32,
        depth: SampleDepth,
    ) -> Result<DynamicImage, EncodeError> {
        if !matches!(samples, 1 | 3 | 4) {
            return Err(EncodeError::UnsupportedSamples(samples));
        }

        let expected = width as usize * height as usize * samples as usize * depth.bytes();
        if data.len() != expected {
            return Err(EncodeError::GeometryMismatch {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }

        let mismatch = || EncodeError::EncodeFailed {
            message: "buffer does not match image geometry".to_string(),
        };

        let image = match depth {
            SampleDepth::Eight | SampleDepth::Bit => {
                let samples_8: Vec<u8> = if depth == SampleDepth::Bit {
                    data.iter().map(|&v| if v == 0 { 0 } else { u8::MAX }).collect()
                } else {
                    data.to_vec()
                };

                match (samples, &self.lookup_table) {
                    (1, Some(lut)) => {
                        let rgb = apply_lookup_table(&samples_8, lut);
                        ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, rgb)
                            .map(DynamicImage::ImageRgb8)
                    }
                    (1, None) => ImageBuffer::<Luma<u8>, _>::from_raw(width, height, samples_8)
                        .map(DynamicImage::ImageLuma8),
                    (3, _) => ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, samples_8)
                        .map(DynamicImage::ImageRgb8),
                    _ => ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, samples_8)
                        .map(DynamicImage::ImageRgba8),
                }
            }
            SampleDepth::Sixteen => {
                let samples_16: Vec<u16> = data
                    .chunks_exact(2)
                    .map(|a| u16::from_le_bytes([a[0], a[1]]))
                    .collect();

                match samples {
                    1 => ImageBuffer::<Luma<u16>, _>::from_raw(width, height, samples_16)
                        .map(DynamicImage::ImageLuma16),
                    3 => ImageBuffer::<Rgb<u16>, _>::from_raw(width, height, samples_16)
                        .map(DynamicImage::ImageRgb16),
                    _ => ImageBuffer::<Rgba<u16>, _>::from_raw(width, height, samples_16)
                        .map(DynamicImage::ImageRgba16),
                }
            }
        };

        image.ok_or_else(mismatch)
    }

    fn encode(&self, image: DynamicImage) -> Result<Bytes, EncodeError> {
        let mut output = Vec::new();

        let result = match self.format {
            OutputFormat::Png => image.write_with_encoder(PngEncoder::new(&mut output)),
            OutputFormat::Jpeg => {
                let image = if image.color().has_color() {
                    DynamicImage::ImageRgb8(image.to_rgb8())
                } else {
                    DynamicImage::ImageLuma8(image.to_luma8())
                };
                image.write_with_encoder(JpegEncoder::new_with_quality(&mut output, self.quality))
            }
        };

        result.map_err(|e| EncodeError::EncodeFailed {
            message: e.to_string(),
        })?;

        Ok(Bytes::from(output))
    }
}

impl Default for RegionEncoder {
    fn default() -> Self {
        Self::new(OutputFormat::default())
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Expand palette indices to RGB triples.
///
/// Indices beyond the end of the palette render as gray.
fn apply_lookup_table(indices: &[u8], lut: &LookupTable8) -> Vec<u8> {
    indices
        .iter()
        .flat_map(|&v| lut.get(v as usize).unwrap_or([v, v, v]))
        .collect()
}

/// Validate JPEG quality parameter.
#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_QUALITY..=MAX_QUALITY).contains(&quality)
}

// =============================================================================
// Tests
// =============================================================================
