//! Byte layout normalization.
//!
//! Engines hand back samples in whatever order the container stores them:
//! big- or little-endian, and with multi-sample pixels either interleaved
//! (`RGBRGB...`) or planar (`RRR...GGG...BBB...`). Every buffer leaving the
//! reader is normalized to one fixed layout so that consumers can interpret it
//! from the pixel type alone:
//!
//! - little-endian samples, regardless of host architecture
//! - pixel-interleaved samples

/// Byte order (endianness) of multi-byte samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Least significant byte first
    LittleEndian,
    /// Most significant byte first
    BigEndian,
}

impl ByteOrder {
    /// Byte order from an engine's "is little endian" flag.
    pub fn from_little_endian(little: bool) -> Self {
        if little {
            ByteOrder::LittleEndian
        } else {
            ByteOrder::BigEndian
        }
    }

    /// Byte order of the host.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::BigEndian
        } else {
            ByteOrder::LittleEndian
        }
    }
}

/// Geometry and encoding of a raw sample buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleLayout {
    /// Width in pixels
    pub width: usize,
    /// Height in pixels
    pub height: usize,
    /// Samples stored per pixel (e.g. 3 for RGB)
    pub samples_per_pixel: usize,
    /// Bytes per sample
    pub bytes_per_sample: usize,
    /// Byte order of each sample
    pub byte_order: ByteOrder,
    /// Whether samples of one pixel are adjacent
    pub interleaved: bool,
}

impl SampleLayout {
    /// Total number of bytes a buffer with this layout must contain.
    ///
    /// Returns `None` on arithmetic overflow.
    pub fn byte_len(&self) -> Option<usize> {
        self.width
            .checked_mul(self.height)?
            .checked_mul(self.samples_per_pixel)?
            .checked_mul(self.bytes_per_sample)
    }

    /// Whether buffers in this layout are already in the canonical layout.
    pub fn is_canonical(&self) -> bool {
        let order_ok = self.bytes_per_sample == 1 || self.byte_order == ByteOrder::LittleEndian;
        let interleave_ok = self.samples_per_pixel <= 1 || self.interleaved;
        order_ok && interleave_ok
    }
}

/// Normalize a raw buffer to little-endian, pixel-interleaved order.
///
/// Returns the expected length as `Err` when the buffer does not match the
/// layout.
pub fn normalize(raw: Vec<u8>, layout: &SampleLayout) -> Result<Vec<u8>, usize> {
    let expected = layout.byte_len().unwrap_or(usize::MAX);
    if raw.len() != expected {
        return Err(expected);
    }
    if layout.is_canonical() {
        return Ok(raw);
    }

    let mut data = if layout.samples_per_pixel > 1 && !layout.interleaved {
        interleave(&raw, layout)
    } else {
        raw
    };

    if layout.bytes_per_sample > 1 && layout.byte_order == ByteOrder::BigEndian {
        for sample in data.chunks_exact_mut(layout.bytes_per_sample) {
            sample.reverse();
        }
    }

    Ok(data)
}

/// Convert planar sample order to interleaved order.
fn interleave(raw: &[u8], layout: &SampleLayout) -> Vec<u8> {
    let bps = layout.bytes_per_sample;
    let spp = layout.samples_per_pixel;
    let plane = layout.width * layout.height;
    let mut out = vec![0u8; raw.len()];

    for sample in 0..spp {
        let src_plane = &raw[sample * plane * bps..(sample + 1) * plane * bps];
        for pixel in 0..plane {
            let dst = (pixel * spp + sample) * bps;
            let src = pixel * bps;
            out[dst..dst + bps].copy_from_slice(&src_plane[src..src + bps]);
        }
    }

    out
}
