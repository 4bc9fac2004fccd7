//! Dimension-order rasterization for engine implementors.
//!
//! Containers that store planes in a fixed dimension order (`XYZCT`,
//! `XYCTZ`, ...) can use [`DimensionOrder`] to implement
//! [`DecodeEngine::plane_index`](super::DecodeEngine::plane_index) and
//! [`DecodeEngine::zct_coords`](super::DecodeEngine::zct_coords). The reader
//! itself never computes plane indices; it always asks the engine.

use std::fmt;
use std::str::FromStr;

/// Order in which planes are rasterized, fastest-varying axis first after XY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DimensionOrder {
    XYZCT,
    XYZTC,
    XYCZT,
    XYCTZ,
    XYTZC,
    XYTCZ,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Z,
    C,
    T,
}

impl Axis {
    fn slot(self) -> usize {
        match self {
            Axis::Z => 0,
            Axis::C => 1,
            Axis::T => 2,
        }
    }
}

impl DimensionOrder {
    fn axes(self) -> [Axis; 3] {
        match self {
            DimensionOrder::XYZCT => [Axis::Z, Axis::C, Axis::T],
            DimensionOrder::XYZTC => [Axis::Z, Axis::T, Axis::C],
            DimensionOrder::XYCZT => [Axis::C, Axis::Z, Axis::T],
            DimensionOrder::XYCTZ => [Axis::C, Axis::T, Axis::Z],
            DimensionOrder::XYTZC => [Axis::T, Axis::Z, Axis::C],
            DimensionOrder::XYTCZ => [Axis::T, Axis::C, Axis::Z],
        }
    }

    /// Linear index of `[z, c, t]` given `[size_z, size_c, size_t]`.
    ///
    /// Returns `None` when the coordinate is out of range.
    pub fn plane_index(self, zct: [u32; 3], sizes: [u32; 3]) -> Option<u32> {
        if zct.iter().zip(sizes.iter()).any(|(v, s)| v >= s) {
            return None;
        }

        let mut index: u64 = 0;
        let mut stride: u64 = 1;
        for axis in self.axes() {
            let slot = axis.slot();
            index += zct[slot] as u64 * stride;
            stride *= sizes[slot] as u64;
        }
        u32::try_from(index).ok()
    }

    /// `[z, c, t]` of a linear index given `[size_z, size_c, size_t]`.
    ///
    /// Returns `None` when the index is out of range.
    pub fn coordinates(self, index: u32, sizes: [u32; 3]) -> Option<[u32; 3]> {
        let total: u64 = sizes.iter().map(|&s| s as u64).product();
        if index as u64 >= total {
            return None;
        }

        let mut rest = index;
        let mut zct = [0u32; 3];
        for axis in self.axes() {
            let size = sizes[axis.slot()];
            zct[axis.slot()] = rest % size;
            rest /= size;
        }
        Some(zct)
    }

    /// The order as a five-letter string.
    pub fn as_str(self) -> &'static str {
        match self {
            DimensionOrder::XYZCT => "XYZCT",
            DimensionOrder::XYZTC => "XYZTC",
            DimensionOrder::XYCZT => "XYCZT",
            DimensionOrder::XYCTZ => "XYCTZ",
            DimensionOrder::XYTZC => "XYTZC",
            DimensionOrder::XYTCZ => "XYTCZ",
        }
    }
}

impl fmt::Display for DimensionOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DimensionOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "XYZCT" => Ok(DimensionOrder::XYZCT),
            "XYZTC" => Ok(DimensionOrder::XYZTC),
            "XYCZT" => Ok(DimensionOrder::XYCZT),
            "XYCTZ" => Ok(DimensionOrder::XYCTZ),
            "XYTZC" => Ok(DimensionOrder::XYTZC),
            "XYTCZ" => Ok(DimensionOrder::XYTCZ),
            other => Err(format!("unknown dimension order: {other}")),
        }
    }
}
