//! Plane addressing.
//!
//! A plane is addressed either by a (Z, C, T) coordinate or by its linear
//! index in `[0, image_count)`. The mapping between the two belongs to the
//! engine; this module only validates both sides of it.

use std::fmt;

use serde::Serialize;

use crate::error::ReaderError;

/// (Z, C, T) position of a plane.
///
/// `c` counts effective channels, not samples within a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct PlaneCoordinate {
    pub z: u32,
    pub c: u32,
    pub t: u32,
}

impl PlaneCoordinate {
    pub const fn new(z: u32, c: u32, t: u32) -> Self {
        Self { z, c, t }
    }

    /// Coordinate from an engine's `[z, c, t]` array.
    pub const fn from_zct(zct: [u32; 3]) -> Self {
        Self::new(zct[0], zct[1], zct[2])
    }

    /// Check the coordinate against the series dimensions.
    pub fn validate(&self, dims: &PlaneDimensions) -> Result<(), ReaderError> {
        if self.z >= dims.size_z || self.c >= dims.size_c || self.t >= dims.size_t {
            return Err(ReaderError::CoordinateOutOfRange {
                z: self.z,
                c: self.c,
                t: self.t,
                size_z: dims.size_z,
                size_c: dims.size_c,
                size_t: dims.size_t,
            });
        }
        Ok(())
    }
}

impl fmt::Display for PlaneCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(z={}, c={}, t={})", self.z, self.c, self.t)
    }
}

/// The Z/C/T extent of a series and its plane count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlaneDimensions {
    pub size_z: u32,
    /// Effective channel count
    pub size_c: u32,
    pub size_t: u32,
    pub image_count: u32,
}

impl PlaneDimensions {
    /// Check a linear plane index.
    pub fn check_index(&self, index: u32) -> Result<(), ReaderError> {
        if index >= self.image_count {
            return Err(ReaderError::PlaneIndexOutOfRange {
                index,
                count: self.image_count,
            });
        }
        Ok(())
    }

    /// Whether `size_z * size_c * size_t == image_count`.
    pub fn is_consistent(&self) -> bool {
        self.size_z as u64 * self.size_c as u64 * self.size_t as u64 == self.image_count as u64
    }
}
