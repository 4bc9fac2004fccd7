//! Resolution pyramid and level selection.
//!
//! Large series carry precomputed, progressively downsampled copies of the
//! full-resolution image. This module models those levels and chooses the one
//! to read for a request.
//!
//! # Selection Modes
//!
//! 1. **Explicit level**: [`Pyramid::level`] validates an index.
//! 2. **Target downsample**: [`Pyramid::select_for_downsample`] picks the
//!    sharpest level that is not coarser than requested and reports the
//!    residual factor still to be applied by the caller.
//! 3. **Size budget**: [`Pyramid::fallback_level`] returns the coarsest level
//!    when a full-resolution plane would not fit in one contiguous buffer.
//!
//! Upsampling is never performed here. A request finer than level 0 clamps to
//! level 0 and reports a residual below 1. Level 0 always has factor 1.0, so
//! the residual of such a request is the request itself.

use serde::Serialize;

use crate::error::ReaderError;

// =============================================================================
// Constants
// =============================================================================

/// Largest contiguous buffer a plane read may produce (2^31 - 1 bytes).
pub const MAX_PLANE_BYTES: u64 = i32::MAX as u64;

/// Relative distance within which a derived downsample snaps to the nearest
/// integer.
///
/// Downsamples derived from integer dimensions are rarely exact
/// (e.g. 1001 / 250 = 4.004).
const DOWNSAMPLE_SNAP: f64 = 0.01;

// =============================================================================
// ResolutionLevel
// =============================================================================

/// A single level in the resolution pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolutionLevel {
    /// Index of this level (0 = full resolution)
    pub index: usize,

    /// Width of this level in pixels
    pub width: u32,

    /// Height of this level in pixels
    pub height: u32,

    /// Downsample factor relative to level 0
    pub downsample: f64,

    /// Width of each tile in pixels
    pub tile_width: u32,

    /// Height of each tile in pixels
    pub tile_height: u32,

    /// Number of tiles in X direction
    pub tiles_x: u32,

    /// Number of tiles in Y direction
    pub tiles_y: u32,
}

impl ResolutionLevel {
    fn new(index: usize, width: u32, height: u32, downsample: f64, tile: (u32, u32)) -> Self {
        let tile_width = tile.0.clamp(1, width.max(1));
        let tile_height = tile.1.clamp(1, height.max(1));

        Self {
            index,
            width,
            height,
            downsample,
            tile_width,
            tile_height,
            tiles_x: width.div_ceil(tile_width),
            tiles_y: height.div_ceil(tile_height),
        }
    }

    /// Bytes of one plane at this level for the given bytes per pixel.
    pub fn plane_byte_size(&self, bytes_per_pixel: u64) -> u64 {
        (self.width as u64)
            .saturating_mul(self.height as u64)
            .saturating_mul(bytes_per_pixel)
    }

    /// Whether the rectangle fits inside this level.
    pub fn contains(&self, x: u32, y: u32, width: u32, height: u32) -> bool {
        (x as u64 + width as u64) <= self.width as u64
            && (y as u64 + height as u64) <= self.height as u64
    }

    /// Whether a tile coordinate lies inside the tile grid.
    pub fn has_tile(&self, tile_x: u32, tile_y: u32) -> bool {
        tile_x < self.tiles_x && tile_y < self.tiles_y
    }

    /// Get the row-major tile index for a given tile coordinate.
    ///
    /// Returns None if the coordinates are out of bounds.
    pub fn tile_index(&self, tile_x: u32, tile_y: u32) -> Option<u64> {
        if !self.has_tile(tile_x, tile_y) {
            return None;
        }
        Some(tile_y as u64 * self.tiles_x as u64 + tile_x as u64)
    }

    /// Pixel rectangle `(x, y, width, height)` of a tile.
    ///
    /// Edge tiles may be smaller than tile_width/tile_height.
    pub fn tile_rect(&self, tile_x: u32, tile_y: u32) -> Option<(u32, u32, u32, u32)> {
        if !self.has_tile(tile_x, tile_y) {
            return None;
        }

        // tile_x < tiles_x, so tile_x * tile_width < width

        let x = tile_x * self.tile_width;
        let y = tile_y * self.tile_height;
        let w = self.tile_width.min(self.width - x);
        let h = self.tile_height.min(self.height - y);

        Some((x, y, w, h))
    }
}

// =============================================================================
// LevelSelection
// =============================================================================

/// Outcome of a downsample-driven level selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LevelSelection {
    /// Chosen level index
    pub level: usize,

    /// Downsample factor of the chosen level
    pub level_downsample: f64,

    /// Remaining factor to apply after reading the chosen level
    pub residual: f64,
}

impl LevelSelection {
    /// Whether the caller still has to resample the data.
    pub fn needs_resample(&self) -> bool {
        (self.residual - 1.0).abs() > f64::EPSILON
    }
}

// =============================================================================
// Pyramid
// =============================================================================

/// Resolution levels of one series, finest first.
///
/// Levels are fixed for as long as the series stays selected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pyramid {
    levels: Vec<ResolutionLevel>,
}

impl Pyramid {
    /// Build a pyramid from level dimensions.
    ///
    /// When `downsamples` is `None` (or has the wrong length) factors are
    /// derived from the dimensions relative to level 0, averaging the X and Y
    /// ratios and snapping to the nearest integer when within 1%. Reported
    /// factors are rescaled so level 0 is exactly 1.0. `tile` is the
    /// preferred tile size, clamped to each level.
    pub fn from_dimensions(
        dimensions: &[(u32, u32)],
        downsamples: Option<&[f64]>,
        tile: (u32, u32),
    ) -> Self {
        let Some(&(base_width, base_height)) = dimensions.first() else {
            return Self { levels: Vec::new() };
        };

        let reported = downsamples.filter(|d| {
            d.len() == dimensions.len() && d.iter().all(|f| f.is_finite() && *f > 0.0)
        });

        let levels = dimensions
            .iter()
            .enumerate()
            .map(|(index, &(width, height))| {
                let downsample = match reported {
                    Some(factors) => factors[index] / factors[0],
                    None if index == 0 => 1.0,
                    None => {
                        let dx = base_width as f64 / width.max(1) as f64;
                        let dy = base_height as f64 / height.max(1) as f64;
                        snap_downsample((dx + dy) / 2.0)
                    }
                };
                ResolutionLevel::new(index, width, height, downsample, tile)
            })
            .collect();

        Self { levels }
    }

    /// A pyramid with only the full-resolution level.
    pub fn single(width: u32, height: u32, tile: (u32, u32)) -> Self {
        Self::from_dimensions(&[(width, height)], None, tile)
    }

    /// Get the number of pyramid levels.
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// All levels, finest first.
    pub fn levels(&self) -> &[ResolutionLevel] {
        &self.levels
    }

    /// Downsample factor of every level.
    pub fn downsamples(&self) -> Vec<f64> {
        self.levels.iter().map(|l| l.downsample).collect()
    }

    /// Validate and return a level by index.
    pub fn level(&self, level: usize) -> Result<&ResolutionLevel, ReaderError> {
        self.levels.get(level).ok_or(ReaderError::LevelOutOfRange {
            level,
            count: self.levels.len(),
        })
    }

    /// Get the base (highest resolution) level.
    pub fn base_level(&self) -> Option<&ResolutionLevel> {
        self.levels.first()
    }

    /// Get the coarsest (lowest resolution) level.
    pub fn coarsest(&self) -> Option<&ResolutionLevel> {
        self.levels.last()
    }

    /// Pick the level to read for a requested downsample factor.
    ///
    /// Chooses the level with the largest downsample that is still `<=` the
    /// request; equal factors resolve to the lower index. Requests finer than
    /// level 0 clamp to level 0, requests coarser than the last level clamp to
    /// the last level. The residual is `downsample / level_downsample`.
    pub fn select_for_downsample(&self, downsample: f64) -> Result<LevelSelection, ReaderError> {
        if !downsample.is_finite() || downsample <= 0.0 {
            return Err(ReaderError::InvalidDownsample(downsample));
        }

        let base = self.level(0)?;

        let chosen = self
            .levels
            .iter()
            .filter(|l| l.downsample <= downsample)
            .fold(None::<&ResolutionLevel>, |best, l| match best {
                Some(b) if l.downsample <= b.downsample => Some(b),
                _ => Some(l),
            })
            .unwrap_or(base);

        Ok(LevelSelection {
            level: chosen.index,
            level_downsample: chosen.downsample,
            residual: downsample / chosen.downsample,
        })
    }

    /// Pick the level to read for a full-resolution rectangle rendered at a
    /// target size.
    pub fn select_for_size(
        &self,
        region_width: u32,
        region_height: u32,
        target_width: u32,
        target_height: u32,
    ) -> Result<LevelSelection, ReaderError> {
        if target_width == 0 || target_height == 0 {
            return Err(ReaderError::EmptyRegion {
                width: target_width,
                height: target_height,
            });
        }
        let dx = region_width as f64 / target_width as f64;
        let dy = region_height as f64 / target_height as f64;
        self.select_for_downsample(dx.max(dy))
    }

    /// Level to read when the plane at `level` would exceed `ceiling` bytes.
    ///
    /// Returns `level` itself when it fits, otherwise the coarsest level.
    /// Fails with `PlaneTooLarge` when even the coarsest level does not fit.
    pub fn fallback_level(
        &self,
        level: usize,
        bytes_per_pixel: u64,
        ceiling: u64,
    ) -> Result<usize, ReaderError> {
        let requested = self.level(level)?;
        let bytes = requested.plane_byte_size(bytes_per_pixel);
        if bytes <= ceiling {
            return Ok(level);
        }

        let coarsest = self.coarsest().unwrap_or(requested);
        let coarse_bytes = coarsest.plane_byte_size(bytes_per_pixel);
        if coarse_bytes > ceiling {
            return Err(ReaderError::PlaneTooLarge {
                bytes: coarse_bytes,
                ceiling,
            });
        }

        Ok(coarsest.index)
    }
}

fn snap_downsample(factor: f64) -> f64 {
    let nearest = factor.round();
    if nearest >= 1.0 && ((factor - nearest) / nearest).abs() <= DOWNSAMPLE_SNAP {
        nearest
    } else {
        factor
    }
}

// =============================================================================
// Tests
// =============================================================================
