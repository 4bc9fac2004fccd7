//! The series reader facade.
//!
//! `SeriesReader` turns a decode engine session into a uniform, indexable
//! stream of planes and region tiles.
//!
//! # State Machine
//!
//! ```text
//!            open(path)                select_series(n)
//! ┌────────┐ ─────────▶ ┌────────────┐ ───────────────▶ ┌─────────────────┐
//! │ Closed │            │   Opened   │                  │ SeriesSelected  │
//! └────────┘ ◀───────── └────────────┘                  └─────────────────┘
//!     ▲        close()                                     │   │
//!     └────────────────────────────────────────────────────┘   │ select_series(m)
//!                          close()                             ▼ (refetch once)
//! ```
//!
//! Metadata of the selected series is fetched once per switch and served from
//! the cache afterwards. Plane and region reads go to the engine (or the
//! plane cache) and always come back little-endian and pixel-interleaved.
//!
//! # Failure Model
//!
//! Every read returns a `Result`. A failed read leaves the metadata cache
//! untouched and the reader usable, except when the engine reports a
//! corrupted handle: the reader then refuses engine calls until
//! [`SeriesReader::reopen`] succeeds.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use super::buffer::{AssociatedImage, PlaneBuffer, Region};
use super::cache::{PlaneCache, PlaneKey};
use super::index::PlaneCoordinate;
use super::metadata::SeriesMetadata;
use crate::config::ReaderOptions;
use crate::engine::{DecodeEngine, EngineHandle, EngineProvider, EngineSession};
use crate::error::{EngineError, ReaderError};
use crate::format::{
    normalize, ChannelColor, ColorModel, LookupTable, LookupTable16, LookupTable8, PixelType,
    SampleLayout,
};
use crate::pyramid::{Pyramid, ResolutionLevel, MAX_PLANE_BYTES};

// =============================================================================
// Region Requests
// =============================================================================

/// Where a region is read from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LevelTarget {
    /// An explicit pyramid level; coordinates are in that level's pixels.
    Level(usize),

    /// A downsample factor; coordinates are full-resolution pixels.
    Downsample(f64),
}

/// A rectangular read request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionRequest {
    pub target: LevelTarget,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub plane: PlaneCoordinate,
}

impl RegionRequest {
    /// Rectangle in level pixels at an explicit level.
    pub fn at_level(level: usize, x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            target: LevelTarget::Level(level),
            x,
            y,
            width,
            height,
            plane: PlaneCoordinate::default(),
        }
    }

    /// Rectangle in full-resolution pixels rendered at a downsample factor.
    pub fn at_downsample(downsample: f64, x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            target: LevelTarget::Downsample(downsample),
            x,
            y,
            width,
            height,
            plane: PlaneCoordinate::default(),
        }
    }

    /// Read from a specific plane instead of (0, 0, 0).
    pub fn with_plane(mut self, plane: PlaneCoordinate) -> Self {
        self.plane = plane;
        self
    }
}

// =============================================================================
// SeriesReader
// =============================================================================

/// Uniform reader over one file opened through a decode engine.
///
/// Not internally synchronized; drive one reader from one thread at a time.
pub struct SeriesReader<P: EngineProvider> {
    session: EngineSession<P>,
    options: ReaderOptions,

    /// Path of the open file, `None` when closed
    path: Option<PathBuf>,

    series_count: usize,

    /// Metadata of the selected series
    metadata: Option<SeriesMetadata>,

    /// Active resolution level of the selected series
    resolution: usize,

    cache: PlaneCache,

    /// Set when the engine reported a corrupted handle
    needs_reopen: bool,

    metadata_fetches: u64,
}

impl<P: EngineProvider> SeriesReader<P> {
    /// Create a closed reader with its own engine session.
    pub fn new(handle: Arc<EngineHandle<P>>, options: ReaderOptions) -> Result<Self, ReaderError> {
        let session = handle.create_session()?;
        Ok(Self {
            session,
            options,
            path: None,
            series_count: 0,
            metadata: None,
            resolution: 0,
            cache: PlaneCache::with_capacity(options.plane_cache_bytes),
            needs_reopen: false,
            metadata_fetches: 0,
        })
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Open a file. An already open file is closed first.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<(), ReaderError> {
        let path = path.as_ref();
        self.close();

        let open_failed = |e: EngineError| ReaderError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        self.session.open(path).map_err(open_failed)?;
        let series_count = match self.session.series_count() {
            Ok(count) => count,
            Err(e) => {
                if let Err(close_err) = self.session.close() {
                    warn!(error = %close_err, "Failed to release engine after open failure");
                }
                return Err(open_failed(e));
            }
        };

        self.path = Some(path.to_path_buf());
        self.series_count = series_count;
        info!(path = %path.display(), series = series_count, "Opened image file");
        Ok(())
    }

    /// Close the file and release the engine resource. Safe to call repeatedly.
    pub fn close(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };

        if let Err(e) = self.session.close() {
            warn!(path = %path.display(), error = %e, "Engine failed to close file");
        }
        self.series_count = 0;
        self.metadata = None;
        self.resolution = 0;
        self.needs_reopen = false;
        self.cache.clear();
        info!(path = %path.display(), "Closed image file");
    }

    /// Re-establish the engine handle, keeping the selected series and level.
    pub fn reopen(&mut self) -> Result<(), ReaderError> {
        let path = self.path.clone().ok_or(ReaderError::NotOpen)?;
        let series = self.metadata.as_ref().map(|m| m.series_index);
        let resolution = self.resolution;

        let engine = &mut *self.session;
        engine.reopen()?;
        if let Some(series) = series {
            engine.set_series(series)?;
            engine.set_resolution(resolution)?;
        }

        self.cache.clear();
        self.needs_reopen = false;
        info!(path = %path.display(), series = ?series, "Reopened image file");
        Ok(())
    }

    /// Whether a file is open.
    pub fn is_open(&self) -> bool {
        self.path.is_some()
    }

    /// Path of the open file.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether the engine handle must be re-established before further reads.
    pub fn needs_reopen(&self) -> bool {
        self.needs_reopen
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// The plane cache, for diagnostics.
    pub fn plane_cache(&self) -> &PlaneCache {
        &self.cache
    }

    /// Number of metadata batch fetches performed so far.
    pub fn metadata_fetch_count(&self) -> u64 {
        self.metadata_fetches
    }

    // =========================================================================
    // Series Selection and Metadata
    // =========================================================================

    pub fn series_count(&self) -> Result<usize, ReaderError> {
        self.ensure_open()?;
        Ok(self.series_count)
    }

    /// The selected series, `None` before the first selection.
    pub fn series(&self) -> Option<usize> {
        self.metadata.as_ref().map(|m| m.series_index)
    }

    /// Select a series, fetching its metadata once.
    ///
    /// Re-selecting the current series is a no-op. On failure the previous
    /// selection stays in effect.
    pub fn select_series(&mut self, series: usize) -> Result<(), ReaderError> {
        self.ensure_open()?;
        if self.series() == Some(series) {
            return Ok(());
        }
        if series >= self.series_count {
            return Err(ReaderError::SeriesOutOfRange {
                series,
                count: self.series_count,
            });
        }

        let previous = self.series();
        let resolution = self.resolution;
        let metadata = self.engine_call(|engine| {
            let fetched = match engine.set_series(series) {
                Ok(()) => SeriesMetadata::fetch(engine, series),
                Err(e) => Err(e.into()),
            };

            if fetched.is_err() {
                if let Some(previous) = previous {
                    let restored = engine
                        .set_series(previous)
                        .and_then(|_| engine.set_resolution(resolution));
                    if let Err(e) = restored {
                        warn!(series = previous, error = %e, "Failed to restore previous series");
                    }
                }
            }
            fetched
        })?;

        self.metadata_fetches += 1;
        info!(
            series,
            size_x = metadata.size_x,
            size_y = metadata.size_y,
            planes = metadata.image_count,
            levels = metadata.level_count(),
            pixel_type = %metadata.pixel_type,
            "Selected series"
        );
        self.metadata = Some(metadata);
        self.resolution = 0;
        Ok(())
    }

    /// Metadata of the selected series.
    pub fn metadata(&self) -> Result<&SeriesMetadata, ReaderError> {
        self.ensure_open()?;
        self.metadata.as_ref().ok_or(ReaderError::NoSeriesSelected)
    }

    pub fn image_count(&self) -> Result<u32, ReaderError> {
        Ok(self.metadata()?.image_count)
    }

    pub fn size_x(&self) -> Result<u32, ReaderError> {
        Ok(self.metadata()?.size_x)
    }

    pub fn size_y(&self) -> Result<u32, ReaderError> {
        Ok(self.metadata()?.size_y)
    }

    pub fn size_z(&self) -> Result<u32, ReaderError> {
        Ok(self.metadata()?.size_z)
    }

    /// Effective channel count.
    pub fn size_c(&self) -> Result<u32, ReaderError> {
        Ok(self.metadata()?.size_c)
    }

    pub fn size_t(&self) -> Result<u32, ReaderError> {
        Ok(self.metadata()?.size_t)
    }

    pub fn pixel_type(&self) -> Result<PixelType, ReaderError> {
        Ok(self.metadata()?.pixel_type)
    }

    pub fn rgb_channel_count(&self) -> Result<u32, ReaderError> {
        Ok(self.metadata()?.rgb_channel_count)
    }

    pub fn plane_byte_size(&self) -> Result<u64, ReaderError> {
        Ok(self.metadata()?.plane_byte_size)
    }

    /// Physical pixel sizes `(x, y, z)` in millimetres.
    pub fn physical_size(&self) -> Result<(Option<f64>, Option<f64>, Option<f64>), ReaderError> {
        let m = self.metadata()?;
        Ok((m.physical_size_x, m.physical_size_y, m.physical_size_z))
    }

    /// Time increment in seconds.
    pub fn physical_size_t(&self) -> Result<Option<f64>, ReaderError> {
        Ok(self.metadata()?.physical_size_t)
    }

    /// Per-channel tints of the selected series.
    pub fn color_model(&self) -> Result<&ColorModel, ReaderError> {
        Ok(&self.metadata()?.channel_colors)
    }

    /// Tint reported for one effective channel.
    pub fn channel_color(&self, channel: u32) -> Result<Option<ChannelColor>, ReaderError> {
        let m = self.metadata()?;
        if channel >= m.size_c {
            return Err(ReaderError::ChannelOutOfRange {
                channel,
                count: m.size_c,
            });
        }
        Ok(m.channel_colors.channel_color(channel as usize))
    }

    /// Resolution pyramid of the selected series.
    pub fn pyramid(&self) -> Result<&Pyramid, ReaderError> {
        Ok(&self.metadata()?.pyramid)
    }

    /// Active resolution level.
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Make `level` the active resolution for plane reads.
    pub fn set_resolution(&mut self, level: usize) -> Result<(), ReaderError> {
        self.metadata()?.pyramid.level(level)?;
        if level == self.resolution {
            return Ok(());
        }
        self.engine_call(|engine| Ok(engine.set_resolution(level)?))?;
        self.resolution = level;
        debug!(level, "Resolution changed");
        Ok(())
    }

    // =========================================================================
    // Plane Index Algebra
    // =========================================================================

    /// Linear index of a plane, as reported by the engine.
    pub fn plane_index(&mut self, coord: PlaneCoordinate) -> Result<u32, ReaderError> {
        let dims = self.metadata()?.dimensions();
        coord.validate(&dims)?;

        let index = self.engine_call(|engine| Ok(engine.plane_index(coord.z, coord.c, coord.t)?))?;
        if index >= dims.image_count {
            return Err(EngineError::Malformed(format!(
                "plane index {} for {} outside [0, {})",
                index, coord, dims.image_count
            ))
            .into());
        }
        Ok(index)
    }

    /// (Z, C, T) coordinate of a plane index, as reported by the engine.
    pub fn coordinates(&mut self, index: u32) -> Result<PlaneCoordinate, ReaderError> {
        let dims = self.metadata()?.dimensions();
        dims.check_index(index)?;

        let zct = self.engine_call(|engine| Ok(engine.zct_coords(index)?))?;
        let coord = PlaneCoordinate::from_zct(zct);
        if coord.validate(&dims).is_err() {
            return Err(EngineError::Malformed(format!(
                "coordinate {} for plane {} outside series dimensions",
                coord, index
            ))
            .into());
        }
        Ok(coord)
    }

    // =========================================================================
    // Plane Reads
    // =========================================================================

    /// Read one full plane at the active resolution.
    ///
    /// Planes above the byte ceiling are read from the coarsest level instead;
    /// [`PlaneBuffer::resolution`] reports the level actually used.
    pub fn read_plane(&mut self, index: u32) -> Result<PlaneBuffer, ReaderError> {
        self.ensure_usable()?;
        let meta = self.metadata()?;
        meta.dimensions().check_index(index)?;

        let series = meta.series_index;
        let pixel_type = meta.pixel_type;
        let samples = meta.rgb_channel_count;
        let ceiling = self.options.max_plane_bytes.min(MAX_PLANE_BYTES);
        let level_index = meta.pyramid.fallback_level(self.resolution, meta.pixel_bytes(), ceiling)?;
        let level = *meta.pyramid.level(level_index)?;

        if level_index != self.resolution {
            warn!(
                plane = index,
                requested = self.resolution,
                level = level_index,
                "Plane exceeds byte ceiling, reading coarsest level"
            );
        }

        let key = PlaneKey::new(series, level_index, index);
        let data = match self.cache.get(&key) {
            Some(data) => {
                debug!(plane = index, level = level_index, "Plane cache hit");
                data
            }
            None => {
                let raw = self.read_at_level(level_index, |engine| Ok(engine.open_bytes(index)?))?;
                let data = self.normalize_read(raw, index, level.width, level.height)?;
                self.cache.put(key, data.clone());
                data
            }
        };

        Ok(PlaneBuffer {
            data,
            width: level.width,
            height: level.height,
            pixel_type,
            samples_per_pixel: samples,
            plane_index: index,
            resolution: level_index,
        })
    }

    /// Read one full plane by coordinate.
    pub fn read_plane_at(&mut self, coord: PlaneCoordinate) -> Result<PlaneBuffer, ReaderError> {
        let index = self.plane_index(coord)?;
        self.read_plane(index)
    }

    // =========================================================================
    // Tile and Region Reads
    // =========================================================================

    /// Read a rectangle in level pixels.
    pub fn read_tile(
        &mut self,
        level: usize,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        coord: PlaneCoordinate,
    ) -> Result<Region, ReaderError> {
        check_not_empty(width, height)?;
        let lvl = *self.metadata()?.pyramid.level(level)?;
        check_bounds(&lvl, x, y, width, height)?;

        let index = self.plane_index(coord)?;
        self.read_level_rect(index, &lvl, (x, y, width, height), 1.0)
    }

    /// Read one tile of a level's optimal tile grid. Edge tiles are clipped.
    pub fn read_grid_tile(
        &mut self,
        level: usize,
        col: u32,
        row: u32,
        coord: PlaneCoordinate,
    ) -> Result<Region, ReaderError> {
        let lvl = *self.metadata()?.pyramid.level(level)?;
        let (x, y, width, height) =
            lvl.tile_rect(col, row)
                .ok_or(ReaderError::RegionOutOfBounds {
                    level,
                    x: col.saturating_mul(lvl.tile_width),
                    y: row.saturating_mul(lvl.tile_height),
                    width: lvl.tile_width,
                    height: lvl.tile_height,
                    level_width: lvl.width,
                    level_height: lvl.height,
                })?;
        self.read_tile(level, x, y, width, height, coord)
    }

    /// Read a rectangle at an explicit level or downsample factor.
    ///
    /// With [`LevelTarget::Downsample`] the rectangle is given in
    /// full-resolution pixels; the closest level not coarser than requested
    /// is read and [`Region::residual`] tells how much further to shrink.
    pub fn read_region(&mut self, request: RegionRequest) -> Result<Region, ReaderError> {
        let RegionRequest {
            target,
            x,
            y,
            width,
            height,
            plane,
        } = request;

        let downsample = match target {
            LevelTarget::Level(level) => return self.read_tile(level, x, y, width, height, plane),
            LevelTarget::Downsample(d) => d,
        };

        check_not_empty(width, height)?;
        let pyramid = &self.metadata()?.pyramid;
        let base = *pyramid.level(0)?;
        check_bounds(&base, x, y, width, height)?;

        let selection = pyramid.select_for_downsample(downsample)?;
        let lvl = *pyramid.level(selection.level)?;
        let rect = scale_rect(&lvl, x, y, width, height);

        debug!(
            downsample,
            level = selection.level,
            residual = selection.residual,
            "Region level selected"
        );

        let index = self.plane_index(plane)?;
        self.read_level_rect(index, &lvl, rect, selection.residual)
    }

    /// Whole-plane preview no larger than `max_edge` on its longest side.
    ///
    /// Reads the finest level that fits, or the coarsest level with a residual
    /// when none does.
    pub fn default_thumbnail(
        &mut self,
        coord: PlaneCoordinate,
        max_edge: u32,
    ) -> Result<Region, ReaderError> {
        check_not_empty(max_edge, max_edge)?;
        let pyramid = &self.metadata()?.pyramid;

        let lvl = pyramid
            .levels()
            .iter()
            .find(|l| l.width.max(l.height) <= max_edge)
            .or_else(|| pyramid.coarsest())
            .copied()
            .ok_or(ReaderError::LevelOutOfRange { level: 0, count: 0 })?;

        let longest = lvl.width.max(lvl.height) as f64;
        let residual = (longest / max_edge as f64).max(1.0);

        let index = self.plane_index(coord)?;
        self.read_level_rect(index, &lvl, (0, 0, lvl.width, lvl.height), residual)
    }

    // =========================================================================
    // Auxiliary Reads
    // =========================================================================

    /// 8-bit palette of the selected series.
    ///
    /// `Ok(None)` when the series has no palette; palettes only exist for
    /// single-sample pixels.
    pub fn lookup_table_8bit(&mut self) -> Result<Option<LookupTable8>, ReaderError> {
        if !self.has_single_sample()? {
            return Ok(None);
        }
        let rows = self.engine_call(|engine| Ok(engine.lookup_table_8bit()?))?;
        rows.map(LookupTable::from_channels)
            .transpose()
            .map_err(ReaderError::MalformedLookupTable)
    }

    /// 16-bit palette of the selected series.
    pub fn lookup_table_16bit(&mut self) -> Result<Option<LookupTable16>, ReaderError> {
        if !self.has_single_sample()? {
            return Ok(None);
        }
        let rows = self.engine_call(|engine| Ok(engine.lookup_table_16bit()?))?;
        rows.map(LookupTable::from_channels)
            .transpose()
            .map_err(ReaderError::MalformedLookupTable)
    }

    /// Names of associated images (label, macro, ...).
    pub fn associated_image_names(&mut self) -> Result<Vec<String>, ReaderError> {
        self.ensure_open()?;
        self.engine_call(|engine| Ok(engine.associated_image_names()?))
    }

    /// Pixels of an associated image, `Ok(None)` when the file has none by that name.
    pub fn associated_image(&mut self, name: &str) -> Result<Option<AssociatedImage>, ReaderError> {
        self.ensure_open()?;
        let image = self.engine_call(|engine| Ok(engine.associated_image(name)?))?;

        if let Some(image) = &image {
            if image.data.len() != image.expected_len() {
                return Err(EngineError::Malformed(format!(
                    "associated image {} has {} bytes, expected {}",
                    name,
                    image.data.len(),
                    image.expected_len()
                ))
                .into());
            }
        }
        Ok(image)
    }

    /// Full metadata document of the file, when the engine provides one.
    pub fn metadata_document(&mut self) -> Result<Option<String>, ReaderError> {
        self.ensure_open()?;
        self.engine_call(|engine| Ok(engine.metadata_document()?))
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn ensure_open(&self) -> Result<(), ReaderError> {
        if self.path.is_none() {
            return Err(ReaderError::NotOpen);
        }
        Ok(())
    }

    fn ensure_usable(&self) -> Result<(), ReaderError> {
        self.ensure_open()?;
        if self.needs_reopen {
            return Err(ReaderError::EngineHandleCorrupted(
                "reopen required after earlier failure".to_string(),
            ));
        }
        Ok(())
    }

    fn has_single_sample(&self) -> Result<bool, ReaderError> {
        let samples = self.metadata()?.rgb_channel_count;
        if samples != 1 {
            debug!(samples, "No palette for multi-sample pixels");
        }
        Ok(samples == 1)
    }

    /// Run an engine call, tracking corrupted-handle failures.
    fn engine_call<T>(
        &mut self,
        call: impl FnOnce(&mut P::Engine) -> Result<T, ReaderError>,
    ) -> Result<T, ReaderError> {
        self.ensure_usable()?;
        let result = call(&mut *self.session);
        if let Err(e) = &result {
            if e.requires_reopen() {
                warn!(error = %e, "Engine handle corrupted, reopen required");
                self.needs_reopen = true;
            }
        }
        result
    }

    /// Run an engine call at `level`, restoring the active resolution after.
    fn read_at_level<T>(
        &mut self,
        level: usize,
        call: impl FnOnce(&mut P::Engine) -> Result<T, ReaderError>,
    ) -> Result<T, ReaderError> {
        let current = self.resolution;
        self.engine_call(|engine| {
            if level == current {
                return call(engine);
            }
            engine.set_resolution(level)?;
            let result = call(engine);
            let restored = engine.set_resolution(current);
            let value = result?;
            restored?;
            Ok(value)
        })
    }

    /// Read a level rectangle `(x, y, width, height)` known to be in bounds.
    fn read_level_rect(
        &mut self,
        index: u32,
        level: &ResolutionLevel,
        rect: (u32, u32, u32, u32),
        residual: f64,
    ) -> Result<Region, ReaderError> {
        let (x, y, width, height) = rect;
        let meta = self.metadata()?;
        let pixel_type = meta.pixel_type;
        let samples = meta.rgb_channel_count;

        let bytes = (width as u64) * (height as u64) * meta.pixel_bytes();
        let ceiling = self.options.max_plane_bytes.min(MAX_PLANE_BYTES);
        if bytes > ceiling {
            return Err(ReaderError::PlaneTooLarge { bytes, ceiling });
        }

        let raw = self.read_at_level(level.index, |engine| {
            Ok(engine.open_bytes_region(index, x, y, width, height)?)
        })?;
        let data = self.normalize_read(raw, index, width, height)?;

        Ok(Region {
            data,
            width,
            height,
            level: level.index,
            level_downsample: level.downsample,
            residual,
            pixel_type,
            samples_per_pixel: samples,
        })
    }

    /// Validate and normalize raw engine bytes for a `width` x `height` read.
    fn normalize_read(
        &self,
        raw: Option<Vec<u8>>,
        index: u32,
        width: u32,
        height: u32,
    ) -> Result<Bytes, ReaderError> {
        let meta = self.metadata()?;
        let raw = raw.ok_or_else(|| ReaderError::PlaneReadFailed {
            index,
            reason: "engine returned no data".to_string(),
        })?;

        let layout = SampleLayout {
            width: width as usize,
            height: height as usize,
            samples_per_pixel: meta.rgb_channel_count as usize,
            bytes_per_sample: meta.pixel_type.bytes_per_pixel(),
            byte_order: meta.byte_order,
            interleaved: meta.interleaved,
        };

        let actual = raw.len();
        let data = normalize(raw, &layout).map_err(|expected| ReaderError::PlaneReadFailed {
            index,
            reason: format!("engine returned {actual} bytes, expected {expected}"),
        })?;
        Ok(Bytes::from(data))
    }
}

impl<P: EngineProvider> Drop for SeriesReader<P> {
    fn drop(&mut self) {
        self.close();
    }
}

// =============================================================================
// Geometry Helpers
// =============================================================================

fn check_not_empty(width: u32, height: u32) -> Result<(), ReaderError> {
    if width == 0 || height == 0 {
        return Err(ReaderError::EmptyRegion { width, height });
    }
    Ok(())
}

fn check_bounds(
    level: &ResolutionLevel,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
) -> Result<(), ReaderError> {
    if !level.contains(x, y, width, height) {
        return Err(ReaderError::RegionOutOfBounds {
            level: level.index,
            x,
            y,
            width,
            height,
            level_width: level.width,
            level_height: level.height,
        });
    }
    Ok(())
}

/// Map a full-resolution rectangle onto a level, covering it fully.
///
/// Edges are floored/ceiled by the level's downsample and clamped to the
/// level, keeping at least one pixel.
fn scale_rect(level: &ResolutionLevel, x: u32, y: u32, width: u32, height: u32) -> (u32, u32, u32, u32) {
    let ds = level.downsample;
    let max_x = level.width.saturating_sub(1);
    let max_y = level.height.saturating_sub(1);

    let x0 = ((x as f64 / ds).floor() as u32).min(max_x);
    let y0 = ((y as f64 / ds).floor() as u32).min(max_y);
    let x1 = (((x as f64 + width as f64) / ds).ceil() as u32).clamp(x0 + 1, level.width.max(1));
    let y1 = (((y as f64 + height as f64) / ds).ceil() as u32).clamp(y0 + 1, level.height.max(1));

    (x0, y0, x1 - x0, y1 - y0)
}
