//! Test utilities for integration tests.
//!
//! This module provides a scriptable in-memory decode engine that counts the
//! calls made into it, plus helpers for building companion datasets on disk.

use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tiff::encoder::{colortype, TiffEncoder};

use image_series_reader::engine::{DecodeEngine, DimensionOrder, EngineHandle, EngineProvider};
use image_series_reader::error::EngineError;
use image_series_reader::format::{AssociatedPixelType, PixelType};
use image_series_reader::series::{AssociatedImage, SeriesReader};
use image_series_reader::ReaderOptions;

// =============================================================================
// Mock Series Description
// =============================================================================

/// One series served by the mock engine.
#[derive(Debug, Clone)]
pub struct MockSeries {
    /// Level dimensions, finest first
    pub levels: Vec<(u32, u32)>,
    pub downsamples: Option<Vec<f64>>,
    pub size_z: u32,
    pub size_c: u32,
    pub size_t: u32,
    pub rgb: u32,
    pub pixel_type: PixelType,
    pub little_endian: bool,
    pub interleaved: bool,
    pub order: DimensionOrder,
    pub tile: (u32, u32),
    pub colors: Vec<Option<[u8; 4]>>,
    pub physical_size_x: Option<f64>,
    pub lut8: Option<Vec<Vec<u8>>>,
    pub lut16: Option<Vec<Vec<u16>>>,
}

impl MockSeries {
    /// Single-level 8-bit grayscale series.
    pub fn gray8(width: u32, height: u32) -> Self {
        Self {
            levels: vec![(width, height)],
            downsamples: None,
            size_z: 1,
            size_c: 1,
            size_t: 1,
            rgb: 1,
            pixel_type: PixelType::Uint8,
            little_endian: true,
            interleaved: true,
            order: DimensionOrder::XYZCT,
            tile: (width.min(256), height.min(256)),
            colors: Vec::new(),
            physical_size_x: None,
            lut8: None,
            lut16: None,
        }
    }

    pub fn with_levels(mut self, levels: Vec<(u32, u32)>) -> Self {
        self.levels = levels;
        self
    }

    pub fn with_zct(mut self, z: u32, c: u32, t: u32) -> Self {
        self.size_z = z;
        self.size_c = c;
        self.size_t = t;
        self
    }

    pub fn with_pixels(mut self, pixel_type: PixelType, rgb: u32) -> Self {
        self.pixel_type = pixel_type;
        self.rgb = rgb;
        self
    }

    pub fn with_layout(mut self, little_endian: bool, interleaved: bool) -> Self {
        self.little_endian = little_endian;
        self.interleaved = interleaved;
        self
    }

    pub fn image_count(&self) -> u32 {
        self.size_z * self.size_c * self.size_t
    }
}

/// Deterministic sample value at level pixel `(x, y)`, sample `s` of `plane`.
pub fn sample_value(level: usize, plane: u32, x: u32, y: u32, s: u32) -> u64 {
    level as u64 * 1000 + plane as u64 * 100 + x as u64 * 7 + y as u64 * 13 + s as u64 * 3
}

/// Build a raw engine buffer for a rectangle, honoring byte order and interleaving.
fn render_rect(
    series: &MockSeries,
    level: usize,
    plane: u32,
    rect: (u32, u32, u32, u32),
) -> Vec<u8> {
    let (x0, y0, width, height) = rect;
    let bps = series.pixel_type.bytes_per_pixel();
    let mut out = Vec::with_capacity(width as usize * height as usize * series.rgb as usize * bps);

    let mut push = |value: u64| {
        let le = value.to_le_bytes();
        let bytes = &le[..bps];
        if series.little_endian {
            out.extend_from_slice(bytes);
        } else {
            out.extend(bytes.iter().rev());
        }
    };

    if series.interleaved || series.rgb == 1 {
        for y in 0..height {
            for x in 0..width {
                for s in 0..series.rgb {
                    push(sample_value(level, plane, x0 + x, y0 + y, s));
                }
            }
        }
    } else {
        for s in 0..series.rgb {
            for y in 0..height {
                for x in 0..width {
                    push(sample_value(level, plane, x0 + x, y0 + y, s));
                }
            }
        }
    }
    out
}

// =============================================================================
// Call Counters and Fault Injection
// =============================================================================

/// Shared counters and switches between a test and its mock engines.
#[derive(Debug, Default)]
pub struct MockControl {
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub reopens: AtomicUsize,
    pub set_series_calls: AtomicUsize,
    pub pixel_type_calls: AtomicUsize,
    pub size_x_calls: AtomicUsize,
    pub plane_reads: AtomicUsize,
    pub region_reads: AtomicUsize,

    /// Next plane or region read corrupts the handle
    pub corrupt_next_read: AtomicBool,

    /// Plane reads return no data
    pub return_none: AtomicBool,

    /// Plane reads return one byte too few
    pub truncate_reads: AtomicBool,

    /// Metadata fetches of this series fail (usize::MAX = none)
    pub failing_series: AtomicUsize,
}

impl MockControl {
    pub fn new() -> Arc<Self> {
        let control = Self::default();
        control.failing_series.store(usize::MAX, Ordering::SeqCst);
        Arc::new(control)
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Mock Engine
// =============================================================================

pub struct MockEngine {
    series: Arc<Vec<MockSeries>>,
    control: Arc<MockControl>,
    open: bool,
    corrupted: bool,
    current: usize,
    resolution: usize,
}

impl MockEngine {
    fn active(&self) -> Result<&MockSeries, EngineError> {
        if !self.open {
            return Err(EngineError::NotOpen);
        }
        if self.corrupted {
            return Err(EngineError::HandleCorrupted("stale handle".to_string()));
        }
        self.series
            .get(self.current)
            .ok_or_else(|| EngineError::Failed(format!("no series {}", self.current)))
    }

    fn level_size(&self) -> Result<(u32, u32), EngineError> {
        let series = self.active()?;
        series
            .levels
            .get(self.resolution)
            .copied()
            .ok_or_else(|| EngineError::Failed(format!("no level {}", self.resolution)))
    }

    fn sizes(&self) -> Result<[u32; 3], EngineError> {
        let s = self.active()?;
        Ok([s.size_z, s.size_c, s.size_t])
    }

    fn read(&mut self, plane: u32, rect: Option<(u32, u32, u32, u32)>) -> Result<Option<Vec<u8>>, EngineError> {
        let (width, height) = self.level_size()?;
        if self.control.corrupt_next_read.swap(false, Ordering::SeqCst) {
            self.corrupted = true;
            return Err(EngineError::HandleCorrupted("decoder crashed".to_string()));
        }
        if self.control.return_none.load(Ordering::SeqCst) {
            return Ok(None);
        }

        let series = self.active()?;
        if plane >= series.image_count() {
            return Err(EngineError::Failed(format!("no plane {}", plane)));
        }

        let rect = rect.unwrap_or((0, 0, width, height));
        let (x, y, w, h) = rect;
        if x as u64 + w as u64 > width as u64 || y as u64 + h as u64 > height as u64 {
            return Err(EngineError::Failed("region out of bounds".to_string()));
        }

        let mut data = render_rect(series, self.resolution, plane, rect);
        if self.control.truncate_reads.load(Ordering::SeqCst) {
            data.pop();
        }
        Ok(Some(data))
    }
}

impl DecodeEngine for MockEngine {
    fn open(&mut self, path: &Path) -> Result<(), EngineError> {
        if path.extension().is_some_and(|ext| ext == "bad") {
            return Err(EngineError::UnsupportedFormat {
                reason: "unknown container".to_string(),
            });
        }
        self.control.opens.fetch_add(1, Ordering::SeqCst);
        self.open = true;
        self.corrupted = false;
        self.current = 0;
        self.resolution = 0;
        Ok(())
    }

    fn close(&mut self) -> Result<(), EngineError> {
        self.control.closes.fetch_add(1, Ordering::SeqCst);
        self.open = false;
        Ok(())
    }

    fn reopen(&mut self) -> Result<(), EngineError> {
        if !self.open {
            return Err(EngineError::NotOpen);
        }
        self.control.reopens.fetch_add(1, Ordering::SeqCst);
        self.corrupted = false;
        self.current = 0;
        self.resolution = 0;
        Ok(())
    }

    fn series_count(&self) -> Result<usize, EngineError> {
        if !self.open {
            return Err(EngineError::NotOpen);
        }
        Ok(self.series.len())
    }

    fn set_series(&mut self, series: usize) -> Result<(), EngineError> {
        self.control.set_series_calls.fetch_add(1, Ordering::SeqCst);
        if series >= self.series.len() {
            return Err(EngineError::Failed(format!("no series {}", series)));
        }
        self.current = series;
        self.resolution = 0;
        Ok(())
    }

    fn series(&self) -> Result<usize, EngineError> {
        Ok(self.current)
    }

    fn image_count(&self) -> Result<u32, EngineError> {
        Ok(self.active()?.image_count())
    }

    fn size_x(&self) -> Result<u32, EngineError> {
        self.control.size_x_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.level_size()?.0)
    }

    fn size_y(&self) -> Result<u32, EngineError> {
        Ok(self.level_size()?.1)
    }

    fn size_z(&self) -> Result<u32, EngineError> {
        Ok(self.active()?.size_z)
    }

    fn effective_size_c(&self) -> Result<u32, EngineError> {
        Ok(self.active()?.size_c)
    }

    fn size_t(&self) -> Result<u32, EngineError> {
        Ok(self.active()?.size_t)
    }

    fn physical_size_x(&self) -> Result<Option<f64>, EngineError> {
        Ok(self.active()?.physical_size_x)
    }

    fn physical_size_y(&self) -> Result<Option<f64>, EngineError> {
        Ok(None)
    }

    fn physical_size_z(&self) -> Result<Option<f64>, EngineError> {
        Ok(None)
    }

    fn physical_size_t(&self) -> Result<Option<f64>, EngineError> {
        Ok(None)
    }

    fn pixel_type(&self) -> Result<i32, EngineError> {
        self.control.pixel_type_calls.fetch_add(1, Ordering::SeqCst);
        if self.control.failing_series.load(Ordering::SeqCst) == self.current {
            return Err(EngineError::Failed("metadata unavailable".to_string()));
        }
        Ok(self.active()?.pixel_type.ordinal())
    }

    fn rgb_channel_count(&self) -> Result<u32, EngineError> {
        Ok(self.active()?.rgb)
    }

    fn channel_color(&self, channel: u32) -> Result<Option<[u8; 4]>, EngineError> {
        Ok(self.active()?.colors.get(channel as usize).copied().flatten())
    }

    fn is_little_endian(&self) -> Result<bool, EngineError> {
        Ok(self.active()?.little_endian)
    }

    fn is_interleaved(&self) -> Result<bool, EngineError> {
        Ok(self.active()?.interleaved)
    }

    fn plane_index(&self, z: u32, c: u32, t: u32) -> Result<u32, EngineError> {
        let order = self.active()?.order;
        order
            .plane_index([z, c, t], self.sizes()?)
            .ok_or_else(|| EngineError::Failed("coordinate out of range".to_string()))
    }

    fn zct_coords(&self, index: u32) -> Result<[u32; 3], EngineError> {
        let order = self.active()?.order;
        order
            .coordinates(index, self.sizes()?)
            .ok_or_else(|| EngineError::Failed("index out of range".to_string()))
    }

    fn open_bytes(&mut self, index: u32) -> Result<Option<Vec<u8>>, EngineError> {
        self.control.plane_reads.fetch_add(1, Ordering::SeqCst);
        self.read(index, None)
    }

    fn open_bytes_region(
        &mut self,
        index: u32,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<Option<Vec<u8>>, EngineError> {
        self.control.region_reads.fetch_add(1, Ordering::SeqCst);
        self.read(index, Some((x, y, width, height)))
    }

    fn lookup_table_8bit(&self) -> Result<Option<Vec<Vec<u8>>>, EngineError> {
        Ok(self.active()?.lut8.clone())
    }

    fn lookup_table_16bit(&self) -> Result<Option<Vec<Vec<u16>>>, EngineError> {
        Ok(self.active()?.lut16.clone())
    }

    fn optimal_tile_width(&self) -> Result<u32, EngineError> {
        Ok(self.active()?.tile.0)
    }

    fn optimal_tile_height(&self) -> Result<u32, EngineError> {
        Ok(self.active()?.tile.1)
    }

    fn resolution_count(&self) -> Result<usize, EngineError> {
        Ok(self.active()?.levels.len())
    }

    fn set_resolution(&mut self, level: usize) -> Result<(), EngineError> {
        if level >= self.active()?.levels.len() {
            return Err(EngineError::Failed(format!("no level {}", level)));
        }
        self.resolution = level;
        Ok(())
    }

    fn resolution(&self) -> Result<usize, EngineError> {
        Ok(self.resolution)
    }

    fn level_downsamples(&self) -> Result<Option<Vec<f64>>, EngineError> {
        Ok(self.active()?.downsamples.clone())
    }

    fn associated_image_names(&self) -> Result<Vec<String>, EngineError> {
        self.active()?;
        Ok(vec!["label".to_string()])
    }

    fn associated_image(&mut self, name: &str) -> Result<Option<AssociatedImage>, EngineError> {
        self.active()?;
        if name != "label" {
            return Ok(None);
        }
        Ok(Some(AssociatedImage {
            name: name.to_string(),
            width: 2,
            height: 2,
            samples_per_pixel: 1,
            pixel_type: AssociatedPixelType::Uint8,
            data: Bytes::from_static(&[0, 64, 128, 255]),
        }))
    }

    fn metadata_document(&self) -> Result<Option<String>, EngineError> {
        self.active()?;
        Ok(Some("<mock/>".to_string()))
    }
}

// =============================================================================
// Mock Provider
// =============================================================================

#[derive(Clone)]
pub struct MockProvider {
    series: Arc<Vec<MockSeries>>,
    control: Arc<MockControl>,
}

impl MockProvider {
    pub fn new(series: Vec<MockSeries>, control: Arc<MockControl>) -> Self {
        Self {
            series: Arc::new(series),
            control,
        }
    }
}

impl EngineProvider for MockProvider {
    type Engine = MockEngine;

    fn name(&self) -> &str {
        "mock"
    }

    fn create_engine(&self) -> Result<MockEngine, EngineError> {
        Ok(MockEngine {
            series: Arc::clone(&self.series),
            control: Arc::clone(&self.control),
            open: false,
            corrupted: false,
            current: 0,
            resolution: 0,
        })
    }
}

/// Open a reader over the given mock series with default options.
pub fn open_mock(series: Vec<MockSeries>) -> (SeriesReader<MockProvider>, Arc<MockControl>) {
    open_mock_with(series, ReaderOptions::default())
}

/// Open a reader over the given mock series.
pub fn open_mock_with(
    series: Vec<MockSeries>,
    options: ReaderOptions,
) -> (SeriesReader<MockProvider>, Arc<MockControl>) {
    let control = MockControl::new();
    let handle = EngineHandle::new(MockProvider::new(series, Arc::clone(&control)));
    let mut reader = SeriesReader::new(handle, options).unwrap();
    reader.open("mock.img").unwrap();
    (reader, control)
}

// =============================================================================
// Companion Dataset Helpers
// =============================================================================

/// Write an 8-bit grayscale TIFF whose pixel at (x, y) is `x + y * width`.
pub fn write_gray8_tiff(path: &Path, width: u32, height: u32, offset: u8) {
    let data: Vec<u8> = (0..width * height)
        .map(|i| (i as u8).wrapping_add(offset))
        .collect();
    let file = File::create(path).unwrap();
    TiffEncoder::new(file)
        .unwrap()
        .write_image::<colortype::Gray8>(width, height, &data)
        .unwrap();
}

/// Write an RGB TIFF filled with one color.
pub fn write_rgb8_tiff(path: &Path, width: u32, height: u32, rgb: [u8; 3]) {
    let data: Vec<u8> = (0..width * height).flat_map(|_| rgb).collect();
    let file = File::create(path).unwrap();
    TiffEncoder::new(file)
        .unwrap()
        .write_image::<colortype::RGB8>(width, height, &data)
        .unwrap();
}
