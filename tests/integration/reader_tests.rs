//! End-to-end tests of `SeriesReader` against the scriptable mock engine.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use image_series_reader::engine::{DimensionOrder, EngineHandle};
use image_series_reader::error::{EngineError, ReaderError};
use image_series_reader::format::{ChannelColor, PixelType};
use image_series_reader::series::{PlaneCoordinate, RegionRequest, SeriesReader};
use image_series_reader::ReaderOptions;

use super::test_utils::{
    open_mock, open_mock_with, sample_value, MockControl, MockProvider, MockSeries,
};

fn count(counter: &std::sync::atomic::AtomicUsize) -> usize {
    MockControl::count(counter)
}

fn pyramid_series() -> MockSeries {
    let mut series = MockSeries::gray8(1000, 800).with_levels(vec![(1000, 800), (250, 200), (62, 50)]);
    series.downsamples = Some(vec![1.0, 4.0, 16.0]);
    series
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn test_closed_reader_rejects_calls() {
    let control = MockControl::new();
    let handle = EngineHandle::new(MockProvider::new(vec![MockSeries::gray8(4, 4)], control));
    let mut reader = SeriesReader::new(handle, ReaderOptions::default()).unwrap();

    assert!(!reader.is_open());
    assert!(matches!(reader.series_count(), Err(ReaderError::NotOpen)));
    assert!(matches!(reader.select_series(0), Err(ReaderError::NotOpen)));
    assert!(matches!(reader.read_plane(0), Err(ReaderError::NotOpen)));
}

#[test]
fn test_open_failure_reports_path() {
    let control = MockControl::new();
    let handle = EngineHandle::new(MockProvider::new(vec![MockSeries::gray8(4, 4)], control));
    let mut reader = SeriesReader::new(handle, ReaderOptions::default()).unwrap();

    let err = reader.open("slide.bad").unwrap_err();
    match err {
        ReaderError::OpenFailed { path, reason } => {
            assert_eq!(path.to_str(), Some("slide.bad"));
            assert!(reason.contains("unknown container"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!reader.is_open());
}

#[test]
fn test_metadata_before_selection() {
    let (reader, _control) = open_mock(vec![MockSeries::gray8(4, 4)]);
    assert_eq!(reader.series_count().unwrap(), 1);
    assert_eq!(reader.series(), None);
    assert!(matches!(reader.metadata(), Err(ReaderError::NoSeriesSelected)));
    assert!(matches!(reader.size_x(), Err(ReaderError::NoSeriesSelected)));
}

#[test]
fn test_close_is_idempotent() {
    let (mut reader, control) = open_mock(vec![MockSeries::gray8(4, 4)]);
    reader.select_series(0).unwrap();

    reader.close();
    reader.close();

    assert_eq!(count(&control.closes), 1);
    assert!(!reader.is_open());
    assert!(matches!(reader.series_count(), Err(ReaderError::NotOpen)));

    drop(reader);
    assert_eq!(count(&control.closes), 1);
}

#[test]
fn test_drop_closes_and_releases_session() {
    let control = MockControl::new();
    let handle = EngineHandle::new(MockProvider::new(
        vec![MockSeries::gray8(4, 4)],
        Arc::clone(&control),
    ));

    let mut first = SeriesReader::new(Arc::clone(&handle), ReaderOptions::default()).unwrap();
    let second = SeriesReader::new(Arc::clone(&handle), ReaderOptions::default()).unwrap();
    first.open("a.img").unwrap();
    assert_eq!(handle.active_sessions(), 2);
    assert_eq!(handle.sessions_created(), 2);

    drop(first);
    assert_eq!(count(&control.closes), 1);
    assert_eq!(handle.active_sessions(), 1);

    drop(second);
    assert_eq!(handle.active_sessions(), 0);
}

#[test]
fn test_open_replaces_previous_file() {
    let (mut reader, control) = open_mock(vec![MockSeries::gray8(4, 4)]);
    reader.select_series(0).unwrap();

    reader.open("other.img").unwrap();
    assert_eq!(count(&control.closes), 1);
    assert_eq!(count(&control.opens), 2);
    assert_eq!(reader.series(), None);
    assert_eq!(reader.path().and_then(|p| p.to_str()), Some("other.img"));
}

// =============================================================================
// Series Selection and Metadata Caching
// =============================================================================

#[test]
fn test_select_series_fetches_metadata_once() {
    let (mut reader, control) = open_mock(vec![MockSeries::gray8(8, 6), MockSeries::gray8(4, 4)]);

    reader.select_series(0).unwrap();
    assert_eq!(count(&control.pixel_type_calls), 1);
    let size_x_calls = count(&control.size_x_calls);

    reader.select_series(0).unwrap();
    for _ in 0..5 {
        assert_eq!(reader.size_x().unwrap(), 8);
        assert_eq!(reader.size_y().unwrap(), 6);
        assert_eq!(reader.pixel_type().unwrap(), PixelType::Uint8);
    }

    assert_eq!(count(&control.pixel_type_calls), 1);
    assert_eq!(count(&control.size_x_calls), size_x_calls);
    assert_eq!(reader.metadata_fetch_count(), 1);

    reader.select_series(1).unwrap();
    assert_eq!(count(&control.pixel_type_calls), 2);
    assert_eq!(reader.metadata_fetch_count(), 2);
    assert_eq!(reader.size_x().unwrap(), 4);
}

#[test]
fn test_select_series_out_of_range() {
    let (mut reader, _control) = open_mock(vec![MockSeries::gray8(8, 6), MockSeries::gray8(4, 4)]);
    reader.select_series(1).unwrap();

    assert!(matches!(
        reader.select_series(2),
        Err(ReaderError::SeriesOutOfRange { series: 2, count: 2 })
    ));
    assert_eq!(reader.series(), Some(1));
}

#[test]
fn test_failed_selection_keeps_previous_series() {
    let (mut reader, control) = open_mock(vec![MockSeries::gray8(8, 6), MockSeries::gray8(4, 4)]);
    reader.select_series(0).unwrap();
    control.failing_series.store(1, Ordering::SeqCst);

    assert!(matches!(
        reader.select_series(1),
        Err(ReaderError::Engine(EngineError::Failed(_)))
    ));
    assert_eq!(reader.series(), Some(0));
    assert_eq!(reader.size_x().unwrap(), 8);
    assert_eq!(reader.metadata_fetch_count(), 1);

    // The engine was switched back, so reads still come from series 0
    let plane = reader.read_plane(0).unwrap();
    assert_eq!(plane.data.len(), 48);
}

#[test]
fn test_non_finite_physical_size_is_absent() {
    let mut series = MockSeries::gray8(4, 4);
    series.physical_size_x = Some(f64::NAN);
    let (mut reader, _control) = open_mock(vec![series]);
    reader.select_series(0).unwrap();

    let (x, y, z) = reader.physical_size().unwrap();
    assert_eq!((x, y, z), (None, None, None));
    assert_eq!(reader.physical_size_t().unwrap(), None);
}

#[test]
fn test_plane_byte_size_matches_read() {
    let series = MockSeries::gray8(10, 20).with_pixels(PixelType::Uint16, 3);
    let (mut reader, _control) = open_mock(vec![series]);
    reader.select_series(0).unwrap();

    assert_eq!(reader.plane_byte_size().unwrap(), 1200);
    assert_eq!(reader.rgb_channel_count().unwrap(), 3);

    let plane = reader.read_plane(0).unwrap();
    assert_eq!(plane.data.len(), 1200);
    assert_eq!(plane.samples_per_pixel, 3);
    assert_eq!(plane.bytes_per_pixel(), 6);
}

#[test]
fn test_channel_colors() {
    let mut series = MockSeries::gray8(4, 4).with_zct(1, 2, 1);
    series.colors = vec![Some([255, 0, 0, 255]), None];
    let (mut reader, _control) = open_mock(vec![series]);
    reader.select_series(0).unwrap();

    assert_eq!(
        reader.channel_color(0).unwrap(),
        Some(ChannelColor::new(255, 0, 0, 255))
    );
    assert_eq!(reader.channel_color(1).unwrap(), None);
    assert!(matches!(
        reader.channel_color(2),
        Err(ReaderError::ChannelOutOfRange { channel: 2, count: 2 })
    ));
    assert!(reader.color_model().unwrap().has_colors());
}

// =============================================================================
// Plane Index Algebra
// =============================================================================

#[test]
fn test_plane_index_round_trip() {
    let mut series = MockSeries::gray8(4, 4).with_zct(3, 2, 4);
    series.order = DimensionOrder::XYCZT;
    let (mut reader, _control) = open_mock(vec![series]);
    reader.select_series(0).unwrap();
    assert_eq!(reader.image_count().unwrap(), 24);

    for index in 0..24 {
        let coord = reader.coordinates(index).unwrap();
        assert_eq!(reader.plane_index(coord).unwrap(), index);
    }

    // XYCZT: C varies fastest
    assert_eq!(reader.plane_index(PlaneCoordinate::new(0, 1, 0)).unwrap(), 1);
    assert_eq!(reader.plane_index(PlaneCoordinate::new(1, 0, 0)).unwrap(), 2);
}

#[test]
fn test_plane_index_rejects_out_of_range() {
    let (mut reader, _control) = open_mock(vec![MockSeries::gray8(4, 4).with_zct(2, 1, 3)]);
    reader.select_series(0).unwrap();

    assert!(matches!(
        reader.plane_index(PlaneCoordinate::new(2, 0, 0)),
        Err(ReaderError::CoordinateOutOfRange { z: 2, size_z: 2, .. })
    ));
    assert!(matches!(
        reader.coordinates(6),
        Err(ReaderError::PlaneIndexOutOfRange { index: 6, count: 6 })
    ));
    assert!(matches!(
        reader.read_plane(6),
        Err(ReaderError::PlaneIndexOutOfRange { index: 6, count: 6 })
    ));
}

// =============================================================================
// Plane Reads and Normalization
// =============================================================================

#[test]
fn test_read_plane_at_coordinate() {
    let (mut reader, _control) = open_mock(vec![MockSeries::gray8(4, 4).with_zct(1, 1, 3)]);
    reader.select_series(0).unwrap();

    let plane = reader.read_plane_at(PlaneCoordinate::new(0, 0, 2)).unwrap();
    assert_eq!(plane.plane_index, 2);
    assert_eq!((plane.width, plane.height), (4, 4));
    assert_eq!(plane.data[0], sample_value(0, 2, 0, 0, 0) as u8);
}

#[test]
fn test_big_endian_samples_are_normalized() {
    let series = MockSeries::gray8(3, 2)
        .with_pixels(PixelType::Uint16, 1)
        .with_layout(false, true);
    let (mut reader, _control) = open_mock(vec![series]);
    reader.select_series(0).unwrap();

    let plane = reader.read_plane(0).unwrap();
    assert_eq!(plane.data.len(), 12);
    assert_eq!(&plane.data[2..4], &(sample_value(0, 0, 1, 0, 0) as u16).to_le_bytes());
    assert_eq!(&plane.data[10..12], &(sample_value(0, 0, 2, 1, 0) as u16).to_le_bytes());
}

#[test]
fn test_planar_samples_are_interleaved() {
    let series = MockSeries::gray8(2, 2)
        .with_pixels(PixelType::Uint8, 3)
        .with_layout(true, false);
    let (mut reader, _control) = open_mock(vec![series]);
    reader.select_series(0).unwrap();

    let plane = reader.read_plane(0).unwrap();
    let pixel: Vec<u8> = (0..3).map(|s| sample_value(0, 0, 1, 0, s) as u8).collect();
    assert_eq!(&plane.data[3..6], pixel.as_slice());
}

#[test]
fn test_missing_plane_data_is_an_error() {
    let (mut reader, control) = open_mock(vec![MockSeries::gray8(4, 4)]);
    reader.select_series(0).unwrap();

    control.return_none.store(true, Ordering::SeqCst);
    assert!(matches!(
        reader.read_plane(0),
        Err(ReaderError::PlaneReadFailed { index: 0, .. })
    ));

    control.return_none.store(false, Ordering::SeqCst);
    control.truncate_reads.store(true, Ordering::SeqCst);
    match reader.read_plane(0) {
        Err(ReaderError::PlaneReadFailed { reason, .. }) => assert!(reason.contains("expected 16")),
        other => panic!("unexpected result: {other:?}"),
    }

    // The reader stays usable
    control.truncate_reads.store(false, Ordering::SeqCst);
    assert_eq!(reader.read_plane(0).unwrap().data.len(), 16);
    assert_eq!(reader.size_x().unwrap(), 4);
}

#[test]
fn test_plane_cache_serves_repeat_reads() {
    let (mut reader, control) = open_mock(vec![MockSeries::gray8(16, 16)]);
    reader.select_series(0).unwrap();

    let first = reader.read_plane(0).unwrap();
    let second = reader.read_plane(0).unwrap();
    assert_eq!(first.data, second.data);
    assert_eq!(count(&control.plane_reads), 1);
    assert_eq!(reader.plane_cache().hits(), 1);
}

#[test]
fn test_disabled_plane_cache() {
    let options = ReaderOptions::default().with_plane_cache_bytes(0);
    let (mut reader, control) = open_mock_with(vec![MockSeries::gray8(16, 16)], options);
    reader.select_series(0).unwrap();

    reader.read_plane(0).unwrap();
    reader.read_plane(0).unwrap();
    assert_eq!(count(&control.plane_reads), 2);
    assert!(reader.plane_cache().is_empty());
}

// =============================================================================
// Byte Ceiling and Resolution Fallback
// =============================================================================

#[test]
fn test_oversize_plane_falls_back_to_coarsest_level() {
    let series = MockSeries::gray8(100_000, 100_000).with_levels(vec![(100_000, 100_000), (1000, 1000)]);
    let (mut reader, _control) = open_mock(vec![series]);
    reader.select_series(0).unwrap();

    assert_eq!(reader.plane_byte_size().unwrap(), 10_000_000_000);

    let plane = reader.read_plane(0).unwrap();
    assert_eq!(plane.resolution, 1);
    assert_eq!((plane.width, plane.height), (1000, 1000));
    assert_eq!(plane.data.len(), 1_000_000);
    assert_eq!(reader.resolution(), 0);
}

#[test]
fn test_custom_ceiling_fallback() {
    let series = MockSeries::gray8(200, 200).with_levels(vec![(200, 200), (50, 50)]);
    let options = ReaderOptions::default().with_max_plane_bytes(10_000);
    let (mut reader, _control) = open_mock_with(vec![series], options);
    reader.select_series(0).unwrap();

    let plane = reader.read_plane(0).unwrap();
    assert_eq!(plane.resolution, 1);
    assert_eq!(plane.data[0], sample_value(1, 0, 0, 0, 0) as u8);
}

#[test]
fn test_plane_too_large_at_every_level() {
    let series = MockSeries::gray8(200, 200).with_levels(vec![(200, 200), (150, 150)]);
    let options = ReaderOptions::default().with_max_plane_bytes(10_000);
    let (mut reader, control) = open_mock_with(vec![series], options);
    reader.select_series(0).unwrap();

    assert!(matches!(
        reader.read_plane(0),
        Err(ReaderError::PlaneTooLarge {
            bytes: 22_500,
            ceiling: 10_000
        })
    ));
    assert_eq!(count(&control.plane_reads), 0);
}

#[test]
fn test_set_resolution() {
    let (mut reader, _control) = open_mock(vec![pyramid_series()]);
    reader.select_series(0).unwrap();

    reader.set_resolution(1).unwrap();
    assert_eq!(reader.resolution(), 1);
    let plane = reader.read_plane(0).unwrap();
    assert_eq!((plane.width, plane.height), (250, 200));
    assert_eq!(plane.resolution, 1);

    assert!(matches!(
        reader.set_resolution(3),
        Err(ReaderError::LevelOutOfRange { level: 3, count: 3 })
    ));
    assert_eq!(reader.resolution(), 1);
}

// =============================================================================
// Tiles and Regions
// =============================================================================

#[test]
fn test_tile_bounds_are_inclusive_of_edge() {
    let (mut reader, _control) = open_mock(vec![MockSeries::gray8(100, 80)]);
    reader.select_series(0).unwrap();
    let origin = PlaneCoordinate::default();

    let full = reader.read_tile(0, 0, 0, 100, 80, origin).unwrap();
    assert_eq!(full.data.len(), 8000);
    assert_eq!(full.residual, 1.0);

    assert!(matches!(
        reader.read_tile(0, 1, 0, 100, 80, origin),
        Err(ReaderError::RegionOutOfBounds {
            x: 1,
            width: 100,
            level_width: 100,
            ..
        })
    ));
    assert!(matches!(
        reader.read_tile(0, 0, 0, 0, 10, origin),
        Err(ReaderError::EmptyRegion { width: 0, height: 10 })
    ));
    assert!(matches!(
        reader.read_tile(1, 0, 0, 10, 10, origin),
        Err(ReaderError::LevelOutOfRange { level: 1, count: 1 })
    ));
}

#[test]
fn test_tile_contents() {
    let (mut reader, _control) = open_mock(vec![pyramid_series()]);
    reader.select_series(0).unwrap();

    let tile = reader
        .read_tile(1, 10, 20, 4, 2, PlaneCoordinate::default())
        .unwrap();
    assert_eq!((tile.width, tile.height, tile.level), (4, 2, 1));
    assert_eq!(tile.level_downsample, 4.0);
    assert_eq!(tile.data[0], sample_value(1, 0, 10, 20, 0) as u8);
    assert_eq!(tile.data[5], sample_value(1, 0, 11, 21, 0) as u8);
    assert_eq!(reader.resolution(), 0);
}

#[test]
fn test_grid_tiles_clip_at_edges() {
    let (mut reader, _control) = open_mock(vec![MockSeries::gray8(300, 200)]);
    reader.select_series(0).unwrap();
    let origin = PlaneCoordinate::default();

    let edge = reader.read_grid_tile(0, 1, 0, origin).unwrap();
    assert_eq!((edge.width, edge.height), (44, 200));
    assert_eq!(edge.data[0], sample_value(0, 0, 256, 0, 0) as u8);

    assert!(matches!(
        reader.read_grid_tile(0, 2, 0, origin),
        Err(ReaderError::RegionOutOfBounds { .. })
    ));
}

#[test]
fn test_grid_tile_with_single_pixel_tiles() {
    let mut series = MockSeries::gray8(100_000, 100_000);
    series.tile = (1, 1);
    let (mut reader, _control) = open_mock(vec![series]);
    reader.select_series(0).unwrap();
    let origin = PlaneCoordinate::default();

    let tile = reader.read_grid_tile(0, 5, 99_999, origin).unwrap();
    assert_eq!((tile.width, tile.height), (1, 1));
    assert_eq!(tile.data[0], sample_value(0, 0, 5, 99_999, 0) as u8);

    assert!(matches!(
        reader.read_grid_tile(0, 100_000, 0, origin),
        Err(ReaderError::RegionOutOfBounds { .. })
    ));
}

#[test]
fn test_region_just_below_level_factor_stays_finer() {
    let (mut reader, _control) = open_mock(vec![pyramid_series()]);
    reader.select_series(0).unwrap();

    let region = reader
        .read_region(RegionRequest::at_downsample(3.98, 0, 0, 100, 100))
        .unwrap();

    assert_eq!(region.level, 0);
    assert_eq!(region.level_downsample, 1.0);
    assert_eq!(region.residual, 3.98);
    assert_eq!((region.width, region.height), (100, 100));
}

#[test]
fn test_region_at_downsample_picks_level_and_residual() {
    let (mut reader, _control) = open_mock(vec![pyramid_series()]);
    reader.select_series(0).unwrap();

    let region = reader
        .read_region(RegionRequest::at_downsample(10.0, 400, 400, 200, 40))
        .unwrap();

    assert_eq!(region.level, 1);
    assert_eq!(region.level_downsample, 4.0);
    assert!((region.residual - 2.5).abs() < 1e-9);
    assert_eq!((region.width, region.height), (50, 10));
    assert_eq!(region.output_size(), (20, 4));
    assert_eq!(region.data[0], sample_value(1, 0, 100, 100, 0) as u8);
    assert_eq!(reader.resolution(), 0);
}

#[test]
fn test_region_finer_than_base_uses_level_zero() {
    let (mut reader, _control) = open_mock(vec![pyramid_series()]);
    reader.select_series(0).unwrap();

    let region = reader
        .read_region(RegionRequest::at_downsample(0.5, 0, 0, 10, 10))
        .unwrap();
    assert_eq!(region.level, 0);
    assert_eq!(region.residual, 0.5);
    assert_eq!(region.output_size(), (10, 10));
}

#[test]
fn test_region_rejects_bad_requests() {
    let (mut reader, _control) = open_mock(vec![pyramid_series()]);
    reader.select_series(0).unwrap();

    assert!(matches!(
        reader.read_region(RegionRequest::at_downsample(f64::NAN, 0, 0, 10, 10)),
        Err(ReaderError::InvalidDownsample(_))
    ));
    assert!(matches!(
        reader.read_region(RegionRequest::at_downsample(2.0, 0, 0, 0, 10)),
        Err(ReaderError::EmptyRegion { .. })
    ));
    assert!(matches!(
        reader.read_region(RegionRequest::at_downsample(2.0, 900, 0, 101, 10)),
        Err(ReaderError::RegionOutOfBounds { level: 0, .. })
    ));
}

#[test]
fn test_region_at_level_matches_tile() {
    let (mut reader, _control) = open_mock(vec![pyramid_series().with_zct(2, 1, 1)]);
    reader.select_series(0).unwrap();
    let plane = PlaneCoordinate::new(1, 0, 0);

    let region = reader
        .read_region(RegionRequest::at_level(2, 0, 0, 62, 50).with_plane(plane))
        .unwrap();
    let tile = reader.read_tile(2, 0, 0, 62, 50, plane).unwrap();
    assert_eq!(region.data, tile.data);
    assert_eq!(region.data[0], sample_value(2, 1, 0, 0, 0) as u8);
}

#[test]
fn test_default_thumbnail() {
    let (mut reader, _control) = open_mock(vec![pyramid_series()]);
    reader.select_series(0).unwrap();
    let origin = PlaneCoordinate::default();

    let fits = reader.default_thumbnail(origin, 256).unwrap();
    assert_eq!(fits.level, 1);
    assert_eq!(fits.residual, 1.0);
    assert_eq!(fits.output_size(), (250, 200));

    let shrunk = reader.default_thumbnail(origin, 31).unwrap();
    assert_eq!(shrunk.level, 2);
    assert_eq!(shrunk.residual, 2.0);
    assert_eq!(shrunk.output_size(), (31, 25));
}

// =============================================================================
// Lookup Tables and Auxiliary Data
// =============================================================================

#[test]
fn test_absent_lookup_table() {
    let (mut reader, _control) = open_mock(vec![MockSeries::gray8(4, 4)]);
    reader.select_series(0).unwrap();
    assert!(reader.lookup_table_8bit().unwrap().is_none());
    assert!(reader.lookup_table_16bit().unwrap().is_none());
}

#[test]
fn test_empty_lookup_table_is_distinct_from_absent() {
    let mut series = MockSeries::gray8(4, 4);
    series.lut8 = Some(vec![Vec::new(), Vec::new(), Vec::new()]);
    let (mut reader, _control) = open_mock(vec![series]);
    reader.select_series(0).unwrap();

    let table = reader.lookup_table_8bit().unwrap().unwrap();
    assert!(table.is_empty());
}

#[test]
fn test_lookup_table_entries() {
    let mut series = MockSeries::gray8(4, 4);
    series.lut16 = Some(vec![vec![0, 65535], vec![10, 20], vec![30, 40]]);
    let (mut reader, _control) = open_mock(vec![series]);
    reader.select_series(0).unwrap();

    let table = reader.lookup_table_16bit().unwrap().unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.get(1), Some([65535, 20, 40]));
}

#[test]
fn test_malformed_lookup_table() {
    let mut series = MockSeries::gray8(4, 4);
    series.lut8 = Some(vec![vec![1, 2], vec![1]]);
    let (mut reader, _control) = open_mock(vec![series]);
    reader.select_series(0).unwrap();

    assert!(matches!(
        reader.lookup_table_8bit(),
        Err(ReaderError::MalformedLookupTable(_))
    ));
}

#[test]
fn test_no_lookup_table_for_rgb() {
    let mut series = MockSeries::gray8(4, 4).with_pixels(PixelType::Uint8, 3);
    series.lut8 = Some(vec![vec![1], vec![2], vec![3]]);
    let (mut reader, _control) = open_mock(vec![series]);
    reader.select_series(0).unwrap();

    assert!(reader.lookup_table_8bit().unwrap().is_none());
}

#[test]
fn test_associated_images_and_document() {
    let (mut reader, _control) = open_mock(vec![MockSeries::gray8(4, 4)]);
    reader.select_series(0).unwrap();

    assert_eq!(reader.associated_image_names().unwrap(), vec!["label".to_string()]);
    let label = reader.associated_image("label").unwrap().unwrap();
    assert_eq!(label.data.len(), label.expected_len());
    assert!(reader.associated_image("macro").unwrap().is_none());
    assert_eq!(reader.metadata_document().unwrap().as_deref(), Some("<mock/>"));
}

// =============================================================================
// Corrupted Handle Recovery
// =============================================================================

#[test]
fn test_corrupted_handle_requires_reopen() {
    let (mut reader, control) = open_mock(vec![MockSeries::gray8(4, 4), MockSeries::gray8(2, 2)]);
    reader.select_series(1).unwrap();

    control.corrupt_next_read.store(true, Ordering::SeqCst);
    let err = reader.read_plane(0).unwrap_err();
    assert!(err.requires_reopen());
    assert!(reader.needs_reopen());

    let reads = count(&control.plane_reads);
    assert!(matches!(
        reader.read_plane(0),
        Err(ReaderError::EngineHandleCorrupted(_))
    ));
    assert_eq!(count(&control.plane_reads), reads);

    // Cached metadata stays readable
    assert_eq!(reader.size_x().unwrap(), 2);

    reader.reopen().unwrap();
    assert_eq!(count(&control.reopens), 1);
    assert!(!reader.needs_reopen());
    assert_eq!(reader.series(), Some(1));

    let plane = reader.read_plane(0).unwrap();
    assert_eq!(plane.data.len(), 4);
}

#[test]
fn test_reopen_requires_open_file() {
    let control = MockControl::new();
    let handle = EngineHandle::new(MockProvider::new(vec![MockSeries::gray8(4, 4)], control));
    let mut reader = SeriesReader::new(handle, ReaderOptions::default()).unwrap();
    assert!(matches!(reader.reopen(), Err(ReaderError::NotOpen)));
}
