//! Reading companion-metadata datasets through `SeriesReader`.

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use image_series_reader::engine::{CompanionProvider, EngineHandle};
use image_series_reader::error::ReaderError;
use image_series_reader::format::{ChannelColor, PixelType};
use image_series_reader::render::{OutputFormat, RegionEncoder};
use image_series_reader::series::{PlaneCoordinate, SeriesReader};
use image_series_reader::ReaderOptions;

use super::test_utils::{write_gray8_tiff, write_rgb8_tiff};

/// Series 0: 4x2 RGB, one plane. Series 1: 3x3 gray with two channels.
fn dataset() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let doc = r#"<?xml version="1.0" encoding="UTF-8"?>
<OME xmlns="http://www.openmicroscopy.org/Schemas/OME/2016-06">
  <Image ID="Image:0" Name="brightfield">
    <Pixels ID="Pixels:0" DimensionOrder="XYCZT" Type="uint8"
            SizeX="4" SizeY="2" SizeZ="1" SizeC="3" SizeT="1"
            PhysicalSizeX="250" PhysicalSizeXUnit="nm"
            PhysicalSizeY="250" PhysicalSizeYUnit="nm">
      <Channel ID="Channel:0:0" SamplesPerPixel="3"/>
      <Plane TheZ="0" TheC="0" TheT="0"/>
    </Pixels>
  </Image>
  <Image ID="Image:1" Name="fluorescence">
    <Pixels ID="Pixels:1" DimensionOrder="XYCZT" Type="uint8"
            SizeX="3" SizeY="3" SizeZ="1" SizeC="2" SizeT="1">
      <Channel ID="Channel:1:0" Color="16711935"/>
      <Channel ID="Channel:1:1" Color="-16776961"/>
      <Plane TheZ="0" TheC="0" TheT="0"/>
      <Plane TheZ="0" TheC="1" TheT="0"/>
    </Pixels>
  </Image>
</OME>
"#;
    let path = dir.path().join("stack.companion.ome");
    fs::write(&path, doc).unwrap();

    write_rgb8_tiff(&dir.path().join("stack_S0Z0C0T0.tiff"), 4, 2, [10, 20, 30]);
    write_gray8_tiff(&dir.path().join("stack_S1Z0C0T0.tif"), 3, 3, 0);
    write_gray8_tiff(&dir.path().join("stack_S1Z0C1T0.tif"), 3, 3, 50);

    (dir, path)
}

fn reader() -> SeriesReader<CompanionProvider> {
    let handle = EngineHandle::new(CompanionProvider::new());
    SeriesReader::new(handle, ReaderOptions::default()).unwrap()
}

#[test]
fn test_rgb_series_metadata() {
    let (_dir, path) = dataset();
    let mut reader = reader();
    reader.open(&path).unwrap();
    assert_eq!(reader.series_count().unwrap(), 2);

    reader.select_series(0).unwrap();
    assert_eq!(reader.size_c().unwrap(), 1);
    assert_eq!(reader.rgb_channel_count().unwrap(), 3);
    assert_eq!(reader.image_count().unwrap(), 1);
    assert_eq!(reader.plane_byte_size().unwrap(), 24);
    assert_eq!(reader.pixel_type().unwrap(), PixelType::Uint8);

    let (x, y, z) = reader.physical_size().unwrap();
    assert!((x.unwrap() - 2.5e-4).abs() < 1e-12);
    assert!((y.unwrap() - 2.5e-4).abs() < 1e-12);
    assert_eq!(z, None);
}

#[test]
fn test_rgb_plane_is_interleaved() {
    let (_dir, path) = dataset();
    let mut reader = reader();
    reader.open(&path).unwrap();
    reader.select_series(0).unwrap();

    let plane = reader.read_plane(0).unwrap();
    assert_eq!(plane.data.len(), 24);
    assert!(plane.data.chunks(3).all(|px| px == [10, 20, 30]));
    assert!(reader.lookup_table_8bit().unwrap().is_none());

    let png = RegionEncoder::new(OutputFormat::Png).encode_plane(&plane).unwrap();
    let decoded = image::load_from_memory(&png).unwrap().to_rgb8();
    assert_eq!(decoded.dimensions(), (4, 2));
    assert_eq!(decoded.get_pixel(3, 1).0, [10, 20, 30]);
}

#[test]
fn test_multichannel_series() {
    let (_dir, path) = dataset();
    let mut reader = reader();
    reader.open(&path).unwrap();
    reader.select_series(1).unwrap();

    assert_eq!(reader.size_c().unwrap(), 2);
    assert_eq!(reader.rgb_channel_count().unwrap(), 1);
    assert_eq!(
        reader.channel_color(0).unwrap(),
        Some(ChannelColor::new(0, 255, 0, 255))
    );
    assert_eq!(
        reader.channel_color(1).unwrap(),
        Some(ChannelColor::new(255, 0, 0, 255))
    );

    let second = reader.read_plane_at(PlaneCoordinate::new(0, 1, 0)).unwrap();
    assert_eq!(second.plane_index, 1);
    assert_eq!(second.data[0], 50);
    assert_eq!(reader.coordinates(1).unwrap(), PlaneCoordinate::new(0, 1, 0));
}

#[test]
fn test_tile_and_thumbnail() {
    let (_dir, path) = dataset();
    let mut reader = reader();
    reader.open(&path).unwrap();
    reader.select_series(1).unwrap();
    let origin = PlaneCoordinate::default();

    let tile = reader.read_tile(0, 1, 1, 2, 2, origin).unwrap();
    assert_eq!(&tile.data[..], &[4, 5, 7, 8]);

    let thumb = reader.default_thumbnail(origin, 2).unwrap();
    assert_eq!(thumb.level, 0);
    assert_eq!(thumb.residual, 1.5);
    assert_eq!(thumb.output_size(), (2, 2));
}

#[test]
fn test_metadata_serializes() {
    let (_dir, path) = dataset();
    let mut reader = reader();
    reader.open(&path).unwrap();
    reader.select_series(1).unwrap();

    let json = serde_json::to_value(reader.metadata().unwrap()).unwrap();
    assert_eq!(json["size_x"], 3);
    assert_eq!(json["pixel_type"], "uint8");
    assert_eq!(json["pyramid"]["levels"][0]["width"], 3);
    assert!(json.get("byte_order").is_none());

    let document = reader.metadata_document().unwrap().unwrap();
    assert!(document.contains("fluorescence"));
}

#[test]
fn test_missing_plane_file_is_read_error() {
    let (dir, path) = dataset();
    fs::remove_file(dir.path().join("stack_S1Z0C1T0.tif")).unwrap();

    let mut reader = reader();
    reader.open(&path).unwrap();
    reader.select_series(1).unwrap();

    assert!(matches!(reader.read_plane(1), Err(ReaderError::Engine(_))));
    assert!(!reader.needs_reopen());
    assert_eq!(reader.read_plane(0).unwrap().data.len(), 9);
}

#[test]
fn test_open_missing_dataset() {
    let dir = TempDir::new().unwrap();
    let mut reader = reader();
    let missing = dir.path().join("absent.companion.ome");

    assert!(matches!(
        reader.open(&missing),
        Err(ReaderError::OpenFailed { path, .. }) if path == missing
    ));
}
