//! Companion-metadata decode engine.
//!
//! A dataset is a directory holding one OME-XML metadata document plus one
//! TIFF file per plane:
//!
//! ```text
//! dataset/
//! ├── sample.companion.ome          OME/Image/Pixels, Channel, TiffData, Plane
//! ├── sample_S0Z0C0T0.tiff
//! ├── sample_S0Z1C0T0.tiff
//! ├── sample_S1Z0C0T0.tiff
//! └── label.tiff                    (optional associated image)
//! ```
//!
//! The document is the one Bio-Formats writes next to converted planes:
//!
//! ```xml
//! <OME xmlns="http://www.openmicroscopy.org/Schemas/OME/2016-06">
//!   <Image ID="Image:0" Name="sample">
//!     <Pixels ID="Pixels:0" DimensionOrder="XYZCT" Type="uint16"
//!             SizeX="512" SizeY="512" SizeZ="2" SizeC="1" SizeT="1"
//!             PhysicalSizeX="0.5" PhysicalSizeXUnit="µm">
//!       <Channel ID="Channel:0:0" Color="-16776961"/>
//!       <TiffData FirstZ="1" IFD="0"><UUID FileName="z1.tiff"/></TiffData>
//!       <Plane TheZ="0" TheC="0" TheT="0"/>
//!       <Plane TheZ="1" TheC="0" TheT="0"/>
//!     </Pixels>
//!     <AnnotationRef ID="Annotation:0"/>
//!   </Image>
//!   <StructuredAnnotations>
//!     <MapAnnotation ID="Annotation:0" Namespace="image-series-reader/associated-images">
//!       <Value><M K="label">label.tiff</M></Value>
//!     </MapAnnotation>
//!   </StructuredAnnotations>
//! </OME>
//! ```
//!
//! Plane indices follow the order of `Plane` elements. A plane is read from
//! the file a `TiffData` block names for its (Z, C, T), otherwise from the
//! `<prefix>_S<series>Z<z>C<c>T<t>.tif[f]` file next to the document.
//! Associated images are listed in a `MapAnnotation` with the
//! [`ASSOCIATED_IMAGES_NAMESPACE`] namespace referenced by the image.
//! Datasets have a single resolution level and no palettes.

use std::fs::{self, File};
use std::io::BufReader;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use lru::LruCache;
use serde::Deserialize;
use tiff::decoder::{Decoder, DecodingResult};
use tracing::{debug, warn};

use super::{DecodeEngine, EngineProvider};
use crate::error::EngineError;
use crate::format::{AssociatedPixelType, ChannelColor, PixelType};
use crate::series::AssociatedImage;

/// Rows per preferred tile; datasets are untiled, so tiles are full-width strips.
const STRIP_HEIGHT: u32 = 512;

/// Decoded planes kept for repeated tile reads.
const DECODED_PLANE_SLOTS: NonZeroUsize = match NonZeroUsize::new(2) {
    Some(n) => n,
    None => unreachable!(),
};

/// `MapAnnotation` namespace whose entries map associated image names to files.
pub const ASSOCIATED_IMAGES_NAMESPACE: &str = "image-series-reader/associated-images";

// =============================================================================
// Document Model
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
struct OmeDocument {
    #[serde(rename = "Image", default)]
    images: Vec<ImageEntry>,
    #[serde(rename = "StructuredAnnotations", default)]
    annotations: Option<StructuredAnnotations>,
}

#[derive(Debug, Clone, Deserialize)]
struct ImageEntry {
    #[serde(rename = "@Name", default)]
    name: Option<String>,
    #[serde(rename = "Pixels")]
    pixels: PixelsEntry,
    #[serde(rename = "AnnotationRef", default)]
    annotation_refs: Vec<AnnotationRef>,
}

#[derive(Debug, Clone, Deserialize)]
struct PixelsEntry {
    #[serde(rename = "@SizeX")]
    size_x: u32,
    #[serde(rename = "@SizeY")]
    size_y: u32,
    #[serde(rename = "@SizeZ")]
    size_z: u32,
    #[serde(rename = "@SizeC")]
    size_c: u32,
    #[serde(rename = "@SizeT")]
    size_t: u32,
    #[serde(rename = "@Type")]
    pixel_type: String,
    #[serde(rename = "@PhysicalSizeX", default)]
    physical_size_x: Option<f64>,
    #[serde(rename = "@PhysicalSizeXUnit", default)]
    physical_size_x_unit: Option<String>,
    #[serde(rename = "@PhysicalSizeY", default)]
    physical_size_y: Option<f64>,
    #[serde(rename = "@PhysicalSizeYUnit", default)]
    physical_size_y_unit: Option<String>,
    #[serde(rename = "@PhysicalSizeZ", default)]
    physical_size_z: Option<f64>,
    #[serde(rename = "@PhysicalSizeZUnit", default)]
    physical_size_z_unit: Option<String>,
    #[serde(rename = "@TimeIncrement", default)]
    time_increment: Option<f64>,
    #[serde(rename = "@TimeIncrementUnit", default)]
    time_increment_unit: Option<String>,
    #[serde(rename = "Channel", default)]
    channels: Vec<ChannelEntry>,
    #[serde(rename = "TiffData", default)]
    tiff_data: Vec<TiffDataEntry>,
    #[serde(rename = "Plane", default)]
    planes: Vec<PlaneEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChannelEntry {
    #[serde(rename = "@Color", default)]
    color: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
struct TiffDataEntry {
    #[serde(rename = "@FirstZ", default)]
    first_z: u32,
    #[serde(rename = "@FirstC", default)]
    first_c: u32,
    #[serde(rename = "@FirstT", default)]
    first_t: u32,
    #[serde(rename = "@IFD", default)]
    ifd: usize,
    #[serde(rename = "UUID", default)]
    uuid: Option<UuidEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct UuidEntry {
    #[serde(rename = "@FileName", default)]
    file_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct PlaneEntry {
    #[serde(rename = "@TheZ")]
    the_z: u32,
    #[serde(rename = "@TheC")]
    the_c: u32,
    #[serde(rename = "@TheT")]
    the_t: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct AnnotationRef {
    #[serde(rename = "@ID")]
    id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct StructuredAnnotations {
    #[serde(rename = "MapAnnotation", default)]
    maps: Vec<MapAnnotation>,
}

#[derive(Debug, Clone, Deserialize)]
struct MapAnnotation {
    #[serde(rename = "@ID")]
    id: String,
    #[serde(rename = "@Namespace", default)]
    namespace: Option<String>,
    #[serde(rename = "Value", default)]
    value: Option<MapValue>,
}

#[derive(Debug, Clone, Deserialize)]
struct MapValue {
    #[serde(rename = "M", default)]
    entries: Vec<MapEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct MapEntry {
    #[serde(rename = "@K")]
    key: String,
    #[serde(rename = "$text", default)]
    value: String,
}

impl OmeDocument {
    /// `(name, file)` pairs of the associated images an image references.
    fn associated_images<'a>(
        &'a self,
        image: &'a ImageEntry,
    ) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.annotations
            .iter()
            .flat_map(|a| a.maps.iter())
            .filter(|m| m.namespace.as_deref() == Some(ASSOCIATED_IMAGES_NAMESPACE))
            .filter(move |m| image.annotation_refs.iter().any(|r| r.id == m.id))
            .filter_map(|m| m.value.as_ref())
            .flat_map(|v| v.entries.iter())
            .map(|e| (e.key.as_str(), e.value.trim()))
    }
}

impl PixelsEntry {
    /// Planes / (Z * T); the number of independently stored channels.
    fn effective_size_c(&self) -> u32 {
        let zt = self.size_z as u64 * self.size_t as u64;
        if zt == 0 {
            return 0;
        }
        (self.planes.len() as u64 / zt) as u32
    }

    fn rgb_channel_count(&self) -> u32 {
        match self.effective_size_c() {
            0 => 0,
            effective => self.size_c / effective,
        }
    }

    /// File and IFD a `TiffData` block assigns to a plane.
    fn tiff_data_for(&self, plane: &PlaneEntry) -> Option<(&str, usize)> {
        let data = self.tiff_data.iter().find(|d| {
            d.first_z == plane.the_z && d.first_c == plane.the_c && d.first_t == plane.the_t
        })?;
        let file = data.uuid.as_ref()?.file_name.as_deref()?;
        Some((file, data.ifd))
    }
}

// =============================================================================
// Unit Conversion
// =============================================================================

/// OME default unit for physical pixel sizes.
const DEFAULT_LENGTH_UNIT: &str = "µm";

/// OME default unit for time increments.
const DEFAULT_TIME_UNIT: &str = "s";

/// Factor converting a length unit to millimetres.
///
/// Unknown units log a warning and convert with factor 1.
pub fn length_unit_to_mm(unit: &str) -> f64 {
    match unit {
        "nm" => 1e-6,
        "um" | "µm" => 1e-3,
        "mm" => 1.0,
        "cm" => 1e1,
        "dm" => 1e2,
        "m" => 1e3,
        other => {
            warn!(unit = other, "Unknown length unit, using factor 1");
            1.0
        }
    }
}

/// Factor converting a time unit to seconds.
///
/// Unknown units log a warning and convert with factor 1.
pub fn time_unit_to_seconds(unit: &str) -> f64 {
    match unit {
        "h" => 3600.0,
        "min" => 60.0,
        "s" => 1.0,
        "ms" => 1e-3,
        "us" | "µs" => 1e-6,
        "ns" => 1e-9,
        other => {
            warn!(unit = other, "Unknown time unit, using factor 1");
            1.0
        }
    }
}

fn physical_length(value: Option<f64>, unit: Option<&str>) -> Option<f64> {
    value.map(|v| v * length_unit_to_mm(unit.unwrap_or(DEFAULT_LENGTH_UNIT)))
}

// =============================================================================
// Plane File Naming
// =============================================================================

/// Parse `<prefix>_S<s>Z<z>C<c>T<t>.tif[f]` into `[s, z, c, t]`.
pub fn parse_plane_file_name(name: &str) -> Option<[u32; 4]> {
    let stem = name
        .strip_suffix(".tiff")
        .or_else(|| name.strip_suffix(".tif"))?;
    let start = stem.rfind("_S")?;
    let mut rest = &stem[start + 2..];

    let mut fields = [0u32; 4];
    for (i, marker) in [None, Some('Z'), Some('C'), Some('T')].into_iter().enumerate() {
        if let Some(marker) = marker {
            rest = rest.strip_prefix(marker)?;
        }
        let digits = rest.find(|ch: char| !ch.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            return None;
        }
        fields[i] = rest[..digits].parse().ok()?;
        rest = &rest[digits..];
    }

    rest.is_empty().then_some(fields)
}

// =============================================================================
// TIFF Decoding
// =============================================================================

/// A decoded TIFF image as little-endian interleaved bytes.
#[derive(Debug)]
struct DecodedImage {
    width: u32,
    height: u32,
    samples_per_pixel: u32,
    pixel_type: PixelType,
    data: Vec<u8>,
}

fn to_le_bytes<T: Copy, const N: usize>(samples: &[T], f: impl Fn(T) -> [u8; N]) -> Vec<u8> {
    samples.iter().flat_map(|&s| f(s)).collect()
}

fn decode_tiff(path: &Path, ifd: usize) -> Result<DecodedImage, EngineError> {
    let file = File::open(path)?;
    let mut decoder = Decoder::new(BufReader::new(file))
        .map_err(|e| EngineError::Malformed(format!("{}: {}", path.display(), e)))?;
    if ifd > 0 {
        decoder.seek_to_image(ifd).map_err(|e| {
            EngineError::Malformed(format!("{} IFD {}: {}", path.display(), ifd, e))
        })?;
    }

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| EngineError::Malformed(format!("{}: {}", path.display(), e)))?;
    let image = decoder
        .read_image()
        .map_err(|e| EngineError::Malformed(format!("{}: {}", path.display(), e)))?;

    let (pixel_type, data) = match image {
        DecodingResult::U8(v) => (PixelType::Uint8, v),
        DecodingResult::I8(v) => (PixelType::Int8, v.into_iter().map(|s| s as u8).collect()),
        DecodingResult::U16(v) => (PixelType::Uint16, to_le_bytes(&v, u16::to_le_bytes)),
        DecodingResult::I16(v) => (PixelType::Int16, to_le_bytes(&v, i16::to_le_bytes)),
        DecodingResult::U32(v) => (PixelType::Uint32, to_le_bytes(&v, u32::to_le_bytes)),
        DecodingResult::I32(v) => (PixelType::Int32, to_le_bytes(&v, i32::to_le_bytes)),
        DecodingResult::F32(v) => (PixelType::Float, to_le_bytes(&v, f32::to_le_bytes)),
        DecodingResult::F64(v) => (PixelType::Double, to_le_bytes(&v, f64::to_le_bytes)),
        _ => {
            return Err(EngineError::UnsupportedFormat {
                reason: format!("{}: unsupported TIFF sample format", path.display()),
            })
        }
    };

    let pixels = width as usize * height as usize;
    let sample_bytes = pixel_type.bytes_per_pixel();
    if pixels == 0 || data.len() % (pixels * sample_bytes) != 0 {
        return Err(EngineError::Malformed(format!(
            "{}: {} bytes do not tile a {}x{} image",
            path.display(),
            data.len(),
            width,
            height
        )));
    }

    Ok(DecodedImage {
        width,
        height,
        samples_per_pixel: (data.len() / (pixels * sample_bytes)) as u32,
        pixel_type,
        data,
    })
}

fn associated_pixel_type(pixel_type: PixelType) -> Option<AssociatedPixelType> {
    match pixel_type {
        PixelType::Uint8 => Some(AssociatedPixelType::Uint8),
        PixelType::Int8 => Some(AssociatedPixelType::Int8),
        PixelType::Uint16 => Some(AssociatedPixelType::Uint16),
        PixelType::Int16 => Some(AssociatedPixelType::Int16),
        PixelType::Uint32 => Some(AssociatedPixelType::Uint32),
        PixelType::Int32 => Some(AssociatedPixelType::Int32),
        PixelType::Float => Some(AssociatedPixelType::Float),
        PixelType::Double => Some(AssociatedPixelType::Double),
        PixelType::Bit => None,
    }
}

// =============================================================================
// CompanionEngine
// =============================================================================

/// State of an open dataset.
#[derive(Debug)]
struct Dataset {
    path: PathBuf,
    folder: PathBuf,
    text: String,
    document: OmeDocument,
    series: usize,
}

impl Dataset {
    fn load(path: &Path) -> Result<Self, EngineError> {
        let text = fs::read_to_string(path)?;
        let document: OmeDocument =
            quick_xml::de::from_str(&text).map_err(|e| EngineError::UnsupportedFormat {
                reason: format!("not an OME-XML document: {e}"),
            })?;
        if document.images.is_empty() {
            return Err(EngineError::UnsupportedFormat {
                reason: "OME-XML document declares no Image".to_string(),
            });
        }
        let folder = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            path: path.to_path_buf(),
            folder,
            text,
            document,
            series: 0,
        })
    }

    fn image(&self) -> Result<&ImageEntry, EngineError> {
        self.document
            .images
            .get(self.series)
            .ok_or_else(|| EngineError::Failed(format!("series {} missing", self.series)))
    }
}

/// Decode engine over an OME-XML companion document and per-plane TIFFs.
#[derive(Debug)]
pub struct CompanionEngine {
    dataset: Option<Dataset>,

    /// Recently decoded planes keyed by (series, plane index)
    decoded: LruCache<(usize, u32), Arc<DecodedImage>>,

    /// Number of TIFF plane decodes performed
    decode_count: u64,
}

impl Default for CompanionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CompanionEngine {
    /// Create an engine with no file open.
    pub fn new() -> Self {
        Self {
            dataset: None,
            decoded: LruCache::new(DECODED_PLANE_SLOTS),
            decode_count: 0,
        }
    }

    /// Number of plane files decoded since the engine was created.
    pub fn decode_count(&self) -> u64 {
        self.decode_count
    }

    /// Name of the active series, when the document declares one.
    pub fn series_name(&self) -> Result<Option<String>, EngineError> {
        Ok(self.dataset()?.image()?.name.clone())
    }

    fn dataset(&self) -> Result<&Dataset, EngineError> {
        self.dataset.as_ref().ok_or(EngineError::NotOpen)
    }

    fn pixels(&self) -> Result<&PixelsEntry, EngineError> {
        Ok(&self.dataset()?.image()?.pixels)
    }

    /// Locate the TIFF file (and IFD) holding a plane.
    fn plane_path(&self, index: u32) -> Result<(PathBuf, usize), EngineError> {
        let dataset = self.dataset()?;
        let pixels = &dataset.image()?.pixels;
        let plane = pixels
            .planes
            .get(index as usize)
            .ok_or_else(|| EngineError::Failed(format!("plane {index} not declared")))?;

        if let Some((file, ifd)) = pixels.tiff_data_for(plane) {
            return Ok((dataset.folder.join(file), ifd));
        }

        let wanted = [dataset.series as u32, plane.the_z, plane.the_c, plane.the_t];
        for entry in fs::read_dir(&dataset.folder)? {
            let entry = entry?;
            let name = entry.file_name();
            if name.to_str().and_then(parse_plane_file_name) == Some(wanted) {
                return Ok((entry.path(), 0));
            }
        }

        Err(EngineError::Failed(format!(
            "no file for plane {} (S{}Z{}C{}T{}) in {}",
            index,
            wanted[0],
            wanted[1],
            wanted[2],
            wanted[3],
            dataset.folder.display()
        )))
    }

    /// Decoded plane, from the recent-plane cache when possible.
    fn plane(&mut self, index: u32) -> Result<Arc<DecodedImage>, EngineError> {
        let key = (self.dataset()?.series, index);
        if let Some(image) = self.decoded.get(&key) {
            return Ok(Arc::clone(image));
        }

        let image = Arc::new(self.decode_plane(index)?);
        self.decode_count += 1;
        self.decoded.put(key, Arc::clone(&image));
        Ok(image)
    }

    /// Decode a plane and check it against the declared geometry and type.
    fn decode_plane(&self, index: u32) -> Result<DecodedImage, EngineError> {
        let (path, ifd) = self.plane_path(index)?;
        debug!(plane = index, path = %path.display(), ifd, "Decoding plane file");

        let pixels = self.pixels()?;
        let image = decode_tiff(&path, ifd)?;

        let declared = PixelType::from_name(&pixels.pixel_type);
        let type_matches = match declared {
            Some(PixelType::Bit) => image.pixel_type == PixelType::Uint8,
            Some(declared) => image.pixel_type == declared,
            None => false,
        };
        if !type_matches {
            return Err(EngineError::Malformed(format!(
                "{}: decoded {} samples, document declares {}",
                path.display(),
                image.pixel_type,
                pixels.pixel_type
            )));
        }

        if image.width != pixels.size_x || image.height != pixels.size_y {
            return Err(EngineError::Malformed(format!(
                "{}: {}x{} plane, document declares {}x{}",
                path.display(),
                image.width,
                image.height,
                pixels.size_x,
                pixels.size_y
            )));
        }

        if image.samples_per_pixel != pixels.rgb_channel_count() {
            return Err(EngineError::Malformed(format!(
                "{}: {} samples per pixel, document implies {}",
                path.display(),
                image.samples_per_pixel,
                pixels.rgb_channel_count()
            )));
        }

        Ok(image)
    }
}

impl DecodeEngine for CompanionEngine {
    fn open(&mut self, path: &Path) -> Result<(), EngineError> {
        let dataset = Dataset::load(path)?;
        debug!(
            path = %path.display(),
            series = dataset.document.images.len(),
            "Companion document loaded"
        );
        self.dataset = Some(dataset);
        self.decoded.clear();
        Ok(())
    }

    fn close(&mut self) -> Result<(), EngineError> {
        self.dataset = None;
        self.decoded.clear();
        Ok(())
    }

    fn reopen(&mut self) -> Result<(), EngineError> {
        let current = self.dataset()?;
        let series = current.series;
        let mut dataset = Dataset::load(&current.path)?;
        if series < dataset.document.images.len() {
            dataset.series = series;
        }
        self.dataset = Some(dataset);
        self.decoded.clear();
        Ok(())
    }

    fn series_count(&self) -> Result<usize, EngineError> {
        Ok(self.dataset()?.document.images.len())
    }

    fn set_series(&mut self, series: usize) -> Result<(), EngineError> {
        let dataset = self.dataset.as_mut().ok_or(EngineError::NotOpen)?;
        let count = dataset.document.images.len();
        if series >= count {
            return Err(EngineError::Failed(format!(
                "series {series} not in [0, {count})"
            )));
        }
        dataset.series = series;
        Ok(())
    }

    fn series(&self) -> Result<usize, EngineError> {
        Ok(self.dataset()?.series)
    }

    fn image_count(&self) -> Result<u32, EngineError> {
        Ok(self.pixels()?.planes.len() as u32)
    }

    fn size_x(&self) -> Result<u32, EngineError> {
        Ok(self.pixels()?.size_x)
    }

    fn size_y(&self) -> Result<u32, EngineError> {
        Ok(self.pixels()?.size_y)
    }

    fn size_z(&self) -> Result<u32, EngineError> {
        Ok(self.pixels()?.size_z)
    }

    fn effective_size_c(&self) -> Result<u32, EngineError> {
        Ok(self.pixels()?.effective_size_c())
    }

    fn size_t(&self) -> Result<u32, EngineError> {
        Ok(self.pixels()?.size_t)
    }

    fn physical_size_x(&self) -> Result<Option<f64>, EngineError> {
        let p = self.pixels()?;
        Ok(physical_length(p.physical_size_x, p.physical_size_x_unit.as_deref()))
    }

    fn physical_size_y(&self) -> Result<Option<f64>, EngineError> {
        let p = self.pixels()?;
        Ok(physical_length(p.physical_size_y, p.physical_size_y_unit.as_deref()))
    }

    fn physical_size_z(&self) -> Result<Option<f64>, EngineError> {
        let p = self.pixels()?;
        Ok(physical_length(p.physical_size_z, p.physical_size_z_unit.as_deref()))
    }

    fn physical_size_t(&self) -> Result<Option<f64>, EngineError> {
        let p = self.pixels()?;
        let unit = p.time_increment_unit.as_deref().unwrap_or(DEFAULT_TIME_UNIT);
        Ok(p.time_increment.map(|v| v * time_unit_to_seconds(unit)))
    }

    fn pixel_type(&self) -> Result<i32, EngineError> {
        let name = &self.pixels()?.pixel_type;
        PixelType::from_name(name)
            .map(PixelType::ordinal)
            .ok_or_else(|| EngineError::Malformed(format!("unknown pixel type: {name}")))
    }

    fn rgb_channel_count(&self) -> Result<u32, EngineError> {
        Ok(self.pixels()?.rgb_channel_count())
    }

    fn channel_color(&self, channel: u32) -> Result<Option<[u8; 4]>, EngineError> {
        Ok(self
            .pixels()?
            .channels
            .get(channel as usize)
            .and_then(|c| c.color)
            .map(|packed| ChannelColor::from_packed_rgba(packed as i32).to_rgba()))
    }

    fn is_little_endian(&self) -> Result<bool, EngineError> {
        Ok(true)
    }

    fn is_interleaved(&self) -> Result<bool, EngineError> {
        Ok(true)
    }

    fn plane_index(&self, z: u32, c: u32, t: u32) -> Result<u32, EngineError> {
        self.pixels()?
            .planes
            .iter()
            .position(|p| p.the_z == z && p.the_c == c && p.the_t == t)
            .map(|i| i as u32)
            .ok_or_else(|| EngineError::Failed(format!("no plane for z={z}, c={c}, t={t}")))
    }

    fn zct_coords(&self, index: u32) -> Result<[u32; 3], EngineError> {
        self.pixels()?
            .planes
            .get(index as usize)
            .map(|p| [p.the_z, p.the_c, p.the_t])
            .ok_or_else(|| EngineError::Failed(format!("no plane with index {index}")))
    }

    fn open_bytes(&mut self, index: u32) -> Result<Option<Vec<u8>>, EngineError> {
        Ok(Some(self.plane(index)?.data.clone()))
    }

    fn open_bytes_region(
        &mut self,
        index: u32,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<Option<Vec<u8>>, EngineError> {
        let image = self.plane(index)?;
        if x as u64 + width as u64 > image.width as u64
            || y as u64 + height as u64 > image.height as u64
        {
            return Err(EngineError::Failed(format!(
                "region ({x}, {y}, {width}x{height}) outside {}x{} plane",
                image.width, image.height
            )));
        }

        let pixel_bytes = image.samples_per_pixel as usize * image.pixel_type.bytes_per_pixel();
        let stride = image.width as usize * pixel_bytes;
        let row_len = width as usize * pixel_bytes;
        let mut out = Vec::with_capacity(row_len * height as usize);
        for row in y as usize..(y + height) as usize {
            let start = row * stride + x as usize * pixel_bytes;
            out.extend_from_slice(&image.data[start..start + row_len]);
        }
        Ok(Some(out))
    }

    fn lookup_table_8bit(&self) -> Result<Option<Vec<Vec<u8>>>, EngineError> {
        self.dataset()?;
        Ok(None)
    }

    fn lookup_table_16bit(&self) -> Result<Option<Vec<Vec<u16>>>, EngineError> {
        self.dataset()?;
        Ok(None)
    }

    fn optimal_tile_width(&self) -> Result<u32, EngineError> {
        Ok(self.pixels()?.size_x)
    }

    fn optimal_tile_height(&self) -> Result<u32, EngineError> {
        Ok(self.pixels()?.size_y.min(STRIP_HEIGHT))
    }

    fn resolution_count(&self) -> Result<usize, EngineError> {
        self.dataset()?;
        Ok(1)
    }

    fn set_resolution(&mut self, level: usize) -> Result<(), EngineError> {
        self.dataset()?;
        if level != 0 {
            return Err(EngineError::Failed(format!(
                "resolution {level} not available (single-resolution dataset)"
            )));
        }
        Ok(())
    }

    fn resolution(&self) -> Result<usize, EngineError> {
        self.dataset()?;
        Ok(0)
    }

    fn associated_image_names(&self) -> Result<Vec<String>, EngineError> {
        let dataset = self.dataset()?;
        Ok(dataset
            .document
            .associated_images(dataset.image()?)
            .map(|(name, _)| name.to_string())
            .collect())
    }

    fn associated_image(&mut self, name: &str) -> Result<Option<AssociatedImage>, EngineError> {
        let dataset = self.dataset()?;
        let Some((_, file)) = dataset
            .document
            .associated_images(dataset.image()?)
            .find(|(key, _)| *key == name)
        else {
            return Ok(None);
        };

        let image = decode_tiff(&dataset.folder.join(file), 0)?;
        let pixel_type = associated_pixel_type(image.pixel_type).ok_or_else(|| {
            EngineError::Malformed(format!("associated image {name} has bit samples"))
        })?;

        Ok(Some(AssociatedImage {
            name: name.to_string(),
            width: image.width,
            height: image.height,
            samples_per_pixel: image.samples_per_pixel,
            pixel_type,
            data: Bytes::from(image.data),
        }))
    }

    fn metadata_document(&self) -> Result<Option<String>, EngineError> {
        Ok(Some(self.dataset()?.text.clone()))
    }
}

// =============================================================================
// CompanionProvider
// =============================================================================

/// Provider of [`CompanionEngine`] sessions.
///
/// The engine needs no process-wide runtime, so sessions are independent.
#[derive(Debug, Default, Clone)]
pub struct CompanionProvider;

impl CompanionProvider {
    pub fn new() -> Self {
        Self
    }
}

impl EngineProvider for CompanionProvider {
    type Engine = CompanionEngine;

    fn name(&self) -> &str {
        "companion"
    }

    fn create_engine(&self) -> Result<Self::Engine, EngineError> {
        Ok(CompanionEngine::new())
    }
}
