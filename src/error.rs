use std::path::PathBuf;

use thiserror::Error;

/// Errors reported by a decode engine.
///
/// The engine is untrusted input-parsing code: any call may fail, and a failure
/// is an ordinary value rather than a crash.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The engine could not make sense of the requested file
    #[error("Unsupported format: {reason}")]
    UnsupportedFormat { reason: String },

    /// Underlying I/O failure while talking to the file
    #[error("I/O error: {0}")]
    Io(String),

    /// The engine returned data that violates its own contract
    #[error("Malformed engine response: {0}")]
    Malformed(String),

    /// No file is open in the engine
    #[error("No file is open")]
    NotOpen,

    /// The engine's file handle is unusable and must be re-established
    #[error("Engine handle corrupted: {0}")]
    HandleCorrupted(String),

    /// The engine runtime could not be started
    #[error("Engine runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    /// Any other failure raised by the engine
    #[error("Engine failure: {0}")]
    Failed(String),
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err.to_string())
    }
}

/// Errors surfaced by [`crate::series::SeriesReader`].
#[derive(Debug, Clone, Error)]
pub enum ReaderError {
    /// The engine rejected the path or did not recognize the format
    #[error("Failed to open {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    /// An operation that needs an open file was called on a closed reader
    #[error("Reader is not open")]
    NotOpen,

    /// An operation that needs a selected series was called before `select_series`
    #[error("No series selected")]
    NoSeriesSelected,

    /// Requested series is outside `[0, series_count)`
    #[error("Series {series} out of range: file has {count} series")]
    SeriesOutOfRange { series: usize, count: usize },

    /// A (Z, C, T) coordinate is outside the series dimensions
    #[error("Plane coordinate (z={z}, c={c}, t={t}) out of range for sizes (z={size_z}, c={size_c}, t={size_t})")]
    CoordinateOutOfRange {
        z: u32,
        c: u32,
        t: u32,
        size_z: u32,
        size_c: u32,
        size_t: u32,
    },

    /// A linear plane index is outside `[0, image_count)`
    #[error("Plane index {index} out of range: series has {count} planes")]
    PlaneIndexOutOfRange { index: u32, count: u32 },

    /// A channel index is outside `[0, size_c)`
    #[error("Channel {channel} out of range: series has {count} channels")]
    ChannelOutOfRange { channel: u32, count: u32 },

    /// Pyramid level is outside `[0, level_count)`
    #[error("Pyramid level {level} out of range: series has {count} levels")]
    LevelOutOfRange { level: usize, count: usize },

    /// Requested downsample is not a finite positive number
    #[error("Invalid downsample factor: {0}")]
    InvalidDownsample(f64),

    /// Rectangle does not fit inside the level
    #[error("Region ({x}, {y}, {width}x{height}) out of bounds for level {level} ({level_width}x{level_height})")]
    RegionOutOfBounds {
        level: usize,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        level_width: u32,
        level_height: u32,
    },

    /// Rectangle has zero width or height
    #[error("Region has zero area ({width}x{height})")]
    EmptyRegion { width: u32, height: u32 },

    /// Even the coarsest available level exceeds the plane byte ceiling
    #[error("Plane of {bytes} bytes exceeds the ceiling of {ceiling} bytes at every pyramid level")]
    PlaneTooLarge { bytes: u64, ceiling: u64 },

    /// The engine returned no data (or the wrong amount) for a plane
    #[error("Failed to read plane {index}: {reason}")]
    PlaneReadFailed { index: u32, reason: String },

    /// The engine reported a pixel type ordinal outside the known enumeration
    #[error("Unknown pixel type ordinal: {0}")]
    UnknownPixelType(i32),

    /// A lookup table did not have three equally sized color rows
    #[error("Malformed lookup table: {0}")]
    MalformedLookupTable(String),

    /// The engine handle is corrupted; call `reopen()` before further reads
    #[error("Engine handle corrupted, reopen required: {0}")]
    EngineHandleCorrupted(String),

    /// Any other engine failure
    #[error("Engine error: {0}")]
    Engine(#[source] EngineError),
}

impl From<EngineError> for ReaderError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::HandleCorrupted(reason) => ReaderError::EngineHandleCorrupted(reason),
            other => ReaderError::Engine(other),
        }
    }
}

impl ReaderError {
    /// Whether the reader must be reopened before it can serve reads again.
    pub fn requires_reopen(&self) -> bool {
        matches!(self, ReaderError::EngineHandleCorrupted(_))
    }
}

/// Errors raised while encoding pixel buffers to an image format.
#[derive(Debug, Clone, Error)]
pub enum EncodeError {
    /// The output backend cannot represent this pixel type
    #[error("Unsupported pixel type for encoding: {pixel_type}")]
    UnsupportedPixelType { pixel_type: String },

    /// The output backend cannot represent this many samples per pixel
    #[error("Unsupported samples per pixel for encoding: {0}")]
    UnsupportedSamples(u32),

    /// Buffer length does not match the declared geometry
    #[error("Buffer of {actual} bytes does not match {width}x{height} geometry ({expected} bytes)")]
    GeometryMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    /// Quality outside 1-100
    #[error("Invalid quality: {quality} (must be 1-100)")]
    InvalidQuality { quality: u8 },

    /// Image encoder failure
    #[error("Failed to encode image: {message}")]
    EncodeFailed { message: String },
}
