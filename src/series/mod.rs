//! Uniform series reading.
//!
//! This module is the heart of the crate: it wraps one decode engine session
//! and exposes every file as an indexed stream of planes.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                        SeriesReader                        │
//! │                                                            │
//! │  open / select_series ──▶ SeriesMetadata (one batch fetch) │
//! │                                                            │
//! │  read_plane ──▶ PlaneCache ──miss──▶ engine ──▶ normalize  │
//! │  read_region ─▶ Pyramid level selection ──▶ engine         │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`SeriesReader`]: Lifecycle, metadata getters, plane and region reads
//! - [`SeriesMetadata`]: Frozen per-series snapshot
//! - [`PlaneCache`]: LRU cache of normalized plane buffers
//! - [`PlaneCoordinate`]: (Z, C, T) addressing
//! - [`PlaneBuffer`] / [`Region`] / [`AssociatedImage`]: Read results

mod buffer;
mod cache;
mod index;
mod metadata;
mod reader;

pub use buffer::{AssociatedImage, PixelData, PlaneBuffer, Region};
pub use cache::{PlaneCache, PlaneKey, DEFAULT_PLANE_CACHE_CAPACITY};
pub use index::{PlaneCoordinate, PlaneDimensions};
pub use metadata::{plane_byte_size, SeriesMetadata};
pub use reader::{LevelTarget, RegionRequest, SeriesReader};
