//! Rendering of reader buffers to viewable images.
//!
//! The reader produces raw, typed sample buffers. This module is the
//! downstream consumer that turns them into PNG or JPEG:
//!
//! ```text
//! ┌──────────────────┐     ┌─────────────────────────────────┐
//! │   SeriesReader   │     │          RegionEncoder          │
//! │  PlaneBuffer     │────▶│  pixel type check → palette →   │
//! │  Region          │     │  residual resample → PNG/JPEG   │
//! │  AssociatedImage │     └─────────────────────────────────┘
//! └──────────────────┘
//! ```
//!
//! # Components
//!
//! - [`RegionEncoder`]: Encodes planes, regions and associated images
//! - [`OutputFormat`]: PNG or JPEG

mod encoder;

pub use encoder::{
    is_valid_quality, OutputFormat, RegionEncoder, DEFAULT_QUALITY, MAX_QUALITY, MIN_QUALITY,
};
