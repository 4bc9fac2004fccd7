//! Pixel format model.
//!
//! This module describes how plane data is encoded, independent of any
//! particular container format:
//!
//! - [`pixel`]: sample encodings and their byte widths
//! - [`layout`]: byte order and sample interleaving, and normalization to the
//!   canonical little-endian interleaved layout
//! - [`color`]: per-channel tints and indexed palettes

pub mod color;
pub mod layout;
pub mod pixel;

pub use color::{ChannelColor, ColorModel, LookupTable, LookupTable16, LookupTable8};
pub use layout::{normalize, ByteOrder, SampleLayout};
pub use pixel::{AssociatedPixelType, PixelType};
