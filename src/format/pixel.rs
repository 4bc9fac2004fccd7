//! Pixel sample encodings.
//!
//! Two numeric spaces exist for pixel types and they must never be mixed:
//!
//! - [`PixelType`] is the ordinal space used for planes, tiles and regions:
//!   `int8, uint8, int16, uint16, int32, uint32, float, double, bit`.
//! - [`AssociatedPixelType`] is the ordinal space used for associated images
//!   (labels, macros, thumbnails): `uint8, int8, uint16, int16, uint32, int32,
//!   float, double`, with no `bit` type.
//!
//! The signed/unsigned 8-bit types swap positions between the two, so casting
//! an ordinal from one space into the other silently changes the meaning of the
//! data. There is deliberately no conversion between them.

use std::fmt;

use serde::Serialize;

// =============================================================================
// PixelType
// =============================================================================

/// Sample encoding of plane data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelType {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float,
    Double,
    Bit,
}

impl PixelType {
    /// All pixel types, in ordinal order.
    pub const ALL: [PixelType; 9] = [
        PixelType::Int8,
        PixelType::Uint8,
        PixelType::Int16,
        PixelType::Uint16,
        PixelType::Int32,
        PixelType::Uint32,
        PixelType::Float,
        PixelType::Double,
        PixelType::Bit,
    ];

    /// Map an engine ordinal to a pixel type.
    ///
    /// Returns `None` for ordinals outside the enumeration.
    pub fn from_ordinal(ordinal: i32) -> Option<Self> {
        usize::try_from(ordinal)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// The engine ordinal of this pixel type.
    pub fn ordinal(self) -> i32 {
        self as i32
    }

    /// Number of bytes used to store one sample.
    ///
    /// `Bit` data is stored one sample per byte.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelType::Int8 | PixelType::Uint8 | PixelType::Bit => 1,
            PixelType::Int16 | PixelType::Uint16 => 2,
            PixelType::Int32 | PixelType::Uint32 | PixelType::Float => 4,
            PixelType::Double => 8,
        }
    }

    /// Lowercase name of the pixel type.
    pub const fn name(self) -> &'static str {
        match self {
            PixelType::Int8 => "int8",
            PixelType::Uint8 => "uint8",
            PixelType::Int16 => "int16",
            PixelType::Uint16 => "uint16",
            PixelType::Int32 => "int32",
            PixelType::Uint32 => "uint32",
            PixelType::Float => "float",
            PixelType::Double => "double",
            PixelType::Bit => "bit",
        }
    }

    /// Parse a pixel type from its name.
    ///
    /// Accepts `float32`/`float64` as aliases for `float`/`double`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "float32" => return Some(PixelType::Float),
            "float64" => return Some(PixelType::Double),
            _ => {}
        }
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Whether samples are IEEE floating point.
    pub const fn is_floating_point(self) -> bool {
        matches!(self, PixelType::Float | PixelType::Double)
    }

    /// Whether samples are signed.
    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            PixelType::Int8
                | PixelType::Int16
                | PixelType::Int32
                | PixelType::Float
                | PixelType::Double
        )
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// AssociatedPixelType
// =============================================================================

/// Sample encoding of associated images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssociatedPixelType {
    Uint8,
    Int8,
    Uint16,
    Int16,
    Uint32,
    Int32,
    Float,
    Double,
}

impl AssociatedPixelType {
    /// All associated pixel types, in ordinal order.
    pub const ALL: [AssociatedPixelType; 8] = [
        AssociatedPixelType::Uint8,
        AssociatedPixelType::Int8,
        AssociatedPixelType::Uint16,
        AssociatedPixelType::Int16,
        AssociatedPixelType::Uint32,
        AssociatedPixelType::Int32,
        AssociatedPixelType::Float,
        AssociatedPixelType::Double,
    ];

    /// Map an ordinal from the associated-image space.
    pub fn from_ordinal(ordinal: i32) -> Option<Self> {
        usize::try_from(ordinal)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// The ordinal of this type in the associated-image space.
    pub fn ordinal(self) -> i32 {
        self as i32
    }

    /// Number of bytes used to store one sample.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            AssociatedPixelType::Uint8 | AssociatedPixelType::Int8 => 1,
            AssociatedPixelType::Uint16 | AssociatedPixelType::Int16 => 2,
            AssociatedPixelType::Uint32 | AssociatedPixelType::Int32 | AssociatedPixelType::Float => 4,
            AssociatedPixelType::Double => 8,
        }
    }

    /// Lowercase name of the pixel type.
    pub const fn name(self) -> &'static str {
        match self {
            AssociatedPixelType::Uint8 => "uint8",
            AssociatedPixelType::Int8 => "int8",
            AssociatedPixelType::Uint16 => "uint16",
            AssociatedPixelType::Int16 => "int16",
            AssociatedPixelType::Uint32 => "uint32",
            AssociatedPixelType::Int32 => "int32",
            AssociatedPixelType::Float => "float",
            AssociatedPixelType::Double => "double",
        }
    }
}

impl fmt::Display for AssociatedPixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
