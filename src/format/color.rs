//! Channel colors and indexed palettes.
//!
//! Engines report color in several shapes:
//!
//! - per-channel RGBA tints, either as four components or packed into a
//!   signed 32-bit integer (`R << 24 | G << 16 | B << 8 | A`, as stored in
//!   OME metadata)
//! - indexed palettes as three channel-major rows (`[3][N]`)
//!
//! A missing palette (`None`) is not the same as an empty one. Callers must
//! not treat absence as "identity grayscale" or vice versa.

use serde::Serialize;

// =============================================================================
// ChannelColor
// =============================================================================

/// RGBA tint of one effective channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ChannelColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
}

impl ChannelColor {
    /// Opaque white, the tint used when a channel carries no color.
    pub const WHITE: ChannelColor = ChannelColor::new(255, 255, 255, 255);

    /// Create a color from its components.
    pub const fn new(red: u8, green: u8, blue: u8, alpha: u8) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    /// Create a color from an `[R, G, B, A]` array.
    pub const fn from_rgba(rgba: [u8; 4]) -> Self {
        Self::new(rgba[0], rgba[1], rgba[2], rgba[3])
    }

    /// Decode a packed signed RGBA integer (`R` in the most significant byte).
    pub fn from_packed_rgba(value: i32) -> Self {
        let [r, g, b, a] = value.to_be_bytes();
        Self::new(r, g, b, a)
    }

    /// Decode a packed ARGB integer (`A` in the most significant byte).
    pub fn from_packed_argb(value: u32) -> Self {
        let [a, r, g, b] = value.to_be_bytes();
        Self::new(r, g, b, a)
    }

    /// The color as an `[R, G, B, A]` array.
    pub const fn to_rgba(self) -> [u8; 4] {
        [self.red, self.green, self.blue, self.alpha]
    }
}

// =============================================================================
// LookupTable
// =============================================================================

/// An indexed palette mapping raw sample values to RGB triples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTable<T> {
    entries: Vec<[T; 3]>,
}

/// Palette for 8-bit samples.
pub type LookupTable8 = LookupTable<u8>;

/// Palette for 16-bit samples.
pub type LookupTable16 = LookupTable<u16>;

impl<T: Copy> LookupTable<T> {
    /// Build a palette from channel-major rows (`[red[], green[], blue[]]`).
    ///
    /// Zero-length rows are valid and produce an empty palette.
    pub fn from_channels(rows: Vec<Vec<T>>) -> Result<Self, String> {
        if rows.len() != 3 {
            return Err(format!("expected 3 color rows, got {}", rows.len()));
        }
        let len = rows[0].len();
        if rows.iter().any(|r| r.len() != len) {
            return Err(format!(
                "color rows differ in length: {}, {}, {}",
                rows[0].len(),
                rows[1].len(),
                rows[2].len()
            ));
        }

        let entries = (0..len)
            .map(|i| [rows[0][i], rows[1][i], rows[2][i]])
            .collect();
        Ok(Self { entries })
    }

    /// Build a palette from RGB triples.
    pub fn from_entries(entries: Vec<[T; 3]>) -> Self {
        Self { entries }
    }

    /// Number of entries in the palette.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the palette has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// RGB triple for a sample value.
    pub fn get(&self, index: usize) -> Option<[T; 3]> {
        self.entries.get(index).copied()
    }

    /// All RGB triples in index order.
    pub fn entries(&self) -> &[[T; 3]] {
        &self.entries
    }
}

// =============================================================================
// ColorModel
// =============================================================================

/// Per-channel tints of the selected series.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColorModel {
    colors: Vec<Option<ChannelColor>>,
}

impl ColorModel {
    /// Create a color model from optional per-channel colors.
    pub fn new(colors: Vec<Option<ChannelColor>>) -> Self {
        Self { colors }
    }

    /// Number of channels described.
    pub fn channel_count(&self) -> usize {
        self.colors.len()
    }

    /// Color reported for a channel, if any.
    pub fn channel_color(&self, channel: usize) -> Option<ChannelColor> {
        self.colors.get(channel).copied().flatten()
    }

    /// Display tint for a channel, white when none is reported.
    pub fn tint(&self, channel: usize) -> ChannelColor {
        self.channel_color(channel).unwrap_or(ChannelColor::WHITE)
    }

    /// Whether any channel reports a color.
    pub fn has_colors(&self) -> bool {
        self.colors.iter().any(Option::is_some)
    }

    /// The raw per-channel colors.
    pub fn colors(&self) -> &[Option<ChannelColor>] {
        &self.colors
    }
}
