//! Image domain types

use serde::{Deserialize, Serialize};

/// Resolution reported when the source carries no usable resolution metadata
pub const DEFAULT_DPI: u32 = 72;

/// Measured pixel geometry of an image
///
/// Both sides are strictly positive once measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

impl ImageDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Wider than tall
    pub fn is_landscape(&self) -> bool {
        self.width > self.height
    }

    /// Returns true if either side exceeds the given bounds
    pub fn exceeds(&self, max_width: u32, max_height: u32) -> bool {
        self.width > max_width || self.height > max_height
    }
}

/// A base64 preview together with the geometry of the encoded bytes
///
/// `width`/`height` describe the image in `data`, which may be a resized
/// copy of the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedThumbnail {
    pub data: String,
    pub width: u32,
    pub height: u32,
}

/// Target geometry for a resize or thumbnail
///
/// A zero side means "derive from the aspect ratio".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeSpec {
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

impl ResizeSpec {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Fixed width, height follows the aspect ratio
    pub fn by_width(width: u32) -> Self {
        Self { width, height: 0 }
    }

    /// Fixed height, width follows the aspect ratio
    pub fn by_height(height: u32) -> Self {
        Self { width: 0, height }
    }

    /// True when neither side is set
    pub fn is_empty(&self) -> bool {
        self.width == 0 && self.height == 0
    }

    /// Renders the `<width>x<height>` geometry argument
    ///
    /// Zero sides render as empty strings: `by_width(800)` gives `"800x"`.
    pub fn geometry(&self) -> String {
        format!("{}x{}", render_side(self.width), render_side(self.height))
    }

    /// Parses `<width>x<height>` where either side may be empty
    pub fn parse_geometry(geometry: &str) -> Option<Self> {
        let (width, height) = geometry.split_once(['x', 'X'])?;
        Some(Self {
            width: parse_side(width)?,
            height: parse_side(height)?,
        })
    }
}

fn render_side(value: u32) -> String {
    if value == 0 {
        String::new()
    } else {
        value.to_string()
    }
}

fn parse_side(value: &str) -> Option<u32> {
    let value = value.trim();
    if value.is_empty() {
        Some(0)
    } else {
        value.parse().ok()
    }
}
