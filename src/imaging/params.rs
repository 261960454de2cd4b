//! Parameter types for loading and transforming images.
//!
//! These structs describe *what* to do, not *how* to do it. The
//! [`operations`](super::operations) module applies them to pixels and the
//! [`backend`](super::backend) uses [`LoadOptions`] to decode files.
//!
//! ## Types
//!
//! - [`Background`]: colour transparent pixels are composited over. Parsed
//!   from a name (`white`) or a hex string (`#fff`, `#ffffff`).
//! - [`TrimMode`]: exact or fuzzy crop-to-content.
//! - [`Adjustments`]: brightness offset, contrast percentage, inversion.
//! - [`AddParams`]: overlay image added channel-wise with scale and offset.
//! - [`TransformParams`]: the full transform chain for one image.
//! - [`LoadOptions`]: decoder hints (raw dimensions, SVG target box).

use image::{Rgb, RgbaImage};
use std::fmt;
use std::str::FromStr;

/// Colour that transparent pixels are composited over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Background(pub Rgb<u8>);

impl Default for Background {
    fn default() -> Self {
        Self(Rgb([0, 0, 0]))
    }
}

const NAMED_COLORS: &[(&str, [u8; 3])] = &[
    ("black", [0, 0, 0]),
    ("white", [255, 255, 255]),
    ("red", [255, 0, 0]),
    ("lime", [0, 255, 0]),
    ("green", [0, 128, 0]),
    ("blue", [0, 0, 255]),
    ("yellow", [255, 255, 0]),
    ("cyan", [0, 255, 255]),
    ("magenta", [255, 0, 255]),
    ("gray", [128, 128, 128]),
    ("grey", [128, 128, 128]),
    ("silver", [192, 192, 192]),
    ("maroon", [128, 0, 0]),
    ("navy", [0, 0, 128]),
    ("olive", [128, 128, 0]),
    ("purple", [128, 0, 128]),
    ("teal", [0, 128, 128]),
    ("orange", [255, 165, 0]),
];

impl FromStr for Background {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            let digits: Vec<u8> = hex
                .chars()
                .map(|c| c.to_digit(16).map(|d| d as u8))
                .collect::<Option<_>>()
                .ok_or_else(|| format!("invalid hex colour '{s}'"))?;
            return match digits.as_slice() {
                [r, g, b] => Ok(Self(Rgb([r * 17, g * 17, b * 17]))),
                [r1, r2, g1, g2, b1, b2] => {
                    Ok(Self(Rgb([r1 * 16 + r2, g1 * 16 + g2, b1 * 16 + b2])))
                }
                _ => Err(format!("hex colour '{s}' must have 3 or 6 digits")),
            };
        }
        NAMED_COLORS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map(|(_, rgb)| Self(Rgb(*rgb)))
            .ok_or_else(|| format!("unknown colour '{s}'"))
    }
}

impl fmt::Display for Background {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0.0;
        write!(f, "#{r:02x}{g:02x}{b:02x}")
    }
}

/// How [`trim`](super::operations::trim) decides what counts as content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimMode {
    /// Any channel differing from the top-left pixel.
    Exact,
    /// A channel differing by more than [`TrimMode::FUZZY_THRESHOLD`].
    Fuzzy,
}

impl TrimMode {
    pub const FUZZY_THRESHOLD: u8 = 100;

    pub fn threshold(self) -> u8 {
        match self {
            Self::Exact => 0,
            Self::Fuzzy => Self::FUZZY_THRESHOLD,
        }
    }
}

/// Tone adjustments, applied brightness first, then contrast, then inversion.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Adjustments {
    /// Added to every colour channel, clamped.
    pub brightness: i32,
    /// Percentage; positive increases contrast, negative flattens it.
    pub contrast: f32,
    pub invert: bool,
}

impl Adjustments {
    pub fn is_identity(&self) -> bool {
        self.brightness == 0 && self.contrast == 0.0 && !self.invert
    }
}

/// Channel-wise addition of an overlay: `clamp((a + b) / scale + offset)`.
#[derive(Debug, Clone, PartialEq)]
pub struct AddParams {
    pub overlay: RgbaImage,
    pub scale: f32,
    pub offset: i32,
}

/// Every transform applied to one image or tile, in pipeline order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransformParams {
    /// Fit within this box, keeping aspect ratio.
    pub fit: Option<(u32, u32)>,
    pub trim: Option<TrimMode>,
    /// Composite over this colour and drop alpha.
    pub flatten: Option<Background>,
    pub adjust: Adjustments,
    pub add: Option<AddParams>,
}

/// Decoder hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadOptions {
    /// Dimensions of headerless RGB565 input.
    pub raw_size: Option<(u32, u32)>,
    /// Rasterize SVGs fitted to this box instead of at intrinsic size.
    pub svg_fit: Option<(u32, u32)>,
}

/// Parse a `WxH` size string.
pub fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("size '{s}' must look like WIDTHxHEIGHT"))?;
    let w: u32 = w
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in '{s}'"))?;
    let h: u32 = h
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in '{s}'"))?;
    if w == 0 || h == 0 {
        return Err(format!("size '{s}' must be non-zero"));
    }
    Ok((w, h))
}
