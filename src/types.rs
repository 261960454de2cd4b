//! Shared types used across the loader, the encoders and the CLI.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pixel encoding written into the output file.
///
/// The 16-bit formats are what the clock firmware blits straight to the
/// panel. The indexed formats trade colour depth for flash space and go
/// through palette quantization first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// 16 bpp, 5-6-5 bits, no alpha.
    Rgb565,
    /// 16 bpp, 1-bit alpha + 5-5-5 bits.
    Argb1555,
    /// 16 bpp, 4 bits per channel including alpha.
    Argb4444,
    /// 1 bpp, 2-colour palette.
    Index1,
    /// 2 bpp, 4-colour palette.
    Index2,
    /// 4 bpp, 16-colour palette.
    Index4,
    /// 8 bpp, 256-colour palette.
    Index8,
    /// 24 bpp BGR.
    Rgb888,
    /// 32 bpp BGRA.
    Argb8888,
}

impl PixelFormat {
    /// Map the legacy `--bpp` switch onto a format.
    ///
    /// Returns `None` for depths the device has no encoding for.
    pub fn from_bpp(bpp: u8) -> Option<Self> {
        match bpp {
            1 => Some(Self::Index1),
            2 => Some(Self::Index2),
            4 => Some(Self::Index4),
            8 => Some(Self::Index8),
            16 => Some(Self::Rgb565),
            24 => Some(Self::Rgb888),
            32 => Some(Self::Argb8888),
            _ => None,
        }
    }

    pub fn bits_per_pixel(self) -> u16 {
        match self {
            Self::Rgb565 | Self::Argb1555 | Self::Argb4444 => 16,
            Self::Index1 => 1,
            Self::Index2 => 2,
            Self::Index4 => 4,
            Self::Index8 => 8,
            Self::Rgb888 => 24,
            Self::Argb8888 => 32,
        }
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, Self::Argb1555 | Self::Argb4444 | Self::Argb8888)
    }

    pub fn is_indexed(self) -> bool {
        self.palette_size().is_some()
    }

    pub fn is_16bit(self) -> bool {
        self.bits_per_pixel() == 16
    }

    /// Maximum number of palette entries, `None` for direct-colour formats.
    pub fn palette_size(self) -> Option<usize> {
        match self {
            Self::Index1 | Self::Index2 | Self::Index4 | Self::Index8 => {
                Some(1 << self.bits_per_pixel())
            }
            _ => None,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rgb565 => "rgb565",
            Self::Argb1555 => "argb1555",
            Self::Argb4444 => "argb4444",
            Self::Index1 => "index1",
            Self::Index2 => "index2",
            Self::Index4 => "index4",
            Self::Index8 => "index8",
            Self::Rgb888 => "rgb888",
            Self::Argb8888 => "argb8888",
        };
        f.write_str(name)
    }
}

/// File container the encoded pixels are written into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    /// Windows bitmap with bitfield masks or a palette.
    Bmp,
    /// Headered raw RGB565 (`CK` magic), read by the firmware without parsing a BMP.
    Clk,
    /// Plain PNG, for previews and for formats PNG can hold natively.
    Png,
}

impl Container {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Bmp => "bmp",
            Self::Clk => "clk",
            Self::Png => "png",
        }
    }

    /// Whether this container can carry `format`.
    ///
    /// The 16-bit encodings only exist inside BMP bitfields (or CLK for
    /// RGB565); PNG has no way to express them.
    pub fn supports(self, format: PixelFormat) -> bool {
        match self {
            Self::Bmp => true,
            Self::Clk => format == PixelFormat::Rgb565,
            Self::Png => !format.is_16bit(),
        }
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Summary line data for an image, as printed by `info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    /// Number of distinct RGBA values.
    pub colors: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_bpp_matches_legacy_choices() {
        assert_eq!(PixelFormat::from_bpp(1), Some(PixelFormat::Index1));
        assert_eq!(PixelFormat::from_bpp(16), Some(PixelFormat::Rgb565));
        assert_eq!(PixelFormat::from_bpp(24), Some(PixelFormat::Rgb888));
        assert_eq!(PixelFormat::from_bpp(32), Some(PixelFormat::Argb8888));
        assert_eq!(PixelFormat::from_bpp(12), None);
    }

    #[test]
    fn palette_sizes() {
        assert_eq!(PixelFormat::Index1.palette_size(), Some(2));
        assert_eq!(PixelFormat::Index2.palette_size(), Some(4));
        assert_eq!(PixelFormat::Index4.palette_size(), Some(16));
        assert_eq!(PixelFormat::Index8.palette_size(), Some(256));
        assert_eq!(PixelFormat::Rgb565.palette_size(), None);
    }

    #[test]
    fn alpha_formats() {
        assert!(PixelFormat::Argb1555.has_alpha());
        assert!(PixelFormat::Argb4444.has_alpha());
        assert!(!PixelFormat::Rgb565.has_alpha());
        assert!(!PixelFormat::Index4.has_alpha());
    }

    #[test]
    fn sixteen_bit_only_in_bmp_or_clk() {
        assert!(Container::Bmp.supports(PixelFormat::Argb4444));
        assert!(Container::Clk.supports(PixelFormat::Rgb565));
        assert!(!Container::Clk.supports(PixelFormat::Argb1555));
        assert!(!Container::Png.supports(PixelFormat::Rgb565));
        assert!(Container::Png.supports(PixelFormat::Index4));
    }

    #[test]
    fn format_serializes_lowercase() {
        #[derive(Serialize, Deserialize)]
        struct Wrap {
            format: PixelFormat,
        }
        let parsed: Wrap = toml::from_str(r#"format = "argb4444""#).unwrap();
        assert_eq!(parsed.format, PixelFormat::Argb4444);
        assert_eq!(PixelFormat::Index2.to_string(), "index2");
    }
}
