//! Per-pixel packing for the 16-bit display formats.
//!
//! Packing truncates: each channel keeps its high bits, which is the same as
//! `floor(v / 2^(8 - bits))`. Expansion back to 8 bits spreads the level over
//! the full 0..=255 range so `pack(expand(level)) == level` for every level.

use crate::types::PixelFormat;
use image::Rgba;
use image::imageops::ColorMap;

pub fn rgb565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 >> 3) << 11) | ((g as u16 >> 2) << 5) | (b as u16 >> 3)
}

pub fn argb1555(px: Rgba<u8>) -> u16 {
    let [r, g, b, a] = px.0;
    let alpha = if a >= 128 { 0x8000 } else { 0 };
    alpha | ((r as u16 >> 3) << 10) | ((g as u16 >> 3) << 5) | (b as u16 >> 3)
}

pub fn argb4444(px: Rgba<u8>) -> u16 {
    let [r, g, b, a] = px.0;
    ((a as u16 >> 4) << 12) | ((r as u16 >> 4) << 8) | ((g as u16 >> 4) << 4) | (b as u16 >> 4)
}

/// Scale an n-bit level to 8 bits.
pub fn expand(level: u32, bits: u8) -> u8 {
    if bits >= 8 {
        return level.min(255) as u8;
    }
    let max = (1u32 << bits) - 1;
    ((level.min(max) * 255 + max / 2) / max) as u8
}

pub fn unpack_rgb565(value: u16) -> Rgba<u8> {
    let r = (value >> 11) as u32;
    let g = ((value >> 5) & 0x3F) as u32;
    let b = (value & 0x1F) as u32;
    Rgba([expand(r, 5), expand(g, 6), expand(b, 5), 255])
}

/// Snap a channel to the nearest value representable with `bits` bits.
fn snap(value: u8, bits: u8) -> u8 {
    if bits >= 8 {
        return value;
    }
    let max = (1u32 << bits) - 1;
    let level = (value as u32 * max + 127) / 255;
    expand(level, bits)
}

/// Channel depths of a direct-colour format, usable as an
/// [`image::imageops::ColorMap`] for error-diffusion dithering.
///
/// `map_color` snaps each channel to its nearest representable level, so the
/// dithered image packs without further loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelLevels {
    format: PixelFormat,
    /// Bits for red, green, blue, alpha.
    bits: [u8; 4],
}

impl ChannelLevels {
    /// Levels for a 16-bit format. `None` for formats that lose nothing
    /// per channel (24/32 bpp) or are indexed.
    pub fn for_format(format: PixelFormat) -> Option<Self> {
        let bits = match format {
            PixelFormat::Rgb565 => [5, 6, 5, 8],
            PixelFormat::Argb1555 => [5, 5, 5, 1],
            PixelFormat::Argb4444 => [4, 4, 4, 4],
            _ => return None,
        };
        Some(Self { format, bits })
    }
}

impl ColorMap for ChannelLevels {
    type Color = Rgba<u8>;

    fn index_of(&self, color: &Rgba<u8>) -> usize {
        let [r, g, b, _] = color.0;
        let packed = match self.format {
            PixelFormat::Argb1555 => argb1555(*color),
            PixelFormat::Argb4444 => argb4444(*color),
            _ => rgb565(r, g, b),
        };
        packed as usize
    }

    fn map_color(&self, color: &mut Rgba<u8>) {
        for (channel, bits) in color.0.iter_mut().zip(self.bits) {
            *channel = snap(*channel, bits);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb565_primaries() {
        assert_eq!(rgb565(255, 0, 0), 0xF800);
        assert_eq!(rgb565(0, 255, 0), 0x07E0);
        assert_eq!(rgb565(0, 0, 255), 0x001F);
        assert_eq!(rgb565(255, 255, 255), 0xFFFF);
        assert_eq!(rgb565(0, 0, 0), 0);
    }

    #[test]
    fn rgb565_truncates_like_floor_division() {
        // floor(7 / 8) = 0, floor(8 / 8) = 1
        assert_eq!(rgb565(7, 0, 0), 0);
        assert_eq!(rgb565(8, 0, 0), 1 << 11);
        // green keeps six bits: floor(4 / 4) = 1
        assert_eq!(rgb565(0, 4, 0), 1 << 5);
    }

    #[test]
    fn argb1555_alpha_threshold() {
        assert_eq!(argb1555(Rgba([0, 0, 0, 127])), 0);
        assert_eq!(argb1555(Rgba([0, 0, 0, 128])), 0x8000);
        assert_eq!(argb1555(Rgba([255, 255, 255, 255])), 0xFFFF);
        assert_eq!(argb1555(Rgba([255, 0, 0, 0])), 0x7C00);
    }

    #[test]
    fn argb4444_layout() {
        assert_eq!(argb4444(Rgba([0xF0, 0x80, 0x10, 0xFF])), 0xFF81);
        assert_eq!(argb4444(Rgba([0, 0, 0, 0])), 0);
    }

    #[test]
    fn expand_covers_full_range() {
        assert_eq!(expand(0, 5), 0);
        assert_eq!(expand(31, 5), 255);
        assert_eq!(expand(63, 6), 255);
        assert_eq!(expand(15, 4), 255);
        assert_eq!(expand(1, 1), 255);
    }

    #[test]
    fn expand_then_pack_is_lossless() {
        for level in 0..32u32 {
            assert_eq!(expand(level, 5) >> 3, level as u8);
        }
        for level in 0..64u32 {
            assert_eq!(expand(level, 6) >> 2, level as u8);
        }
        for level in 0..16u32 {
            assert_eq!(expand(level, 4) >> 4, level as u8);
        }
    }

    #[test]
    fn unpack_rgb565_inverts_pack_for_white_and_red() {
        assert_eq!(unpack_rgb565(0xFFFF), Rgba([255, 255, 255, 255]));
        assert_eq!(unpack_rgb565(0xF800), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn channel_levels_snap_to_representable_values() {
        let levels = ChannelLevels::for_format(PixelFormat::Rgb565).unwrap();
        let mut px = Rgba([130, 130, 130, 77]);
        levels.map_color(&mut px);
        // snapped values survive truncating packing unchanged
        let packed = rgb565(px[0], px[1], px[2]);
        assert_eq!(unpack_rgb565(packed)[0], px[0]);
        assert_eq!(unpack_rgb565(packed)[1], px[1]);
        // alpha is untouched for a format without alpha bits
        assert_eq!(px[3], 77);
    }

    #[test]
    fn channel_levels_1555_snaps_alpha_to_binary() {
        let levels = ChannelLevels::for_format(PixelFormat::Argb1555).unwrap();
        let mut px = Rgba([0, 0, 0, 200]);
        levels.map_color(&mut px);
        assert_eq!(px[3], 255);
        let mut px = Rgba([0, 0, 0, 100]);
        levels.map_color(&mut px);
        assert_eq!(px[3], 0);
    }

    #[test]
    fn no_levels_for_lossless_or_indexed_formats() {
        assert!(ChannelLevels::for_format(PixelFormat::Rgb888).is_none());
        assert!(ChannelLevels::for_format(PixelFormat::Index4).is_none());
    }
}
