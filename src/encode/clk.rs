//! CLK container: a six-byte header followed by raw RGB565 pixels.
//!
//! ```text
//! "CK"  u16 width  u16 height  width*height u16 pixels, top-down, no padding
//! ```
//!
//! All values little-endian. The firmware streams these straight into the
//! panel's frame buffer.

use super::EncodeError;
use super::pixel::{rgb565, unpack_rgb565};
use crate::types::Container;
use image::RgbaImage;

pub const MAGIC: [u8; 2] = *b"CK";
pub const HEADER_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClkHeader {
    pub width: u16,
    pub height: u16,
}

impl ClkHeader {
    pub fn pixel_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 2
    }
}

pub fn is_clk(data: &[u8]) -> bool {
    data.starts_with(&MAGIC)
}

pub fn encode(img: &RgbaImage) -> Result<Vec<u8>, EncodeError> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(EncodeError::EmptyImage);
    }
    let too_large = || EncodeError::TooLarge {
        width,
        height,
        container: Container::Clk,
    };
    let w = u16::try_from(width).map_err(|_| too_large())?;
    let h = u16::try_from(height).map_err(|_| too_large())?;

    let mut out = Vec::with_capacity(HEADER_LEN + width as usize * height as usize * 2);
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&w.to_le_bytes());
    out.extend_from_slice(&h.to_le_bytes());
    for px in img.pixels() {
        out.extend_from_slice(&rgb565(px[0], px[1], px[2]).to_le_bytes());
    }
    Ok(out)
}

fn malformed(reason: impl Into<String>) -> EncodeError {
    EncodeError::Malformed {
        kind: "CLK",
        reason: reason.into(),
    }
}

pub fn read_header(data: &[u8]) -> Result<ClkHeader, EncodeError> {
    if data.len() < HEADER_LEN {
        return Err(malformed("header truncated"));
    }
    if !is_clk(data) {
        return Err(malformed("missing CK magic"));
    }
    let header = ClkHeader {
        width: u16::from_le_bytes([data[2], data[3]]),
        height: u16::from_le_bytes([data[4], data[5]]),
    };
    if header.width == 0 || header.height == 0 {
        return Err(malformed(format!(
            "bad dimensions {}x{}",
            header.width, header.height
        )));
    }
    Ok(header)
}

pub fn decode(data: &[u8]) -> Result<RgbaImage, EncodeError> {
    let header = read_header(data)?;
    let pixels = &data[HEADER_LEN..];
    if pixels.len() < header.pixel_bytes() {
        return Err(malformed(format!(
            "pixel data truncated: need {} bytes, have {}",
            header.pixel_bytes(),
            pixels.len()
        )));
    }
    Ok(decode_rgb565(pixels, header.width as u32, header.height as u32))
}

/// Expand `width * height` little-endian RGB565 values, rows top-down.
/// The caller guarantees `data` holds at least that many pixels.
pub fn decode_rgb565(data: &[u8], width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let at = (y as usize * width as usize + x as usize) * 2;
        unpack_rgb565(u16::from_le_bytes([data[at], data[at + 1]]))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn header_layout() {
        let img = RgbaImage::from_pixel(3, 2, Rgba([255, 0, 0, 255]));
        let bytes = encode(&img).unwrap();
        assert_eq!(&bytes[..6], &[0x43, 0x4B, 3, 0, 2, 0]);
        assert_eq!(bytes.len(), 6 + 3 * 2 * 2);
        // red, little-endian 0xF800
        assert_eq!(&bytes[6..8], &[0x00, 0xF8]);
    }

    #[test]
    fn rows_are_top_down() {
        let mut img = RgbaImage::from_pixel(1, 2, Rgba([0, 0, 0, 255]));
        img.put_pixel(0, 0, Rgba([255, 255, 255, 255]));
        let bytes = encode(&img).unwrap();
        assert_eq!(&bytes[6..8], &[0xFF, 0xFF]);
        assert_eq!(&bytes[8..10], &[0, 0]);

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
        assert_eq!(decoded.get_pixel(0, 1), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn width_must_fit_u16() {
        let img = RgbaImage::new(70_000, 1);
        assert!(matches!(
            encode(&img).unwrap_err(),
            EncodeError::TooLarge { .. }
        ));
    }

    #[test]
    fn decoder_rejects_bad_input() {
        assert!(read_header(b"CK").is_err());
        assert!(read_header(b"BM\x01\x00\x01\x00").is_err());

        let img = RgbaImage::new(2, 2);
        let bytes = encode(&img).unwrap();
        let err = decode(&bytes[..bytes.len() - 2]).unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }
}
