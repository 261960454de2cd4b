//! Shared test utilities: synthetic images and fixture files.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let path = write_image(tmp.path(), "face.png", &gradient(8, 4));
//!
//! // ... convert ...
//!
//! let (header, pixels) = read_bmp(&out.join("face.bmp"));
//! assert_eq!(header.bits_per_pixel, 16);
//! ```

use crate::encode::bmp::{self, BmpHeader};
use image::{Rgba, RgbaImage};
use std::path::{Path, PathBuf};

// =========================================================================
// Synthetic images
// =========================================================================

/// Opaque image whose colour changes along both axes: every pixel distinct
/// up to 12x12.
pub fn gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 20) as u8, (y * 20) as u8, 128, 255])
    })
}

pub fn solid(width: u32, height: u32, px: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba(px))
}

/// `inner` colour block at `(x, y, w, h)` on a transparent canvas.
pub fn sprite(width: u32, height: u32, inner: (u32, u32, u32, u32), px: [u8; 4]) -> RgbaImage {
    let (ix, iy, iw, ih) = inner;
    RgbaImage::from_fn(width, height, |x, y| {
        if x >= ix && x < ix + iw && y >= iy && y < iy + ih {
            Rgba(px)
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

// =========================================================================
// Fixture files
// =========================================================================

/// Save `img` as `dir/name`, format chosen by extension.
pub fn write_image(dir: &Path, name: &str, img: &RgbaImage) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    img.save(&path).unwrap();
    path
}

/// Parse a BMP written by the encoder: header plus decoded pixels.
pub fn read_bmp(path: &Path) -> (BmpHeader, RgbaImage) {
    let data = std::fs::read(path).unwrap();
    let header = bmp::read_header(&data).unwrap();
    let pixels = bmp::decode(&data).unwrap();
    (header, pixels)
}
