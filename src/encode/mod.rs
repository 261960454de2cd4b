//! Encoding processed images into device files.
//!
//! | Step | Where |
//! |---|---|
//! | Palette / dithering | [`rasterize`] (uses [`crate::imaging::quantize`]) |
//! | 16-bit packing | [`pixel`] |
//! | BMP headers, rows, palette | [`bmp`] |
//! | CLK raw container | [`clk`] |
//!
//! [`rasterize`] turns an RGBA buffer into a [`Raster`]: either direct
//! colour pixels or palette indices. [`encode`] then serializes the raster
//! into the requested container.

pub mod bmp;
pub mod clk;
pub mod pixel;

use crate::imaging::quantize::{Palette, build_palette};
use crate::types::{Container, PixelFormat};
use image::imageops::{ColorMap, dither};
use image::{DynamicImage, GrayImage, ImageFormat, Luma, RgbaImage};
use std::io::Cursor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PNG encoding failed: {0}")]
    Png(#[from] image::ImageError),
    #[error("Image has zero width or height")]
    EmptyImage,
    #[error("{width}x{height} is too large for a {container} file")]
    TooLarge {
        width: u32,
        height: u32,
        container: Container,
    },
    #[error("{container} files cannot hold {format} pixels")]
    Unsupported {
        container: Container,
        format: PixelFormat,
    },
    #[error("{format} needs {expected} pixels")]
    RasterMismatch {
        format: PixelFormat,
        expected: &'static str,
    },
    #[error("Palette has {len} entries but {format} allows {max}")]
    PaletteTooLarge {
        len: usize,
        max: usize,
        format: PixelFormat,
    },
    #[error("Malformed {kind} file: {reason}")]
    Malformed { kind: &'static str, reason: String },
}

/// Pixels laid out for a container.
#[derive(Debug, Clone)]
pub enum Raster {
    /// Direct colour. Channels are already snapped when dithering was used.
    Direct(RgbaImage),
    /// One palette index per pixel.
    Indexed { indices: GrayImage, palette: Palette },
}

impl Raster {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Raster::Direct(img) => img.dimensions(),
            Raster::Indexed { indices, .. } => indices.dimensions(),
        }
    }

    /// Expand back to RGBA, resolving palette indices.
    pub fn to_rgba(&self) -> RgbaImage {
        match self {
            Raster::Direct(img) => img.clone(),
            Raster::Indexed { indices, palette } => {
                RgbaImage::from_fn(indices.width(), indices.height(), |x, y| {
                    let idx = indices.get_pixel(x, y)[0] as usize;
                    palette.lookup(idx).unwrap_or(image::Rgba([0, 0, 0, 255]))
                })
            }
        }
    }
}

/// Options for turning RGBA pixels into a [`Raster`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterOptions {
    pub dither: bool,
    pub kmeans_iterations: u32,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            dither: false,
            kmeans_iterations: 128,
        }
    }
}

/// Error-diffuse `img` against `map`.
///
/// `image::imageops::dither` indexes the right and lower neighbours
/// unconditionally, so single-row or single-column images are only mapped.
fn diffuse<M: ColorMap<Color = image::Rgba<u8>>>(img: &mut RgbaImage, map: &M) {
    if img.width() < 2 || img.height() < 2 {
        for px in img.pixels_mut() {
            map.map_color(px);
        }
    } else {
        dither(img, map);
    }
}

/// Prepare pixels for `format`: quantize indexed formats, dither if asked.
pub fn rasterize(mut img: RgbaImage, format: PixelFormat, options: RasterOptions) -> Raster {
    if let Some(max_colors) = format.palette_size() {
        let palette = build_palette(&img, max_colors, options.kmeans_iterations);
        if options.dither {
            diffuse(&mut img, &palette);
        }
        let indices = GrayImage::from_fn(img.width(), img.height(), |x, y| {
            Luma([palette.index_of(img.get_pixel(x, y)) as u8])
        });
        tracing::debug!(colors = palette.len(), %format, "quantized");
        return Raster::Indexed { indices, palette };
    }

    if options.dither {
        if let Some(levels) = pixel::ChannelLevels::for_format(format) {
            diffuse(&mut img, &levels);
        }
    }
    Raster::Direct(img)
}

/// Serialize `raster` as `format` pixels inside `container`.
pub fn encode(
    raster: &Raster,
    format: PixelFormat,
    container: Container,
) -> Result<Vec<u8>, EncodeError> {
    if !container.supports(format) {
        return Err(EncodeError::Unsupported { container, format });
    }
    match container {
        Container::Bmp => bmp::encode(raster, format),
        Container::Clk => match raster {
            Raster::Direct(img) => clk::encode(img),
            Raster::Indexed { .. } => Err(EncodeError::RasterMismatch {
                format,
                expected: "direct colour",
            }),
        },
        Container::Png => encode_png(raster, format),
    }
}

fn encode_png(raster: &Raster, format: PixelFormat) -> Result<Vec<u8>, EncodeError> {
    let rgba = raster.to_rgba();
    let img = if format.has_alpha() {
        DynamicImage::ImageRgba8(rgba)
    } else {
        DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(rgba).to_rgb8())
    };
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn checker(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        })
    }

    #[test]
    fn rasterize_indexed_builds_indices() {
        let raster = rasterize(checker(4, 2), PixelFormat::Index1, RasterOptions::default());
        match raster {
            Raster::Indexed { indices, palette } => {
                assert_eq!(palette.len(), 2);
                assert_eq!(indices.get_pixel(0, 0)[0], 0);
                assert_eq!(indices.get_pixel(1, 0)[0], 1);
            }
            Raster::Direct(_) => panic!("expected indexed raster"),
        }
    }

    #[test]
    fn rasterize_direct_without_dither_keeps_pixels() {
        let img = RgbaImage::from_pixel(3, 3, Rgba([123, 45, 67, 255]));
        let raster = rasterize(img.clone(), PixelFormat::Rgb565, RasterOptions::default());
        match raster {
            Raster::Direct(out) => assert_eq!(out, img),
            Raster::Indexed { .. } => panic!("expected direct raster"),
        }
    }

    #[test]
    fn rasterize_dither_snaps_channels() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([130, 130, 130, 255]));
        let options = RasterOptions {
            dither: true,
            ..RasterOptions::default()
        };
        let Raster::Direct(out) = rasterize(img, PixelFormat::Argb4444, options) else {
            panic!("expected direct raster");
        };
        // every channel lands on a 4-bit level (multiples of 17)
        for px in out.pixels() {
            for ch in 0..3 {
                assert_eq!(px[ch] % 17, 0, "channel value {}", px[ch]);
            }
        }
    }

    #[test]
    fn rasterize_dither_single_row_does_not_panic() {
        let img = RgbaImage::from_pixel(5, 1, Rgba([100, 100, 100, 255]));
        let options = RasterOptions {
            dither: true,
            ..RasterOptions::default()
        };
        let raster = rasterize(img, PixelFormat::Rgb565, options);
        assert_eq!(raster.dimensions(), (5, 1));
    }

    #[test]
    fn encode_rejects_incompatible_container() {
        let raster = Raster::Direct(checker(2, 2));
        let err = encode(&raster, PixelFormat::Argb1555, Container::Clk).unwrap_err();
        assert!(matches!(err, EncodeError::Unsupported { .. }));
        let err = encode(&raster, PixelFormat::Rgb565, Container::Png).unwrap_err();
        assert!(matches!(err, EncodeError::Unsupported { .. }));
    }

    #[test]
    fn encode_png_indexed_expands_palette() {
        let raster = rasterize(checker(2, 2), PixelFormat::Index1, RasterOptions::default());
        let bytes = encode(&raster, PixelFormat::Index1, Container::Png).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert_eq!(decoded.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(decoded.get_pixel(1, 0).0, [255, 255, 255]);
    }
}
