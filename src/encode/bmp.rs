//! BMP container: header construction, row packing, and a reader.
//!
//! ## Layout written
//!
//! ```text
//! offset  size  field
//! 0       14    file header: "BM", file size, reserved, pixel data offset
//! 14      40    BITMAPINFOHEADER
//! 54      12    RGB565 masks (compression 3, BI_BITFIELDS)
//!    or   16    ARGB masks   (compression 6, BI_ALPHABITFIELDS)
//!    or   4*n   palette, B,G,R,0 per entry (indexed formats)
//! ...           pixel rows, bottom-up, each padded to a 4-byte stride
//! ```
//!
//! Sub-byte formats pack the leftmost pixel into the most significant bits.
//! The reader accepts everything the writer produces plus the common
//! uncompressed variants, mirroring what the clock firmware's loader
//! handles. RLE files are left to the `image` crate.

use super::pixel::{argb1555, argb4444, rgb565};
use super::{EncodeError, Raster};
use crate::imaging::quantize::Palette;
use crate::types::{Container, PixelFormat};
use image::{Rgb, Rgba, RgbaImage};

pub const FILE_HEADER_LEN: u32 = 14;
pub const INFO_HEADER_LEN: u32 = 40;
/// BITMAPV5HEADER, the largest info header defined.
pub const MAX_INFO_HEADER_LEN: u32 = 124;
/// 72 DPI.
pub const PIXELS_PER_METER: i32 = 2835;

pub const BI_RGB: u32 = 0;
pub const BI_BITFIELDS: u32 = 3;
pub const BI_ALPHABITFIELDS: u32 = 6;

const MAGIC: [u8; 2] = *b"BM";

/// Bit masks for each channel of a bitfield-encoded pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMasks {
    pub red: u32,
    pub green: u32,
    pub blue: u32,
    pub alpha: u32,
}

impl ChannelMasks {
    /// Masks written for a direct-colour format, `None` when the format is
    /// stored without bitfields.
    pub fn for_format(format: PixelFormat) -> Option<Self> {
        let masks = match format {
            PixelFormat::Rgb565 => Self {
                red: 0xF800,
                green: 0x07E0,
                blue: 0x001F,
                alpha: 0,
            },
            PixelFormat::Argb1555 => Self {
                red: 0x7C00,
                green: 0x03E0,
                blue: 0x001F,
                alpha: 0x8000,
            },
            PixelFormat::Argb4444 => Self {
                red: 0x0F00,
                green: 0x00F0,
                blue: 0x000F,
                alpha: 0xF000,
            },
            PixelFormat::Argb8888 => Self {
                red: 0x00FF_0000,
                green: 0x0000_FF00,
                blue: 0x0000_00FF,
                alpha: 0xFF00_0000,
            },
            _ => return None,
        };
        Some(masks)
    }

    /// Implicit masks of an uncompressed 16 bpp file.
    pub fn rgb555() -> Self {
        Self {
            red: 0x7C00,
            green: 0x03E0,
            blue: 0x001F,
            alpha: 0,
        }
    }

    fn compression(&self) -> u32 {
        if self.alpha == 0 {
            BI_BITFIELDS
        } else {
            BI_ALPHABITFIELDS
        }
    }

    fn byte_len(&self) -> u32 {
        if self.alpha == 0 { 12 } else { 16 }
    }

    fn decode(&self, value: u32) -> Rgba<u8> {
        let alpha = if self.alpha == 0 {
            255
        } else {
            extract(value, self.alpha)
        };
        Rgba([
            extract(value, self.red),
            extract(value, self.green),
            extract(value, self.blue),
            alpha,
        ])
    }
}

fn extract(value: u32, mask: u32) -> u8 {
    if mask == 0 {
        return 0;
    }
    let shift = mask.trailing_zeros();
    let max = (mask >> shift) as u64;
    let level = ((value & mask) >> shift) as u64;
    ((level * 255 + max / 2) / max) as u8
}

/// Bytes per row including padding to a multiple of four.
pub fn row_stride(bits_per_pixel: u16, width: u32) -> usize {
    ((bits_per_pixel as usize * width as usize + 31) >> 5) * 4
}

/// Parsed BMP headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BmpHeader {
    pub file_size: u32,
    pub data_offset: u32,
    pub info_size: u32,
    pub width: i32,
    /// Positive for bottom-up rows, negative for top-down.
    pub height: i32,
    pub planes: u16,
    pub bits_per_pixel: u16,
    pub compression: u32,
    pub image_size: u32,
    pub colors_used: u32,
    pub masks: Option<ChannelMasks>,
    pub palette: Vec<Rgb<u8>>,
}

impl BmpHeader {
    /// Build the headers for a `width` x `height` image in `format`.
    pub fn for_format(
        width: u32,
        height: u32,
        format: PixelFormat,
        palette: Option<&Palette>,
    ) -> Result<Self, EncodeError> {
        if width == 0 || height == 0 {
            return Err(EncodeError::EmptyImage);
        }
        if width > i32::MAX as u32 || height > i32::MAX as u32 {
            return Err(EncodeError::TooLarge {
                width,
                height,
                container: Container::Bmp,
            });
        }

        let bpp = format.bits_per_pixel();
        let masks = ChannelMasks::for_format(format);
        let palette: Vec<Rgb<u8>> = match (format.palette_size(), palette) {
            (Some(max), Some(p)) if p.len() > max => {
                return Err(EncodeError::PaletteTooLarge {
                    len: p.len(),
                    max,
                    format,
                });
            }
            (Some(_), Some(p)) => p.colors().to_vec(),
            (Some(_), None) => {
                return Err(EncodeError::RasterMismatch {
                    format,
                    expected: "palette-indexed",
                });
            }
            (None, _) => Vec::new(),
        };

        let extra = match &masks {
            Some(m) => m.byte_len(),
            None => palette.len() as u32 * 4,
        };
        let data_offset = FILE_HEADER_LEN + INFO_HEADER_LEN + extra;
        let image_size = u32::try_from(row_stride(bpp, width) as u64 * height as u64)
            .map_err(|_| EncodeError::TooLarge {
                width,
                height,
                container: Container::Bmp,
            })?;
        let file_size =
            data_offset
                .checked_add(image_size)
                .ok_or(EncodeError::TooLarge {
                    width,
                    height,
                    container: Container::Bmp,
                })?;

        Ok(Self {
            file_size,
            data_offset,
            info_size: INFO_HEADER_LEN,
            width: width as i32,
            height: height as i32,
            planes: 1,
            bits_per_pixel: bpp,
            compression: masks.map(|m| m.compression()).unwrap_or(BI_RGB),
            image_size,
            colors_used: palette.len() as u32,
            masks,
            palette,
        })
    }

    pub fn top_down(&self) -> bool {
        self.height < 0
    }

    pub fn stride(&self) -> usize {
        row_stride(self.bits_per_pixel, self.width.unsigned_abs())
    }

    /// Serialize file header, info header, then masks or palette.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data_offset as usize);
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&self.file_size.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&self.data_offset.to_le_bytes());

        out.extend_from_slice(&self.info_size.to_le_bytes());
        out.extend_from_slice(&self.width.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        out.extend_from_slice(&self.planes.to_le_bytes());
        out.extend_from_slice(&self.bits_per_pixel.to_le_bytes());
        out.extend_from_slice(&self.compression.to_le_bytes());
        out.extend_from_slice(&self.image_size.to_le_bytes());
        out.extend_from_slice(&PIXELS_PER_METER.to_le_bytes());
        out.extend_from_slice(&PIXELS_PER_METER.to_le_bytes());
        out.extend_from_slice(&self.colors_used.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());

        if let Some(m) = &self.masks {
            out.extend_from_slice(&m.red.to_le_bytes());
            out.extend_from_slice(&m.green.to_le_bytes());
            out.extend_from_slice(&m.blue.to_le_bytes());
            if m.alpha != 0 {
                out.extend_from_slice(&m.alpha.to_le_bytes());
            }
        }
        for c in &self.palette {
            out.extend_from_slice(&[c[2], c[1], c[0], 0]);
        }
        out
    }

    /// Short human-readable name of the pixel layout.
    pub fn describe(&self) -> String {
        match (self.bits_per_pixel, self.masks) {
            (16, Some(m)) if m.alpha == 0x8000 => "argb1555".to_string(),
            (16, Some(m)) if m.alpha == 0xF000 => "argb4444".to_string(),
            (16, Some(m)) if m.green == 0x07E0 => "rgb565".to_string(),
            (16, _) => "rgb555".to_string(),
            (24, _) => "rgb888".to_string(),
            (32, Some(m)) if m.alpha != 0 => "argb8888".to_string(),
            (32, _) => "xrgb8888".to_string(),
            (bpp, _) => format!("indexed {bpp} bpp, {} colours", self.palette.len()),
        }
    }
}

fn pack_direct(img: &RgbaImage, format: PixelFormat, y: u32, row: &mut [u8]) {
    for (x, px) in (0..img.width()).map(|x| (x as usize, *img.get_pixel(x, y))) {
        match format {
            PixelFormat::Rgb565 => {
                row[x * 2..x * 2 + 2].copy_from_slice(&rgb565(px[0], px[1], px[2]).to_le_bytes())
            }
            PixelFormat::Argb1555 => {
                row[x * 2..x * 2 + 2].copy_from_slice(&argb1555(px).to_le_bytes())
            }
            PixelFormat::Argb4444 => {
                row[x * 2..x * 2 + 2].copy_from_slice(&argb4444(px).to_le_bytes())
            }
            PixelFormat::Rgb888 => row[x * 3..x * 3 + 3].copy_from_slice(&[px[2], px[1], px[0]]),
            PixelFormat::Argb8888 => {
                row[x * 4..x * 4 + 4].copy_from_slice(&[px[2], px[1], px[0], px[3]])
            }
            _ => {}
        }
    }
}

/// Pack indices MSB-first; `bpp` is 1, 2, 4 or 8.
fn pack_indices(indices: &image::GrayImage, bpp: u16, y: u32, row: &mut [u8]) {
    let bpp = bpp as usize;
    let per_byte = 8 / bpp;
    let mask = ((1u16 << bpp) - 1) as u8;
    for x in 0..indices.width() as usize {
        let index = indices.get_pixel(x as u32, y)[0] & mask;
        let shift = 8 - bpp * (x % per_byte + 1);
        row[x / per_byte] |= index << shift;
    }
}

/// Encode `raster` as a BMP file carrying `format` pixels.
pub fn encode(raster: &Raster, format: PixelFormat) -> Result<Vec<u8>, EncodeError> {
    let (width, height) = raster.dimensions();
    let palette = match raster {
        Raster::Indexed { palette, .. } => Some(palette),
        Raster::Direct(_) => None,
    };
    match (raster, format.is_indexed()) {
        (Raster::Direct(_), true) => {
            return Err(EncodeError::RasterMismatch {
                format,
                expected: "palette-indexed",
            });
        }
        (Raster::Indexed { .. }, false) => {
            return Err(EncodeError::RasterMismatch {
                format,
                expected: "direct colour",
            });
        }
        _ => {}
    }

    let header = BmpHeader::for_format(width, height, format, palette)?;
    let stride = header.stride();
    let mut out = header.to_bytes();
    out.reserve(header.image_size as usize);

    let mut row = vec![0u8; stride];
    for y in (0..height).rev() {
        row.fill(0);
        match raster {
            Raster::Direct(img) => pack_direct(img, format, y, &mut row),
            Raster::Indexed { indices, .. } => {
                pack_indices(indices, header.bits_per_pixel, y, &mut row)
            }
        }
        out.extend_from_slice(&row);
    }
    Ok(out)
}

fn malformed(reason: impl Into<String>) -> EncodeError {
    EncodeError::Malformed {
        kind: "BMP",
        reason: reason.into(),
    }
}

fn read_u16(data: &[u8], at: usize) -> Result<u16, EncodeError> {
    data.get(at..at + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or_else(|| malformed(format!("truncated at byte {at}")))
}

fn read_u32(data: &[u8], at: usize) -> Result<u32, EncodeError> {
    data.get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| malformed(format!("truncated at byte {at}")))
}

/// Whether `data` starts with the BMP magic.
pub fn is_bmp(data: &[u8]) -> bool {
    data.starts_with(&MAGIC)
}

/// Parse the headers, masks and palette of a BMP file.
pub fn read_header(data: &[u8]) -> Result<BmpHeader, EncodeError> {
    if !is_bmp(data) {
        return Err(malformed("missing BM magic"));
    }
    let file_size = read_u32(data, 2)?;
    let data_offset = read_u32(data, 10)?;
    let info_size = read_u32(data, 14)?;
    if !(INFO_HEADER_LEN..=MAX_INFO_HEADER_LEN).contains(&info_size) {
        return Err(malformed(format!("unsupported info header size {info_size}")));
    }
    let width = read_u32(data, 18)? as i32;
    let height = read_u32(data, 22)? as i32;
    let planes = read_u16(data, 26)?;
    let bits_per_pixel = read_u16(data, 28)?;
    let compression = read_u32(data, 30)?;
    let image_size = read_u32(data, 34)?;
    let colors_used = read_u32(data, 46)?;

    if planes != 1 {
        return Err(malformed(format!("bad colour planes {planes}")));
    }
    if !matches!(bits_per_pixel, 1 | 2 | 4 | 8 | 16 | 24 | 32) {
        return Err(malformed(format!("bad bit depth {bits_per_pixel}")));
    }
    if !matches!(compression, BI_RGB | BI_BITFIELDS | BI_ALPHABITFIELDS) {
        return Err(malformed(format!("unsupported compression {compression}")));
    }
    if width <= 0 || height == 0 {
        return Err(malformed(format!("bad dimensions {width}x{height}")));
    }

    let info_end = (FILE_HEADER_LEN + info_size) as usize;
    // Masks live inside V2+ headers, or right after a 40-byte header.
    let mask_at = (FILE_HEADER_LEN + INFO_HEADER_LEN) as usize;
    let mut after_masks = info_end;
    let masks = match compression {
        BI_BITFIELDS | BI_ALPHABITFIELDS => {
            let with_alpha = compression == BI_ALPHABITFIELDS || info_size >= 56;
            let masks = ChannelMasks {
                red: read_u32(data, mask_at)?,
                green: read_u32(data, mask_at + 4)?,
                blue: read_u32(data, mask_at + 8)?,
                alpha: if with_alpha {
                    read_u32(data, mask_at + 12)?
                } else {
                    0
                },
            };
            if info_size == INFO_HEADER_LEN {
                after_masks += if with_alpha { 16 } else { 12 };
            }
            Some(masks)
        }
        _ if bits_per_pixel == 16 => Some(ChannelMasks::rgb555()),
        _ => None,
    };

    let mut palette = Vec::new();
    if bits_per_pixel <= 8 {
        let count = if colors_used == 0 {
            1usize << bits_per_pixel
        } else {
            colors_used as usize
        };
        if count > 1 << bits_per_pixel {
            return Err(malformed(format!("{count} palette entries for {bits_per_pixel} bpp")));
        }
        for i in 0..count {
            let at = after_masks + i * 4;
            let entry = data
                .get(at..at + 4)
                .ok_or_else(|| malformed("truncated palette"))?;
            palette.push(Rgb([entry[2], entry[1], entry[0]]));
        }
    }

    Ok(BmpHeader {
        file_size,
        data_offset,
        info_size,
        width,
        height,
        planes,
        bits_per_pixel,
        compression,
        image_size,
        colors_used,
        masks,
        palette,
    })
}

/// Decode a BMP file into RGBA pixels.
pub fn decode(data: &[u8]) -> Result<RgbaImage, EncodeError> {
    let header = read_header(data)?;
    let width = header.width.unsigned_abs();
    let height = header.height.unsigned_abs();
    let stride = header.stride();
    let start = header.data_offset as usize;
    let needed = stride
        .checked_mul(height as usize)
        .and_then(|n| n.checked_add(start))
        .ok_or_else(|| malformed("pixel data size overflows"))?;
    if data.len() < needed {
        return Err(malformed(format!(
            "pixel data truncated: need {needed} bytes, have {}",
            data.len()
        )));
    }

    let bpp = header.bits_per_pixel as usize;
    let mut img = RgbaImage::new(width, height);
    for file_row in 0..height as usize {
        let row = &data[start + file_row * stride..start + (file_row + 1) * stride];
        let y = if header.top_down() {
            file_row as u32
        } else {
            height - 1 - file_row as u32
        };
        for x in 0..width as usize {
            let px = match bpp {
                1 | 2 | 4 | 8 => {
                    let per_byte = 8 / bpp;
                    let shift = 8 - bpp * (x % per_byte + 1);
                    let index = ((row[x / per_byte] >> shift) & ((1u16 << bpp) - 1) as u8) as usize;
                    let c = header.palette.get(index).ok_or_else(|| {
                        malformed(format!("palette index {index} out of range"))
                    })?;
                    Rgba([c[0], c[1], c[2], 255])
                }
                16 => {
                    let value = u16::from_le_bytes([row[x * 2], row[x * 2 + 1]]) as u32;
                    header
                        .masks
                        .unwrap_or_else(ChannelMasks::rgb555)
                        .decode(value)
                }
                24 => Rgba([row[x * 3 + 2], row[x * 3 + 1], row[x * 3], 255]),
                _ => {
                    let b = &row[x * 4..x * 4 + 4];
                    match header.masks {
                        Some(m) => m.decode(u32::from_le_bytes([b[0], b[1], b[2], b[3]])),
                        None => Rgba([b[2], b[1], b[0], 255]),
                    }
                }
            };
            img.put_pixel(x as u32, y, px);
        }
    }
    Ok(img)
}
