//! Pure Rust image loading backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Input | Crate / function |
//! |---|---|
//! | PNG, JPEG, GIF, TIFF, WebP | `image` crate (pure Rust decoders) |
//! | BMP | in-crate reader ([`encode::bmp`](crate::encode::bmp)), then `image` as fallback |
//! | SVG | `resvg` (`usvg` parse + `tiny_skia` raster), demultiplied to RGBA8 |
//! | CLK | in-crate reader ([`encode::clk`](crate::encode::clk)) |
//! | RAW / BIN | headerless little-endian RGB565, size from [`LoadOptions::raw_size`] |

use super::backend::{BackendError, ImageBackend, image_info};
use super::calculations::fit_within;
use super::params::LoadOptions;
use crate::encode::{bmp, clk};
use crate::types::ImageInfo;
use image::{ImageFormat, ImageReader, RgbaImage};
use resvg::{tiny_skia, usvg};
use std::path::Path;
use std::sync::LazyLock;

/// Extensions the `image` crate decodes for us, when the feature is compiled in.
const RASTER_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("png", ImageFormat::Png),
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("gif", ImageFormat::Gif),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
];

/// Formats decoded outside the `image` crate.
const NATIVE_EXTENSIONS: &[&str] = &["bmp", "svg", "clk", "raw", "bin"];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    let mut exts: Vec<&'static str> = RASTER_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect();
    exts.extend_from_slice(NATIVE_EXTENSIONS);
    exts
});

/// Returns the set of input file extensions with working decoders.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Pure Rust backend using the `image` and `resvg` crates.
///
/// See the [module docs](self) for the crate-to-format mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn decode_error(path: &Path, reason: impl ToString) -> BackendError {
    BackendError::Decode {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Rasterize an SVG at its intrinsic size, or fitted into `fit`.
fn render_svg(path: &Path, fit: Option<(u32, u32)>) -> Result<RgbaImage, BackendError> {
    let data = std::fs::read(path)?;
    let tree = usvg::Tree::from_data(&data, &usvg::Options::default())
        .map_err(|e| decode_error(path, e))?;

    let intrinsic = tree.size().to_int_size();
    let natural = (intrinsic.width(), intrinsic.height());
    let (width, height) = match fit {
        Some(bounds) => fit_within(natural, bounds),
        None => natural,
    };
    let mut pixmap = tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| decode_error(path, format!("cannot allocate {width}x{height} canvas")))?;

    let size = tree.size();
    let transform = tiny_skia::Transform::from_scale(
        width as f32 / size.width(),
        height as f32 / size.height(),
    );
    resvg::render(&tree, transform, &mut pixmap.as_mut());
    tracing::debug!(path = %path.display(), width, height, "rendered svg");

    let mut img = RgbaImage::new(width, height);
    for (dst, src) in img.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        *dst = image::Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
    }
    Ok(img)
}

/// Headerless RGB565, little-endian, rows top-down.
fn load_raw(path: &Path, raw_size: Option<(u32, u32)>) -> Result<RgbaImage, BackendError> {
    let (width, height) = raw_size.ok_or_else(|| BackendError::MissingRawSize {
        path: path.to_path_buf(),
    })?;
    let data = std::fs::read(path)?;
    let expected = width as usize * height as usize * 2;
    if data.len() < expected {
        return Err(BackendError::RawSizeMismatch {
            path: path.to_path_buf(),
            width,
            height,
            expected,
            actual: data.len(),
        });
    }
    Ok(clk::decode_rgb565(&data, width, height))
}

/// Device-style BMPs (alpha bitfields, 2 bpp) go through our reader;
/// anything it rejects, such as RLE, is handed to `image`.
fn load_bmp(path: &Path) -> Result<RgbaImage, BackendError> {
    let data = std::fs::read(path)?;
    match bmp::decode(&data) {
        Ok(img) => Ok(img),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "falling back to image crate");
            image::load_from_memory_with_format(&data, ImageFormat::Bmp)
                .map(|img| img.to_rgba8())
                .map_err(|e| decode_error(path, e))
        }
    }
}

fn load_raster(path: &Path) -> Result<RgbaImage, BackendError> {
    ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map(|img| img.to_rgba8())
        .map_err(|e| decode_error(path, e))
}

impl ImageBackend for RustBackend {
    fn load(&self, path: &Path, options: &LoadOptions) -> Result<RgbaImage, BackendError> {
        match extension(path).as_str() {
            "svg" => render_svg(path, options.svg_fit),
            "clk" => Ok(clk::decode(&std::fs::read(path)?)?),
            "raw" | "bin" => load_raw(path, options.raw_size),
            "bmp" => load_bmp(path),
            _ => load_raster(path),
        }
    }

    fn identify(&self, path: &Path, options: &LoadOptions) -> Result<ImageInfo, BackendError> {
        // SVGs are identified at intrinsic size.
        let options = LoadOptions {
            svg_fit: None,
            ..*options
        };
        self.load(path, &options).map(|img| image_info(&img))
    }
}
