//! Image loading backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations the pipeline needs
//! from a decoder: load pixels and identify an image.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend): `image` for raster
//! formats, `resvg` for SVG, and the in-crate readers for device files.

use super::params::LoadOptions;
use crate::encode::EncodeError;
use crate::types::ImageInfo;
use image::RgbaImage;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
    #[error("Failed to read device file: {0}")]
    DeviceFile(#[from] EncodeError),
    #[error("{path}: raw input needs --raw-size WIDTHxHEIGHT")]
    MissingRawSize { path: PathBuf },
    #[error("{path}: raw data is {actual} bytes, {width}x{height} RGB565 needs {expected}")]
    RawSizeMismatch {
        path: PathBuf,
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// Count distinct RGBA values.
pub fn count_colors(img: &RgbaImage) -> usize {
    img.pixels().map(|p| p.0).collect::<HashSet<_>>().len()
}

pub fn image_info(img: &RgbaImage) -> ImageInfo {
    ImageInfo {
        width: img.width(),
        height: img.height(),
        colors: count_colors(img),
    }
}

/// Trait for image loading backends.
///
/// Everything downstream of loading works on `RgbaImage`, so swapping the
/// backend (for a mock in tests) never touches the pipeline.
pub trait ImageBackend: Sync {
    /// Decode `path` into RGBA8 pixels.
    fn load(&self, path: &Path, options: &LoadOptions) -> Result<RgbaImage, BackendError>;

    /// Dimensions and colour count of `path`.
    fn identify(&self, path: &Path, options: &LoadOptions) -> Result<ImageInfo, BackendError>;
}
