//! Image loading and pixel transforms in pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image`, `resvg`, in-crate BMP/CLK readers |
//! | **Identify** | full decode + distinct colour count |
//! | **Scale** | `image::imageops::resize` with `Lanczos3` |
//! | **Brightness / contrast / invert** | `image::imageops` colour ops |
//! | **Quantize** | median cut + k-means ([`quantize`]) |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for geometry (unit testable)
//! - **Parameters**: Data structures describing transforms and load hints
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: Pixel transforms applied in pipeline order
//! - **Quantize**: Palette construction for the indexed formats

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod quantize;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend, count_colors, image_info};
pub use calculations::{Region, TileBox, content_bounds, fit_within, tile_boxes};
pub use operations::apply;
pub use params::{
    AddParams, Adjustments, Background, LoadOptions, TransformParams, TrimMode, parse_size,
};
pub use quantize::{Palette, build_palette};
pub use rust_backend::{RustBackend, supported_input_extensions};
