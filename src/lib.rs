//! # tftbmp
//!
//! Converts ordinary images into files a small TFT clock can blit straight to
//! its display. The firmware wants the panel's own pixel layout on disk, so
//! the converter does the colour work up front: scaling, trimming, palette
//! quantization, and bit packing.
//!
//! # Pipeline
//!
//! ```text
//! inputs  →  scan      →  files to convert (dirs expanded, sorted)
//!         →  imaging   →  RGBA8 (png/jpeg/svg/bmp/clk/raw decode)
//!                          + scale, trim, flatten, adjust, add
//!         →  encode    →  quantize / dither, then bmp | clk | png bytes
//!         →  naming    →  <out>/<stem>[_<row>_<col>].<ext>
//! ```
//!
//! [`process::convert_all`] drives the whole pipeline for a list of inputs
//! and is what the binary's `convert` and `info` subcommands call.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Expands file and directory arguments into the input list |
//! | [`imaging`] | Decoding behind the [`imaging::ImageBackend`] trait, plus pixel transforms and palettes |
//! | [`encode`] | Pixel packing and the BMP / CLK / PNG containers, with readers for the device formats |
//! | [`process`] | Per-input pipeline, tiling, JSON report, inspect and preview |
//! | [`config`] | `tftbmp.toml` loading, merging over stock defaults, and validation |
//! | [`types`] | Pixel formats, containers and image info shared by every stage |
//! | [`naming`] | Output file naming |
//! | [`output`] | CLI output formatting |
//!
//! # Pixel Formats
//!
//! | Format | Bits | Stored in |
//! |--------|------|-----------|
//! | `index1` / `index2` / `index4` / `index8` | 1, 2, 4, 8 | bmp, png |
//! | `rgb565` | 16 | bmp, clk |
//! | `argb1555` / `argb4444` | 16 | bmp |
//! | `rgb888` | 24 | bmp, png |
//! | `argb8888` | 32 | bmp, png |
//!
//! 16-bit BMPs carry explicit channel masks so desktop viewers and the
//! firmware agree on the layout. CLK is a six-byte header followed by raw
//! little-endian RGB565 pixels.

pub mod config;
pub mod encode;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod process;
pub mod scan;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
