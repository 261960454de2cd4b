//! Output file naming.
//!
//! Converted files keep the input's stem and take the container's extension:
//!
//! - `clock/digit3.png` → `<out>/digit3.bmp`
//! - tile row 1, column 0 of `face.svg` → `<out>/face_1_0.bmp`
//!
//! Rows and columns are zero-based, matching the order the firmware loads
//! tiles in.

use crate::types::Container;
use std::path::{Path, PathBuf};

/// File stem of `source`, or `None` for paths like `/` or `..`.
pub fn source_stem(source: &Path) -> Option<String> {
    source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
}

/// `<output_dir>/<stem>.<ext>`.
pub fn output_path(output_dir: &Path, stem: &str, container: Container) -> PathBuf {
    output_dir.join(format!("{stem}.{}", container.extension()))
}

/// `<output_dir>/<stem>_<row>_<col>.<ext>`.
pub fn tile_path(
    output_dir: &Path,
    stem: &str,
    row: u32,
    col: u32,
    container: Container,
) -> PathBuf {
    output_dir.join(format!("{stem}_{row}_{col}.{}", container.extension()))
}
