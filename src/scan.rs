//! Input discovery.
//!
//! Expands command-line arguments into the list of files to convert:
//!
//! - A **file** argument is used as-is, whatever its extension, so odd
//!   names like `face.dat` can still be converted explicitly.
//! - A **directory** argument yields the supported image files inside it,
//!   sorted by path. Subdirectories are only entered with `recursive`.
//! - Hidden entries (dot-files) are skipped inside directories.
//!
//! Argument order is preserved; a file named twice is converted once.

use crate::imaging::supported_input_extensions;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("No such file or directory: {0}")]
    NotFound(PathBuf),
    #[error("You must specify one or more files to convert")]
    NoInputs,
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

/// Whether `path` has an extension we can decode.
pub fn is_supported_image(path: &Path) -> bool {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    supported_input_extensions().contains(&ext.as_str())
}

fn collect_dir(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>, ScanError> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .max_depth(max_depth)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()));
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() && is_supported_image(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Expand file and directory arguments into the files to convert.
pub fn expand_inputs(args: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>, ScanError> {
    let mut seen = HashSet::new();
    let mut inputs = Vec::new();
    for arg in args {
        let found = if arg.is_dir() {
            collect_dir(arg, recursive)?
        } else if arg.is_file() {
            vec![arg.clone()]
        } else {
            return Err(ScanError::NotFound(arg.clone()));
        };
        for path in found {
            if seen.insert(path.clone()) {
                inputs.push(path);
            }
        }
    }
    if inputs.is_empty() {
        return Err(ScanError::NoInputs);
    }
    tracing::debug!(count = inputs.len(), "expanded inputs");
    Ok(inputs)
}
