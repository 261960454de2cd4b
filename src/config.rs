//! Converter configuration module.
//!
//! Handles loading, validating, and merging `tftbmp.toml`. Stock defaults are
//! overridden by the config file, and command-line flags override both.
//!
//! ## Config File Location
//!
//! `tftbmp.toml` is read from the current directory, or from the path given
//! with `--config`. A missing default file is fine; a missing `--config` file
//! is an error.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [output]
//! format = "rgb565"      # rgb565, argb1555, argb4444, index1/2/4/8, rgb888, argb8888
//! container = "bmp"      # bmp, clk, png
//! directory = "."        # where converted files are written
//!
//! [display]
//! width = 135            # box that --scale fits images into
//! height = 240
//!
//! [convert]
//! background = "black"   # name or #rgb / #rrggbb
//! dither = false
//! trim = false
//! fuzzy = false          # fuzzy trim, only with trim = true
//! scale = false
//!
//! [tiles]
//! rows = 1
//! cols = 1
//!
//! [adjust]
//! brightness = 0         # -255..=255, added to each channel
//! contrast = 0.0         # percent, -100..=100
//! invert = false
//!
//! [quantize]
//! kmeans = 128           # k-means refinement rounds for indexed formats
//!
//! [processing]
//! max_processes = 4      # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse; override just the values you want:
//!
//! ```toml
//! [output]
//! format = "index4"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::Background;
use crate::types::{Container, PixelFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "tftbmp.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Config file not found: {0}")]
    NotFound(String),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Converter configuration loaded from `tftbmp.toml`.
///
/// All fields have sensible defaults. Config files need only specify the
/// values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    /// Pixel format, container and destination.
    pub output: OutputConfig,
    /// Display dimensions used by scaling.
    pub display: DisplayConfig,
    /// Per-image conversion switches.
    pub convert: ConvertConfig,
    /// Tile grid.
    pub tiles: TilesConfig,
    /// Tone adjustments.
    pub adjust: AdjustConfig,
    /// Palette quantization.
    pub quantize: QuantizeConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl ToolConfig {
    /// Validate config values are within acceptable ranges and compatible
    /// with each other.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let format = self.output.format;
        let container = self.output.container;
        if !container.supports(format) {
            let reason = if format.is_16bit() {
                format!("{format} output is only supported in bmp files")
            } else {
                format!("{container} files cannot hold {format} pixels")
            };
            return Err(ConfigError::Validation(reason));
        }
        if self.display.width == 0 || self.display.height == 0 {
            return Err(ConfigError::Validation(
                "display.width and display.height must be non-zero".into(),
            ));
        }
        if self.tiles.rows == 0 || self.tiles.cols == 0 {
            return Err(ConfigError::Validation(
                "tiles.rows and tiles.cols must be at least 1".into(),
            ));
        }
        if !(-255..=255).contains(&self.adjust.brightness) {
            return Err(ConfigError::Validation(
                "adjust.brightness must be -255..=255".into(),
            ));
        }
        if !(-100.0..=100.0).contains(&self.adjust.contrast) {
            return Err(ConfigError::Validation(
                "adjust.contrast must be -100..=100".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        self.background()?;
        Ok(())
    }

    /// Parsed `convert.background`.
    pub fn background(&self) -> Result<Background, ConfigError> {
        self.convert
            .background
            .parse()
            .map_err(|e| ConfigError::Validation(format!("convert.background: {e}")))
    }
}

/// Output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Pixel encoding of written files.
    pub format: PixelFormat,
    /// File container.
    pub container: Container,
    /// Directory converted files are written to.
    pub directory: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: PixelFormat::Rgb565,
            container: Container::Bmp,
            directory: ".".to_string(),
        }
    }
}

/// Target display size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 135,
            height: 240,
        }
    }
}

/// Per-image conversion switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConvertConfig {
    /// Colour transparent pixels are composited over when the output has no alpha.
    pub background: String,
    /// Error-diffuse when reducing colour depth.
    pub dither: bool,
    /// Crop to content.
    pub trim: bool,
    /// Ignore small differences when trimming.
    pub fuzzy: bool,
    /// Fit into the display box.
    pub scale: bool,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            background: "black".to_string(),
            dither: false,
            trim: false,
            fuzzy: false,
            scale: false,
        }
    }
}

/// Tile grid; a `1 x 1` grid converts the whole image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TilesConfig {
    pub rows: u32,
    pub cols: u32,
}

impl Default for TilesConfig {
    fn default() -> Self {
        Self { rows: 1, cols: 1 }
    }
}

/// Tone adjustments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdjustConfig {
    pub brightness: i32,
    pub contrast: f32,
    pub invert: bool,
}

/// Palette quantization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QuantizeConfig {
    /// Maximum k-means refinement rounds after median cut.
    pub kmeans: u32,
}

impl Default for QuantizeConfig {
    fn default() -> Self {
        Self { kmeans: 128 }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel conversion workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ToolConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ToolConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ToolConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load `tftbmp.toml` from `dir`, falling back to stock defaults when absent.
pub fn load_config(dir: &Path) -> Result<ToolConfig, ConfigError> {
    let overlay = load_raw_config(&dir.join(CONFIG_FILE_NAME))?;
    resolve_config(stock_defaults_value()?, overlay)
}

/// Load an explicitly named config file. Unlike [`load_config`], the file
/// must exist.
pub fn load_config_file(path: &Path) -> Result<ToolConfig, ConfigError> {
    let overlay = load_raw_config(path)?
        .ok_or_else(|| ConfigError::NotFound(path.display().to_string()))?;
    resolve_config(stock_defaults_value()?, Some(overlay))
}

/// Returns a fully-commented stock `tftbmp.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# tftbmp Configuration
# ====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Command-line flags override anything set here.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
# Pixel encoding: rgb565, argb1555, argb4444, index1, index2, index4, index8,
# rgb888, argb8888. The 16-bit encodings need the bmp container
# (clk carries rgb565 only).
format = "rgb565"

# File container: bmp, clk or png.
container = "bmp"

# Directory converted files are written to.
directory = "."

# ---------------------------------------------------------------------------
# Display
# ---------------------------------------------------------------------------
[display]
# Box that scaling fits images into, keeping aspect ratio.
width = 135
height = 240

# ---------------------------------------------------------------------------
# Conversion
# ---------------------------------------------------------------------------
[convert]
# Colour transparent pixels are composited over when the output format
# has no alpha. A name (black, white, red, ...) or #rgb / #rrggbb.
background = "black"

# Error-diffusion dithering when reducing colour depth.
dither = false

# Crop to the content bounding box (after scaling).
trim = false

# Ignore per-channel differences of 100 or less when trimming.
fuzzy = false

# Fit each image or tile into the display box.
scale = false

# ---------------------------------------------------------------------------
# Tiling
# ---------------------------------------------------------------------------
[tiles]
# Split each input into rows x cols tiles, named <stem>_<row>_<col>.
rows = 1
cols = 1

# ---------------------------------------------------------------------------
# Adjustments
# ---------------------------------------------------------------------------
[adjust]
# Added to every colour channel (-255..=255).
brightness = 0

# Contrast change in percent (-100..=100).
contrast = 0.0

# Invert colour channels.
invert = false

# ---------------------------------------------------------------------------
# Quantization (indexed formats)
# ---------------------------------------------------------------------------
[quantize]
# k-means refinement rounds after median cut.
kmeans = 128

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel conversion workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
