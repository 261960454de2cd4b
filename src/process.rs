//! The conversion pipeline.
//!
//! Takes the expanded input list and writes one device file per input, or one
//! per tile when a grid is configured.
//!
//! ## Per-input flow
//!
//! ```text
//! load ─┬─ info only ──────────────────────────────────────────→ report line
//!       └─ split into tiles? ─→ for each tile / whole image:
//!            scale → trim → flatten → adjust → add      (imaging::apply)
//!            → quantize / dither                         (encode::rasterize)
//!            → pack into bmp / clk / png                 (encode::encode)
//!            → <out>/<stem>[_<row>_<col>].<ext>
//! ```
//!
//! Tiling happens when `rows > 1` or `cols > 1`. Tile edges fall at
//! `i * size / n`, so the tiles cover the source exactly.
//!
//! ## Parallel Processing
//!
//! Inputs are converted in parallel using [rayon](https://docs.rs/rayon). The
//! first failure aborts the run. Progress is reported per input over an
//! optional channel so the binary can print while work continues.

use crate::config::{ConfigError, ToolConfig};
use crate::encode::{self, EncodeError, RasterOptions, bmp, clk};
use crate::imaging::{
    self, AddParams, Adjustments, Background, BackendError, ImageBackend, LoadOptions,
    TransformParams, TrimMode, image_info, tile_boxes,
};
use crate::naming;
use crate::types::{Container, ImageInfo, PixelFormat};
use image::{ImageFormat, RgbaImage, imageops};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Image loading failed: {0}")]
    Imaging(#[from] BackendError),
    #[error("Encoding failed: {0}")]
    Encode(#[from] EncodeError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("{path}: a {rows}x{cols} tile grid does not fit a {width}x{height} image")]
    TileGridTooLarge {
        path: PathBuf,
        rows: u32,
        cols: u32,
        width: u32,
        height: u32,
    },
    #[error("Cannot derive an output file name from {0}")]
    NoStem(PathBuf),
    #[error("{0} is neither a BMP nor a CLK file")]
    UnknownDeviceFile(PathBuf),
    #[error("{output} would be written by more than one input: {}", join_paths(.sources))]
    OutputCollision {
        output: PathBuf,
        sources: Vec<PathBuf>,
    },
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Overlay image for the add step, loaded once per run.
#[derive(Debug, Clone, PartialEq)]
pub struct AddSource {
    pub path: PathBuf,
    pub scale: f32,
    pub offset: i32,
}

/// Everything one conversion run needs, resolved from config and flags.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertOptions {
    pub format: PixelFormat,
    pub container: Container,
    pub output_dir: PathBuf,
    /// Box used by `scale`.
    pub display: (u32, u32),
    pub scale: bool,
    pub trim: Option<TrimMode>,
    pub background: Background,
    pub adjust: Adjustments,
    pub add: Option<AddSource>,
    pub dither: bool,
    pub kmeans: u32,
    pub rows: u32,
    pub cols: u32,
    pub raw_size: Option<(u32, u32)>,
    /// Only report input info; write nothing.
    pub info_only: bool,
}

impl ConvertOptions {
    /// Build options from a merged, validated config.
    pub fn from_config(config: &ToolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let trim = match (config.convert.trim, config.convert.fuzzy) {
            (false, _) => None,
            (true, false) => Some(TrimMode::Exact),
            (true, true) => Some(TrimMode::Fuzzy),
        };
        Ok(Self {
            format: config.output.format,
            container: config.output.container,
            output_dir: PathBuf::from(&config.output.directory),
            display: (config.display.width, config.display.height),
            scale: config.convert.scale,
            trim,
            background: config.background()?,
            adjust: Adjustments {
                brightness: config.adjust.brightness,
                contrast: config.adjust.contrast,
                invert: config.adjust.invert,
            },
            add: None,
            dither: config.convert.dither,
            kmeans: config.quantize.kmeans,
            rows: config.tiles.rows,
            cols: config.tiles.cols,
            raw_size: None,
            info_only: false,
        })
    }

    pub fn is_tiled(&self) -> bool {
        self.rows > 1 || self.cols > 1
    }

    /// SVGs are rasterized straight at the display size when a whole image
    /// is scaled; tiles are cut from the intrinsic rendering instead.
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            raw_size: self.raw_size,
            svg_fit: (self.scale && !self.is_tiled()).then_some(self.display),
        }
    }

    pub fn transform_params(&self, add: Option<AddParams>) -> TransformParams {
        TransformParams {
            fit: self.scale.then_some(self.display),
            trim: self.trim,
            flatten: (!self.format.has_alpha()).then_some(self.background),
            adjust: self.adjust,
            add,
        }
    }

    pub fn raster_options(&self) -> RasterOptions {
        RasterOptions {
            dither: self.dither,
            kmeans_iterations: self.kmeans,
        }
    }
}

/// One written file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvertedFile {
    pub source: PathBuf,
    pub output: PathBuf,
    /// `(row, col)` for tiles.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tile: Option<(u32, u32)>,
    pub format: PixelFormat,
    pub container: Container,
    pub width: u32,
    pub height: u32,
    pub colors: usize,
    pub bytes: usize,
}

/// Progress for one finished input.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessEvent {
    pub source: PathBuf,
    /// The input as loaded, before any transform.
    pub info: ImageInfo,
    /// Empty in info-only mode.
    pub outputs: Vec<ConvertedFile>,
}

/// Transform, quantize and encode one image or tile.
///
/// Returns the file bytes and the info of the pixels actually written.
pub fn convert_image(
    img: RgbaImage,
    options: &ConvertOptions,
    params: &TransformParams,
) -> Result<(Vec<u8>, ImageInfo), ProcessError> {
    let img = imaging::apply(img, params);
    let raster = encode::rasterize(img, options.format, options.raster_options());
    let info = image_info(&raster.to_rgba());
    let bytes = encode::encode(&raster, options.format, options.container)?;
    Ok((bytes, info))
}

fn write_converted(
    img: RgbaImage,
    source: &Path,
    output: PathBuf,
    tile: Option<(u32, u32)>,
    options: &ConvertOptions,
    params: &TransformParams,
) -> Result<ConvertedFile, ProcessError> {
    let (bytes, info) = convert_image(img, options, params)?;
    std::fs::write(&output, &bytes)?;
    tracing::debug!(output = %output.display(), bytes = bytes.len(), "wrote");
    Ok(ConvertedFile {
        source: source.to_path_buf(),
        output,
        tile,
        format: options.format,
        container: options.container,
        width: info.width,
        height: info.height,
        colors: info.colors,
        bytes: bytes.len(),
    })
}

fn convert_input(
    backend: &impl ImageBackend,
    source: &Path,
    options: &ConvertOptions,
    params: &TransformParams,
) -> Result<ProcessEvent, ProcessError> {
    let load = options.load_options();
    if options.info_only {
        let info = backend.identify(source, &load)?;
        return Ok(ProcessEvent {
            source: source.to_path_buf(),
            info,
            outputs: Vec::new(),
        });
    }

    let stem =
        naming::source_stem(source).ok_or_else(|| ProcessError::NoStem(source.to_path_buf()))?;
    let img = backend.load(source, &load)?;
    let info = image_info(&img);
    let (width, height) = img.dimensions();

    let mut outputs = Vec::new();
    if options.is_tiled() {
        if options.rows > height || options.cols > width {
            return Err(ProcessError::TileGridTooLarge {
                path: source.to_path_buf(),
                rows: options.rows,
                cols: options.cols,
                width,
                height,
            });
        }
        for tile in tile_boxes(width, height, options.rows, options.cols) {
            let cell = imageops::crop_imm(&img, tile.x, tile.y, tile.width, tile.height).to_image();
            let output = naming::tile_path(
                &options.output_dir,
                &stem,
                tile.row,
                tile.col,
                options.container,
            );
            outputs.push(write_converted(
                cell,
                source,
                output,
                Some((tile.row, tile.col)),
                options,
                params,
            )?);
        }
    } else {
        let output = naming::output_path(&options.output_dir, &stem, options.container);
        outputs.push(write_converted(img, source, output, None, options, params)?);
    }

    Ok(ProcessEvent {
        source: source.to_path_buf(),
        info,
        outputs,
    })
}

/// Every path a conversion of `stem` writes, tiles included.
pub fn output_paths(stem: &str, options: &ConvertOptions) -> Vec<PathBuf> {
    if !options.is_tiled() {
        return vec![naming::output_path(
            &options.output_dir,
            stem,
            options.container,
        )];
    }
    (0..options.rows)
        .flat_map(|row| {
            (0..options.cols).map(move |col| {
                naming::tile_path(&options.output_dir, stem, row, col, options.container)
            })
        })
        .collect()
}

/// Fail when two inputs would write the same file, e.g. `a/digit.png` and
/// `b/digit.svg`. Runs before any work so nothing is half written.
pub fn check_output_collisions(
    inputs: &[PathBuf],
    options: &ConvertOptions,
) -> Result<(), ProcessError> {
    let mut owners: HashMap<PathBuf, usize> = HashMap::new();
    for (index, source) in inputs.iter().enumerate() {
        let stem = naming::source_stem(source)
            .ok_or_else(|| ProcessError::NoStem(source.to_path_buf()))?;
        for output in output_paths(&stem, options) {
            match owners.get(&output) {
                Some(&first) if first != index => {
                    return Err(ProcessError::OutputCollision {
                        output,
                        sources: vec![inputs[first].clone(), source.clone()],
                    });
                }
                Some(_) => {}
                None => {
                    owners.insert(output, index);
                }
            }
        }
    }
    Ok(())
}

/// Convert every input, in parallel.
///
/// Returns the written files in input order, or the first error.
pub fn convert_all(
    backend: &impl ImageBackend,
    inputs: &[PathBuf],
    options: &ConvertOptions,
    events: Option<Sender<ProcessEvent>>,
) -> Result<Vec<ConvertedFile>, ProcessError> {
    if !options.info_only {
        check_output_collisions(inputs, options)?;
        std::fs::create_dir_all(&options.output_dir)?;
    }

    let add = match &options.add {
        Some(source) => {
            let load = LoadOptions {
                svg_fit: None,
                ..options.load_options()
            };
            Some(AddParams {
                overlay: backend.load(&source.path, &load)?,
                scale: source.scale,
                offset: source.offset,
            })
        }
        None => None,
    };
    let params = options.transform_params(add);

    let converted: Vec<Vec<ConvertedFile>> = inputs
        .par_iter()
        .map(|source| {
            let event = convert_input(backend, source, options, &params)?;
            let outputs = event.outputs.clone();
            if let Some(tx) = &events {
                tx.send(event).ok();
            }
            Ok(outputs)
        })
        .collect::<Result<_, ProcessError>>()?;

    Ok(converted.into_iter().flatten().collect())
}

/// JSON report of a run, written with `--report`.
#[derive(Debug, Serialize)]
pub struct ConversionReport<'a> {
    pub version: &'static str,
    pub files: &'a [ConvertedFile],
}

pub fn write_report(path: &Path, files: &[ConvertedFile]) -> Result<(), ProcessError> {
    let report = ConversionReport {
        version: env!("CARGO_PKG_VERSION"),
        files,
    };
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Parsed header of a device file.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceHeader {
    Bmp(bmp::BmpHeader),
    Clk(clk::ClkHeader),
}

/// Read the header of a BMP or CLK file, detected by magic bytes.
pub fn inspect(path: &Path) -> Result<DeviceHeader, ProcessError> {
    let data = std::fs::read(path)?;
    if bmp::is_bmp(&data) {
        Ok(DeviceHeader::Bmp(bmp::read_header(&data)?))
    } else if clk::is_clk(&data) {
        Ok(DeviceHeader::Clk(clk::read_header(&data)?))
    } else {
        Err(ProcessError::UnknownDeviceFile(path.to_path_buf()))
    }
}

/// Decode any supported input, device files included, and save it as PNG.
pub fn preview(
    backend: &impl ImageBackend,
    input: &Path,
    output: &Path,
    load: &LoadOptions,
) -> Result<ImageInfo, ProcessError> {
    let img = backend.load(input, load)?;
    img.save_with_format(output, ImageFormat::Png)
        .map_err(EncodeError::from)?;
    Ok(image_info(&img))
}
