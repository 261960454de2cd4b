use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tftbmp::config::{self, ToolConfig};
use tftbmp::imaging::{LoadOptions, RustBackend, parse_size};
use tftbmp::process::{self, AddSource, ConvertOptions};
use tftbmp::types::{Container, PixelFormat};
use tftbmp::{output, scan};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tftbmp")]
#[command(about = "Convert images into BMP files for TFT clock displays")]
#[command(long_about = "\
Convert images into BMP files for TFT clock displays

Inputs may be PNG, JPEG, GIF, TIFF, WebP, SVG, BMP, CLK or headerless
RGB565 (.raw / .bin, with --raw-size). Each input becomes one output file
named after it, or one file per tile when --rows or --cols is above 1:

  faces/digit3.png  →  digit3.bmp
  face.svg -r 2     →  face_0_0.bmp, face_1_0.bmp

Pixel formats:
  rgb565 (default), argb1555, argb4444   16-bit, bmp only (clk: rgb565)
  index1, index2, index4, index8         palette, quantized per image
  rgb888, argb8888                       24 / 32-bit

Settings are read from ./tftbmp.toml when present; flags override them.
Switches enabled in the config are turned off with --no-dither, --no-trim,
--no-fuzzy, --no-scale and --no-invert.
Run 'tftbmp gen-config' to generate a documented config file.")]
#[command(version)]
struct Cli {
    /// Config file (default: ./tftbmp.toml if present)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log debug diagnostics to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Shared flags for commands that read inputs.
#[derive(clap::Args, Clone)]
struct InputArgs {
    /// Image files or directories
    inputs: Vec<PathBuf>,

    /// Descend into subdirectories of directory inputs
    #[arg(long)]
    recursive: bool,

    /// Pixel size of headerless .raw/.bin RGB565 inputs
    #[arg(long, value_name = "WxH", value_parser = parse_size)]
    raw_size: Option<(u32, u32)>,
}

#[derive(clap::Args)]
struct ConvertArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Background colour for transparent pixels (name, #rgb or #rrggbb)
    #[arg(short, long)]
    background: Option<String>,

    /// Output container
    #[arg(short, long, value_enum)]
    output: Option<Container>,

    /// Bits per pixel: 1, 2, 4, 8, 16, 24 or 32
    #[arg(short = 'p', long, value_parser = parse_bpp, conflicts_with = "format")]
    bpp: Option<PixelFormat>,

    /// Pixel format
    #[arg(long, value_enum)]
    format: Option<PixelFormat>,

    /// Dither when reducing colour depth
    #[arg(short, long, overrides_with = "no_dither")]
    dither: bool,

    /// Do not dither, even when the config enables it
    #[arg(long, overrides_with = "dither")]
    no_dither: bool,

    /// Split each image into this many tile columns
    #[arg(short, long)]
    cols: Option<u32>,

    /// Split each image into this many tile rows
    #[arg(short, long)]
    rows: Option<u32>,

    /// Crop to the content bounding box
    #[arg(short, long, overrides_with = "no_trim")]
    trim: bool,

    /// Do not trim, even when the config enables it
    #[arg(long, overrides_with = "trim")]
    no_trim: bool,

    /// Trim with a tolerance instead of exact matching
    #[arg(short, long, overrides_with = "no_fuzzy")]
    fuzzy: bool,

    /// Trim exactly, even when the config enables fuzzy trimming
    #[arg(long, overrides_with = "fuzzy")]
    no_fuzzy: bool,

    /// Fit images into the display box
    #[arg(short, long, overrides_with = "no_scale")]
    scale: bool,

    /// Do not scale, even when the config enables it
    #[arg(long, overrides_with = "scale")]
    no_scale: bool,

    /// Display width used by --scale
    #[arg(long)]
    width: Option<u32>,

    /// Display height used by --scale
    #[arg(long)]
    height: Option<u32>,

    /// Brightness offset, -255..=255
    #[arg(long, allow_hyphen_values = true)]
    brightness: Option<i32>,

    /// Contrast, -100..=100
    #[arg(long, allow_hyphen_values = true)]
    contrast: Option<f32>,

    /// Invert colours
    #[arg(long, overrides_with = "no_invert")]
    invert: bool,

    /// Do not invert, even when the config enables it
    #[arg(long, overrides_with = "invert")]
    no_invert: bool,

    /// Image added onto every input, channel by channel
    #[arg(long, value_name = "FILE")]
    add: Option<PathBuf>,

    /// Divisor applied to the added sum
    #[arg(long, default_value_t = 1.0)]
    add_scale: f32,

    /// Offset applied to the added sum
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    add_offset: i32,

    /// K-means refinement passes for palette quantization
    #[arg(long)]
    kmeans: Option<u32>,

    /// Directory to write converted files to
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Write a JSON report of every written file
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// Print input info only, write nothing
    #[arg(short, long)]
    info: bool,
}

impl ConvertArgs {
    /// Apply command-line overrides on top of the loaded config.
    fn apply_to(&self, config: &mut ToolConfig) {
        if let Some(format) = self.format.or(self.bpp) {
            config.output.format = format;
        }
        if let Some(container) = self.output {
            config.output.container = container;
        }
        if let Some(dir) = &self.out_dir {
            config.output.directory = dir.display().to_string();
        }
        if let Some(background) = &self.background {
            config.convert.background = background.clone();
        }
        switch(&mut config.convert.dither, self.dither, self.no_dither);
        switch(&mut config.convert.trim, self.trim, self.no_trim);
        switch(&mut config.convert.fuzzy, self.fuzzy, self.no_fuzzy);
        switch(&mut config.convert.scale, self.scale, self.no_scale);
        if let Some(width) = self.width {
            config.display.width = width;
        }
        if let Some(height) = self.height {
            config.display.height = height;
        }
        if let Some(rows) = self.rows {
            config.tiles.rows = rows;
        }
        if let Some(cols) = self.cols {
            config.tiles.cols = cols;
        }
        if let Some(brightness) = self.brightness {
            config.adjust.brightness = brightness;
        }
        if let Some(contrast) = self.contrast {
            config.adjust.contrast = contrast;
        }
        switch(&mut config.adjust.invert, self.invert, self.no_invert);
        if let Some(kmeans) = self.kmeans {
            config.quantize.kmeans = kmeans;
        }
    }
}

/// `--flag` sets, `--no-flag` clears, neither keeps the config value.
fn switch(value: &mut bool, on: bool, off: bool) {
    if on {
        *value = true;
    } else if off {
        *value = false;
    }
}

#[derive(Subcommand)]
enum Command {
    /// Convert images into device files
    Convert(ConvertArgs),
    /// Print colour count and size of each input
    Info(InputArgs),
    /// Print the header of BMP or CLK device files
    Inspect {
        /// Device files to inspect
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Decode an input, device files included, back to PNG
    Preview {
        /// File to decode
        input: PathBuf,
        /// PNG file to write
        output: PathBuf,
        /// Pixel size of a headerless .raw/.bin input
        #[arg(long, value_name = "WxH", value_parser = parse_size)]
        raw_size: Option<(u32, u32)>,
    },
    /// Print a stock tftbmp.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Convert(args) => {
            let mut config = load_config(cli.config.as_deref())?;
            args.apply_to(&mut config);
            let mut options = ConvertOptions::from_config(&config)?;
            options.raw_size = args.input.raw_size;
            options.info_only = args.info;
            options.add = args.add.clone().map(|path| AddSource {
                path,
                scale: args.add_scale,
                offset: args.add_offset,
            });
            init_thread_pool(&config.processing);
            run_conversion(&args.input, &options, args.report.as_deref())?;
        }
        Command::Info(input) => {
            let config = load_config(cli.config.as_deref())?;
            let mut options = ConvertOptions::from_config(&config)?;
            options.raw_size = input.raw_size;
            options.info_only = true;
            init_thread_pool(&config.processing);
            run_conversion(&input, &options, None)?;
        }
        Command::Inspect { files } => {
            for file in &files {
                let header = process::inspect(file)?;
                output::print_inspection(file, &header);
            }
        }
        Command::Preview {
            input,
            output: out,
            raw_size,
        } => {
            let load = LoadOptions {
                raw_size,
                svg_fit: None,
            };
            let info = process::preview(&RustBackend::new(), &input, &out, &load)?;
            println!(
                "{}",
                output::format_info_line(&out.display().to_string(), &info)
            );
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Expand inputs, convert them on the rayon pool, and print progress as
/// each input finishes.
fn run_conversion(
    input: &InputArgs,
    options: &ConvertOptions,
    report: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let inputs = scan::expand_inputs(&input.inputs, input.recursive)?;
    tracing::debug!(
        format = %options.format,
        container = %options.container,
        inputs = inputs.len(),
        "starting conversion"
    );

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            output::print_process_event(&event);
        }
    });
    let result = process::convert_all(&RustBackend::new(), &inputs, options, Some(tx));
    printer.join().map_err(|_| "output thread panicked")?;
    let files = result?;

    if let Some(path) = report {
        process::write_report(path, &files)?;
    }
    if !options.info_only {
        println!("{}", output::format_summary(inputs.len(), &files));
    }
    Ok(())
}

/// `--config` must exist; otherwise `./tftbmp.toml` is optional.
fn load_config(path: Option<&Path>) -> Result<ToolConfig, config::ConfigError> {
    match path {
        Some(path) => config::load_config_file(path),
        None => config::load_config(Path::new(".")),
    }
}

fn parse_bpp(s: &str) -> Result<PixelFormat, String> {
    let bpp: u8 = s.parse().map_err(|_| format!("invalid bit depth: {s}"))?;
    PixelFormat::from_bpp(bpp)
        .ok_or_else(|| format!("unsupported bit depth {bpp}; use 1, 2, 4, 8, 16, 24 or 32"))
}

/// `-v` forces debug; otherwise `RUST_LOG`, defaulting to warn.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down,
/// not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert_args(flags: &[&str]) -> ConvertArgs {
        let argv = ["tftbmp", "convert"]
            .iter()
            .chain(flags)
            .chain(&["in.png"])
            .copied();
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Convert(args) => args,
            _ => panic!("expected the convert command"),
        }
    }

    fn switched_on() -> ToolConfig {
        let mut config = ToolConfig::default();
        config.convert.dither = true;
        config.convert.trim = true;
        config.convert.fuzzy = true;
        config.convert.scale = true;
        config.adjust.invert = true;
        config
    }

    #[test]
    fn no_flags_clear_config_switches() {
        let mut config = switched_on();
        convert_args(&[
            "--no-dither",
            "--no-trim",
            "--no-fuzzy",
            "--no-scale",
            "--no-invert",
        ])
        .apply_to(&mut config);
        assert!(!config.convert.dither);
        assert!(!config.convert.trim);
        assert!(!config.convert.fuzzy);
        assert!(!config.convert.scale);
        assert!(!config.adjust.invert);
    }

    #[test]
    fn absent_switches_keep_config_values() {
        let mut config = switched_on();
        convert_args(&[]).apply_to(&mut config);
        assert_eq!(config.convert, switched_on().convert);
        assert!(config.adjust.invert);

        let mut config = ToolConfig::default();
        convert_args(&["-d", "--trim", "--invert"]).apply_to(&mut config);
        assert!(config.convert.dither);
        assert!(config.convert.trim);
        assert!(config.adjust.invert);
        assert!(!config.convert.scale);
    }

    #[test]
    fn last_of_a_switch_pair_wins() {
        let mut config = ToolConfig::default();
        convert_args(&["--dither", "--no-dither"]).apply_to(&mut config);
        assert!(!config.convert.dither);

        let mut config = ToolConfig::default();
        convert_args(&["--no-scale", "--scale"]).apply_to(&mut config);
        assert!(config.convert.scale);
    }
}
