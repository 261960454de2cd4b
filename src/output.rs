//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Convert / Info
//!
//! Every input gets one info line describing the image as loaded, followed
//! by one line per written file describing the pixels actually stored:
//!
//! ```text
//! faces/digit3.png, colors=212, width=270, height=480
//! out/digit3.bmp, colors=198, width=135, height=240
//! ```
//!
//! The `info` subcommand prints only the first kind of line.
//!
//! ## Inspect
//!
//! ```text
//! out/digit3.bmp: BMP rgb565
//!     Size: 135x240 (bottom-up)
//!     Compression: bitfields
//!     Masks: R=0xF800 G=0x07E0 B=0x001F
//!     Pixel data: 65280 bytes at offset 66
//! ```
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>` or `String`)
//! for testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure with no I/O.

use crate::encode::bmp::{self, BmpHeader};
use crate::encode::clk::ClkHeader;
use crate::process::{ConvertedFile, DeviceHeader, ProcessEvent};
use crate::types::ImageInfo;
use std::path::Path;

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

// ============================================================================
// Convert / Info
// ============================================================================

/// `<name>, colors=N, width=W, height=H`
pub fn format_info_line(name: &str, info: &ImageInfo) -> String {
    format!(
        "{}, colors={}, width={}, height={}",
        name, info.colors, info.width, info.height
    )
}

/// Input info line, then one line per written file.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    let mut lines = vec![format_info_line(
        &event.source.display().to_string(),
        &event.info,
    )];
    for file in &event.outputs {
        let info = ImageInfo {
            width: file.width,
            height: file.height,
            colors: file.colors,
        };
        lines.push(format_info_line(&file.output.display().to_string(), &info));
    }
    lines
}

/// Closing line of a conversion run.
pub fn format_summary(inputs: usize, files: &[ConvertedFile]) -> String {
    let bytes: usize = files.iter().map(|f| f.bytes).sum();
    let noun = if inputs == 1 { "input" } else { "inputs" };
    let file_noun = if files.len() == 1 { "file" } else { "files" };
    format!(
        "Converted {} {} into {} {} ({} bytes)",
        inputs,
        noun,
        files.len(),
        file_noun,
        bytes
    )
}

pub fn print_process_event(event: &ProcessEvent) {
    for line in format_process_event(event) {
        println!("{}", line);
    }
}

// ============================================================================
// Inspect
// ============================================================================

fn compression_name(compression: u32) -> String {
    match compression {
        bmp::BI_RGB => "none".to_string(),
        bmp::BI_BITFIELDS => "bitfields".to_string(),
        bmp::BI_ALPHABITFIELDS => "alpha bitfields".to_string(),
        other => format!("unknown ({})", other),
    }
}

fn format_bmp_header(name: &str, header: &BmpHeader) -> Vec<String> {
    let order = if header.top_down() {
        "top-down"
    } else {
        "bottom-up"
    };
    let mut lines = vec![
        format!("{}: BMP {}", name, header.describe()),
        format!(
            "{}Size: {}x{} ({})",
            indent(1),
            header.width,
            header.height.unsigned_abs(),
            order
        ),
        format!(
            "{}Compression: {}",
            indent(1),
            compression_name(header.compression)
        ),
    ];
    if let Some(m) = &header.masks {
        let mut masks = format!(
            "{}Masks: R={:#06X} G={:#06X} B={:#06X}",
            indent(1),
            m.red,
            m.green,
            m.blue
        );
        if m.alpha != 0 {
            masks.push_str(&format!(" A={:#06X}", m.alpha));
        }
        lines.push(masks);
    }
    if !header.palette.is_empty() {
        lines.push(format!("{}Palette: {} colours", indent(1), header.palette.len()));
    }
    lines.push(format!(
        "{}Pixel data: {} bytes at offset {}",
        indent(1),
        header.image_size,
        header.data_offset
    ));
    lines
}

fn format_clk_header(name: &str, header: &ClkHeader) -> Vec<String> {
    vec![
        format!("{}: CLK rgb565", name),
        format!("{}Size: {}x{}", indent(1), header.width, header.height),
        format!("{}Pixel data: {} bytes", indent(1), header.pixel_bytes()),
    ]
}

/// Header summary for a device file.
pub fn format_inspection(path: &Path, header: &DeviceHeader) -> Vec<String> {
    let name = path.display().to_string();
    match header {
        DeviceHeader::Bmp(h) => format_bmp_header(&name, h),
        DeviceHeader::Clk(h) => format_clk_header(&name, h),
    }
}

pub fn print_inspection(path: &Path, header: &DeviceHeader) {
    for line in format_inspection(path, header) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
