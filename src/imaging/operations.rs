//! Pixel transforms applied between loading and encoding.
//!
//! [`apply`] runs the whole chain in its fixed order; each step is also
//! exposed on its own.

use super::calculations::{content_bounds, fit_within};
use super::params::{AddParams, Adjustments, Background, TransformParams, TrimMode};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

/// Fit `img` within `bounds` with Lanczos3. Returns the input untouched
/// when it already has the fitted size.
pub fn scale(img: RgbaImage, bounds: (u32, u32)) -> RgbaImage {
    let (w, h) = fit_within(img.dimensions(), bounds);
    if (w, h) == img.dimensions() {
        return img;
    }
    tracing::debug!(from = ?img.dimensions(), to = ?(w, h), "scaling");
    imageops::resize(&img, w, h, FilterType::Lanczos3)
}

/// Crop to the content bounding box; see [`content_bounds`].
pub fn trim(img: RgbaImage, mode: TrimMode) -> RgbaImage {
    match content_bounds(&img, mode.threshold()) {
        Some((x, y, w, h)) if (w, h) != img.dimensions() => {
            imageops::crop_imm(&img, x, y, w, h).to_image()
        }
        _ => img,
    }
}

fn blend(fg: u8, bg: u8, alpha: u8) -> u8 {
    let a = alpha as u32;
    ((fg as u32 * a + bg as u32 * (255 - a) + 127) / 255) as u8
}

/// Composite over `background` and make every pixel opaque.
pub fn flatten(mut img: RgbaImage, background: Background) -> RgbaImage {
    let bg = background.0;
    for px in img.pixels_mut() {
        let a = px[3];
        if a != 255 {
            *px = Rgba([
                blend(px[0], bg[0], a),
                blend(px[1], bg[1], a),
                blend(px[2], bg[2], a),
                255,
            ]);
        }
    }
    img
}

pub fn has_transparency(img: &RgbaImage) -> bool {
    img.pixels().any(|px| px[3] != 255)
}

/// Brightness, contrast, then inversion. Alpha is never touched.
pub fn adjust(mut img: RgbaImage, adjustments: &Adjustments) -> RgbaImage {
    if adjustments.brightness != 0 {
        img = imageops::brighten(&img, adjustments.brightness);
    }
    if adjustments.contrast != 0.0 {
        img = imageops::contrast(&img, adjustments.contrast);
    }
    if adjustments.invert {
        imageops::invert(&mut img);
    }
    img
}

/// `clamp((a + b) / scale + offset)` per colour channel over the region
/// both images cover. Pixels outside the overlay are unchanged.
pub fn add(mut img: RgbaImage, params: &AddParams) -> RgbaImage {
    let scale = if params.scale == 0.0 { 1.0 } else { params.scale };
    let w = img.width().min(params.overlay.width());
    let h = img.height().min(params.overlay.height());
    for y in 0..h {
        for x in 0..w {
            let b = *params.overlay.get_pixel(x, y);
            let a = img.get_pixel_mut(x, y);
            for ch in 0..3 {
                let sum = (a[ch] as f32 + b[ch] as f32) / scale + params.offset as f32;
                a[ch] = sum.clamp(0.0, 255.0) as u8;
            }
        }
    }
    img
}

/// Run every configured transform in pipeline order.
pub fn apply(mut img: RgbaImage, params: &TransformParams) -> RgbaImage {
    if let Some(bounds) = params.fit {
        img = scale(img, bounds);
    }
    if let Some(mode) = params.trim {
        img = trim(img, mode);
    }
    if let Some(background) = params.flatten {
        if has_transparency(&img) {
            img = flatten(img, background);
        }
    }
    if !params.adjust.is_identity() {
        img = adjust(img, &params.adjust);
    }
    if let Some(add_params) = &params.add {
        img = add(img, add_params);
    }
    img
}
