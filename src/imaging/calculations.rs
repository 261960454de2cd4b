//! Pure calculation functions for image geometry.
//!
//! All functions here are pure and testable without any I/O or images.

use image::{Rgba, RgbaImage};

/// Largest size that fits within `bounds` keeping the source aspect ratio.
///
/// `ratio = min(bw / w, bh / h)`; both sides are truncated and never drop
/// below one pixel.
///
/// # Examples
/// ```
/// # use tftbmp::imaging::fit_within;
/// // 270x480 halves exactly into the default display box
/// assert_eq!(fit_within((270, 480), (135, 240)), (135, 240));
///
/// // wide banner is limited by width
/// assert_eq!(fit_within((540, 60), (135, 240)), (135, 15));
/// ```
pub fn fit_within(source: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (w, h) = source;
    let (bw, bh) = bounds;
    if w == 0 || h == 0 {
        return source;
    }
    let ratio = (bw as f64 / w as f64).min(bh as f64 / h as f64);
    let fw = ((w as f64 * ratio) as u32).max(1);
    let fh = ((h as f64 * ratio) as u32).max(1);
    (fw, fh)
}

/// One cell of a tile grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileBox {
    pub row: u32,
    pub col: u32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Split `width` x `height` into `rows` x `cols` cells, row-major.
///
/// Boundaries fall at `i * size / n`, so cells differ by at most one pixel
/// and together cover the image exactly. Cells can be empty when `n`
/// exceeds the size; callers reject that case up front.
pub fn tile_boxes(width: u32, height: u32, rows: u32, cols: u32) -> Vec<TileBox> {
    let edge = |i: u32, size: u32, n: u32| (i as u64 * size as u64 / n as u64) as u32;
    let mut boxes = Vec::with_capacity((rows * cols) as usize);
    for row in 0..rows {
        let top = edge(row, height, rows);
        let bottom = edge(row + 1, height, rows);
        for col in 0..cols {
            let left = edge(col, width, cols);
            let right = edge(col + 1, width, cols);
            boxes.push(TileBox {
                row,
                col,
                x: left,
                y: top,
                width: right - left,
                height: bottom - top,
            });
        }
    }
    boxes
}

/// Axis-aligned region `(x, y, width, height)`.
pub type Region = (u32, u32, u32, u32);

fn differs(a: &Rgba<u8>, b: &Rgba<u8>, threshold: u8) -> bool {
    a.0.iter()
        .zip(b.0.iter())
        .any(|(&x, &y)| x.abs_diff(y) > threshold)
}

/// Bounding box of pixels that differ from the top-left pixel by more than
/// `threshold` in any channel, alpha included. `None` when nothing does.
pub fn content_bounds(img: &RgbaImage, threshold: u8) -> Option<Region> {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return None;
    }
    let reference = *img.get_pixel(0, 0);
    let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
    let (mut max_x, mut max_y) = (0, 0);
    let mut found = false;
    for (x, y, px) in img.enumerate_pixels() {
        if differs(px, &reference, threshold) {
            found = true;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }
    found.then(|| (min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // fit_within tests
    // =========================================================================

    #[test]
    fn fit_tall_source_limited_by_height() {
        // ratio = min(135/100, 240/480) = 0.5
        assert_eq!(fit_within((100, 480), (135, 240)), (50, 240));
    }

    #[test]
    fn fit_upscales_small_images() {
        // ratio = min(135/27, 240/24) = 5
        assert_eq!(fit_within((27, 24), (135, 240)), (135, 120));
    }

    #[test]
    fn fit_truncates_fractions() {
        // ratio = 135/200 = 0.675; 0.675 * 301 = 203.175
        assert_eq!(fit_within((200, 301), (135, 240)).1, 203);
    }

    #[test]
    fn fit_never_below_one_pixel() {
        // ratio = 128/1024, height 0.125 rounds down to 0
        assert_eq!(fit_within((1024, 1), (128, 240)), (128, 1));
    }

    #[test]
    fn fit_identity_when_already_fitted() {
        assert_eq!(fit_within((135, 240), (135, 240)), (135, 240));
    }

    // =========================================================================
    // tile_boxes tests
    // =========================================================================

    #[test]
    fn tiles_cover_image_exactly() {
        let boxes = tile_boxes(10, 7, 2, 3);
        assert_eq!(boxes.len(), 6);
        let area: u32 = boxes.iter().map(|b| b.width * b.height).sum();
        assert_eq!(area, 70);
        // columns at 0, 3, 6, 10
        assert_eq!(boxes[0].width, 3);
        assert_eq!(boxes[2].x, 6);
        assert_eq!(boxes[2].width, 4);
        // rows at 0, 3, 7
        assert_eq!(boxes[3].y, 3);
        assert_eq!(boxes[3].height, 4);
    }

    #[test]
    fn tiles_are_row_major() {
        let boxes = tile_boxes(4, 4, 2, 2);
        let order: Vec<(u32, u32)> = boxes.iter().map(|b| (b.row, b.col)).collect();
        assert_eq!(order, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
    }

    #[test]
    fn single_tile_is_whole_image() {
        let boxes = tile_boxes(9, 5, 1, 1);
        assert_eq!(
            boxes,
            vec![TileBox {
                row: 0,
                col: 0,
                x: 0,
                y: 0,
                width: 9,
                height: 5
            }]
        );
    }

    // =========================================================================
    // content_bounds tests
    // =========================================================================

    #[test]
    fn bounds_of_single_dot() {
        let mut img = RgbaImage::from_pixel(5, 5, Rgba([255, 255, 255, 255]));
        img.put_pixel(3, 1, Rgba([0, 0, 0, 255]));
        assert_eq!(content_bounds(&img, 0), Some((3, 1, 1, 1)));
    }

    #[test]
    fn bounds_none_for_flat_image() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([9, 9, 9, 255]));
        assert_eq!(content_bounds(&img, 0), None);
    }

    #[test]
    fn bounds_consider_alpha() {
        let mut img = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 0]));
        img.put_pixel(2, 2, Rgba([0, 0, 0, 255]));
        assert_eq!(content_bounds(&img, 0), Some((2, 2, 1, 1)));
    }

    #[test]
    fn fuzzy_threshold_ignores_small_differences() {
        let mut img = RgbaImage::from_pixel(6, 6, Rgba([200, 200, 200, 255]));
        img.put_pixel(0, 5, Rgba([150, 150, 150, 255]));
        img.put_pixel(4, 2, Rgba([20, 20, 20, 255]));
        assert_eq!(content_bounds(&img, 0), Some((0, 2, 5, 4)));
        assert_eq!(content_bounds(&img, 100), Some((4, 2, 1, 1)));
    }
}
