//! Palette reduction for the indexed formats.
//!
//! Median cut with max-coverage box selection: the box holding the most
//! pixels is split next, along its widest channel, at the pixel-weighted
//! median. The resulting box means seed a few rounds of k-means over the
//! colour histogram.
//!
//! Palettes are sorted darkest-first by luma. For 1 bpp that puts the dark
//! colour at index 0, which is what the firmware's monochrome faces expect.

use image::imageops::ColorMap;
use image::{Rgb, Rgba, RgbaImage};
use std::collections::HashMap;

/// Ordered set of colours an indexed image refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Rgb<u8>>,
}

fn luma(c: &Rgb<u8>) -> u32 {
    299 * c[0] as u32 + 587 * c[1] as u32 + 114 * c[2] as u32
}

fn distance_sq(a: [u8; 3], b: [u8; 3]) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = x as i32 - y as i32;
            (d * d) as u32
        })
        .sum()
}

impl Palette {
    /// Build a palette, sorting by luma and dropping duplicates.
    pub fn new(mut colors: Vec<Rgb<u8>>) -> Self {
        colors.sort_by_key(|c| (luma(c), c.0));
        colors.dedup();
        Self { colors }
    }

    pub fn colors(&self) -> &[Rgb<u8>] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Index of the closest entry by squared RGB distance.
    pub fn nearest(&self, color: Rgb<u8>) -> usize {
        self.colors
            .iter()
            .enumerate()
            .min_by_key(|(_, c)| distance_sq(c.0, color.0))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }
}

impl ColorMap for Palette {
    type Color = Rgba<u8>;

    fn index_of(&self, color: &Rgba<u8>) -> usize {
        self.nearest(Rgb([color[0], color[1], color[2]]))
    }

    fn lookup(&self, index: usize) -> Option<Rgba<u8>> {
        self.colors.get(index).map(|c| Rgba([c[0], c[1], c[2], 255]))
    }

    fn has_lookup(&self) -> bool {
        true
    }

    fn map_color(&self, color: &mut Rgba<u8>) {
        if let Some(c) = self.colors.get(self.index_of(color)) {
            color[0] = c[0];
            color[1] = c[1];
            color[2] = c[2];
        }
    }
}

/// Count of pixels per distinct RGB value. Alpha is ignored: indexed
/// formats are opaque and images are flattened before they get here.
pub fn histogram(img: &RgbaImage) -> HashMap<[u8; 3], u32> {
    let mut counts = HashMap::new();
    for px in img.pixels() {
        *counts.entry([px[0], px[1], px[2]]).or_insert(0) += 1;
    }
    counts
}

struct ColorBox {
    entries: Vec<([u8; 3], u32)>,
    population: u64,
}

impl ColorBox {
    fn new(entries: Vec<([u8; 3], u32)>) -> Self {
        let population = entries.iter().map(|(_, n)| *n as u64).sum();
        Self {
            entries,
            population,
        }
    }

    fn widest_channel(&self) -> usize {
        (0..3)
            .max_by_key(|&ch| {
                let lo = self.entries.iter().map(|(c, _)| c[ch]).min().unwrap_or(0);
                let hi = self.entries.iter().map(|(c, _)| c[ch]).max().unwrap_or(0);
                // ties resolve to the lowest channel
                ((hi - lo) as u32, 2 - ch)
            })
            .unwrap_or(0)
    }

    fn split(mut self) -> (ColorBox, ColorBox) {
        let ch = self.widest_channel();
        self.entries.sort_by_key(|(c, _)| (c[ch], *c));

        let mut cumulative = 0u64;
        let mut median = 0;
        for (i, (_, n)) in self.entries.iter().enumerate() {
            cumulative += *n as u64;
            if cumulative * 2 >= self.population {
                median = i;
                break;
            }
        }
        let at = (median + 1).clamp(1, self.entries.len() - 1);
        let upper = self.entries.split_off(at);
        (ColorBox::new(self.entries), ColorBox::new(upper))
    }

    fn mean(&self) -> [u8; 3] {
        weighted_mean(self.entries.iter().map(|(c, n)| (*c, *n)))
    }
}

fn weighted_mean(entries: impl Iterator<Item = ([u8; 3], u32)>) -> [u8; 3] {
    let mut sums = [0u64; 3];
    let mut total = 0u64;
    for (c, n) in entries {
        for ch in 0..3 {
            sums[ch] += c[ch] as u64 * n as u64;
        }
        total += n as u64;
    }
    if total == 0 {
        return [0, 0, 0];
    }
    sums.map(|s| ((s + total / 2) / total) as u8)
}

fn median_cut(entries: Vec<([u8; 3], u32)>, max_colors: usize) -> Vec<[u8; 3]> {
    let mut boxes = vec![ColorBox::new(entries)];
    while boxes.len() < max_colors {
        let candidate = boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.entries.len() > 1)
            .max_by_key(|(_, b)| b.population)
            .map(|(i, _)| i);
        let Some(index) = candidate else { break };
        let (a, b) = boxes.swap_remove(index).split();
        boxes.push(a);
        boxes.push(b);
    }
    boxes.iter().map(ColorBox::mean).collect()
}

fn refine_kmeans(centroids: &mut [[u8; 3]], entries: &[([u8; 3], u32)], iterations: u32) {
    for _ in 0..iterations {
        let mut sums = vec![[0u64; 3]; centroids.len()];
        let mut counts = vec![0u64; centroids.len()];
        for (color, n) in entries {
            let nearest = centroids
                .iter()
                .enumerate()
                .min_by_key(|(_, c)| distance_sq(**c, *color))
                .map(|(i, _)| i)
                .unwrap_or(0);
            for ch in 0..3 {
                sums[nearest][ch] += color[ch] as u64 * *n as u64;
            }
            counts[nearest] += *n as u64;
        }

        let mut changed = false;
        for (i, centroid) in centroids.iter_mut().enumerate() {
            if counts[i] == 0 {
                continue;
            }
            let updated = sums[i].map(|s| ((s + counts[i] / 2) / counts[i]) as u8);
            if updated != *centroid {
                *centroid = updated;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

/// Reduce `img` to at most `max_colors` colours.
///
/// Images that already fit get an exact palette; nothing is averaged.
pub fn build_palette(img: &RgbaImage, max_colors: usize, kmeans_iterations: u32) -> Palette {
    let max_colors = max_colors.max(1);
    let mut entries: Vec<([u8; 3], u32)> = histogram(img).into_iter().collect();
    entries.sort_unstable();

    if entries.len() <= max_colors {
        return Palette::new(entries.into_iter().map(|(c, _)| Rgb(c)).collect());
    }

    let mut centroids = median_cut(entries.clone(), max_colors);
    refine_kmeans(&mut centroids, &entries, kmeans_iterations);
    Palette::new(centroids.into_iter().map(Rgb).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_from(pixels: &[([u8; 3], u32)]) -> RgbaImage {
        let total: u32 = pixels.iter().map(|(_, n)| n).sum();
        let mut img = RgbaImage::new(total, 1);
        let mut x = 0;
        for (c, n) in pixels {
            for _ in 0..*n {
                img.put_pixel(x, 0, Rgba([c[0], c[1], c[2], 255]));
                x += 1;
            }
        }
        img
    }

    #[test]
    fn exact_palette_when_colors_fit() {
        let img = image_from(&[([255, 0, 0], 3), ([0, 0, 0], 2), ([255, 255, 255], 1)]);
        let palette = build_palette(&img, 4, 8);
        assert_eq!(
            palette.colors(),
            &[Rgb([0, 0, 0]), Rgb([255, 0, 0]), Rgb([255, 255, 255])]
        );
    }

    #[test]
    fn palette_sorted_darkest_first() {
        let palette = Palette::new(vec![Rgb([255, 255, 255]), Rgb([0, 0, 255]), Rgb([0, 0, 0])]);
        assert_eq!(palette.colors()[0], Rgb([0, 0, 0]));
        assert_eq!(palette.colors()[2], Rgb([255, 255, 255]));
    }

    #[test]
    fn duplicates_removed() {
        let palette = Palette::new(vec![Rgb([9, 9, 9]), Rgb([9, 9, 9])]);
        assert_eq!(palette.len(), 1);
    }

    #[test]
    fn max_coverage_keeps_dominant_colors() {
        let img = image_from(&[([0, 0, 0], 100), ([255, 255, 255], 100), ([255, 0, 0], 2)]);
        let palette = build_palette(&img, 2, 16);
        assert_eq!(palette.len(), 2);
        assert!(luma(&palette.colors()[0]) < 20 * 1000);
        assert_eq!(palette.colors()[1], Rgb([255, 255, 255]));
    }

    #[test]
    fn gradient_reduces_to_requested_count() {
        let mut img = RgbaImage::new(256, 1);
        for x in 0..256 {
            img.put_pixel(x, 0, Rgba([x as u8, x as u8, x as u8, 255]));
        }
        let palette = build_palette(&img, 4, 32);
        assert_eq!(palette.len(), 4);
        // evenly spread gradient: quartile means
        let first = palette.colors()[0][0];
        let last = palette.colors()[3][0];
        assert!(first < 64, "first entry {first}");
        assert!(last > 192, "last entry {last}");
    }

    #[test]
    fn nearest_picks_closest_entry() {
        let palette = Palette::new(vec![Rgb([0, 0, 0]), Rgb([255, 255, 255])]);
        assert_eq!(palette.nearest(Rgb([10, 20, 30])), 0);
        assert_eq!(palette.nearest(Rgb([200, 220, 240])), 1);
    }

    #[test]
    fn color_map_snaps_rgb_and_keeps_alpha() {
        let palette = Palette::new(vec![Rgb([0, 0, 0]), Rgb([255, 255, 255])]);
        let mut px = Rgba([180, 190, 200, 42]);
        palette.map_color(&mut px);
        assert_eq!(px, Rgba([255, 255, 255, 42]));
        assert_eq!(palette.lookup(0), Some(Rgba([0, 0, 0, 255])));
        assert!(palette.has_lookup());
    }

    #[test]
    fn single_color_image() {
        let img = image_from(&[([12, 34, 56], 10)]);
        let palette = build_palette(&img, 2, 8);
        assert_eq!(palette.colors(), &[Rgb([12, 34, 56])]);
    }
}
