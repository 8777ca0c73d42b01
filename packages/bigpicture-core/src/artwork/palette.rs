//! Dominant-color extraction from decoded artwork.
//!
//! The image is quantized with median cut into a bounded number of color
//! buckets. Buckets that are too small, too dark or too gray are discarded and
//! the survivors are ranked by `population × brightness²`. Depending on how
//! many survive, the result follows the grayscale, monochrome or two-color path.
//! The average brightness is estimated separately from a sparse pixel grid.

use image::{DynamicImage, GenericImageView};

use crate::model::{ArtworkColors, Rgb};

// ─────────────────────────────────────────────────────────────────────────────
// Tuning
// ─────────────────────────────────────────────────────────────────────────────

/// Images larger than this (either side) are downscaled before quantization.
const QUANTIZE_MAX_SIDE: u32 = 128;

/// Upper bound on the number of color buckets.
const MAX_BUCKETS: usize = 16;

/// Pixels more transparent than this are ignored.
const MIN_ALPHA: u8 = 125;

/// Minimum share of sampled pixels a bucket must cover.
const MIN_POPULATION_SHARE: f64 = 0.01;

/// Minimum perceived brightness of a bucket color.
const MIN_BRIGHTNESS: f64 = 0.15;

/// Minimum colorfulness (HSV saturation) of a bucket color.
const MIN_COLORFULNESS: f64 = 0.25;

/// Below this share of colored pixels the image is treated as grayscale.
const MIN_COLORED_SHARE: f64 = 0.05;

/// Approximate number of pixels sampled for the average brightness.
const BRIGHTNESS_SAMPLES: u64 = 400;

const GAMMA: f64 = 2.2;

// ─────────────────────────────────────────────────────────────────────────────
// Entry Point
// ─────────────────────────────────────────────────────────────────────────────

/// A quantized color region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    /// Mean color of the bucket's pixels.
    pub color: Rgb,
    /// Number of pixels in the bucket.
    pub population: usize,
}

impl Bucket {
    fn rank(&self) -> f64 {
        let brightness = self.color.brightness();
        self.population as f64 * brightness * brightness
    }
}

/// Computes the primary/secondary colors and the average brightness of `image`.
#[must_use]
pub fn analyze(image: &DynamicImage) -> ArtworkColors {
    let brightness = average_brightness(image);
    let pixels = opaque_pixels(image);
    let buckets = median_cut(pixels.clone(), MAX_BUCKETS);
    let qualifying = qualifying_buckets(&buckets, pixels.len());

    let (primary, secondary) = match qualifying.as_slice() {
        [] => (Rgb::WHITE, Rgb::WHITE.scaled(brightness)),
        [only] => (only.color, only.color),
        [first, second, ..] => {
            if first.color.brightness() >= second.color.brightness() {
                (first.color, second.color)
            } else {
                (second.color, first.color)
            }
        }
    };

    ArtworkColors {
        primary: primary.with_max_value(),
        secondary,
        brightness,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Quantization
// ─────────────────────────────────────────────────────────────────────────────

fn opaque_pixels(image: &DynamicImage) -> Vec<[u8; 3]> {
    let (width, height) = image.dimensions();
    let rgba = if width > QUANTIZE_MAX_SIDE || height > QUANTIZE_MAX_SIDE {
        image.thumbnail(QUANTIZE_MAX_SIDE, QUANTIZE_MAX_SIDE).to_rgba8()
    } else {
        image.to_rgba8()
    };

    rgba.pixels()
        .filter(|p| p.0[3] >= MIN_ALPHA)
        .map(|p| [p.0[0], p.0[1], p.0[2]])
        .collect()
}

fn channel_range(pixels: &[[u8; 3]], channel: usize) -> u8 {
    let (min, max) = pixels.iter().fold((u8::MAX, u8::MIN), |(lo, hi), p| {
        (lo.min(p[channel]), hi.max(p[channel]))
    });
    max.saturating_sub(min)
}

/// Channel with the widest value range, and that range.
fn widest_channel(pixels: &[[u8; 3]]) -> (usize, u8) {
    let mut best = (0, 0);
    for channel in 0..3 {
        let range = channel_range(pixels, channel);
        if range > best.1 {
            best = (channel, range);
        }
    }
    best
}

/// Splits the pixel set into at most `max_buckets` boxes by repeatedly halving
/// the box with the widest channel range at its median.
pub(crate) fn median_cut(pixels: Vec<[u8; 3]>, max_buckets: usize) -> Vec<Bucket> {
    if pixels.is_empty() {
        return Vec::new();
    }

    let mut boxes = vec![pixels];
    while boxes.len() < max_buckets {
        let candidate = boxes
            .iter()
            .enumerate()
            .map(|(i, b)| (i, widest_channel(b), b.len()))
            .filter(|(_, (_, range), _)| *range > 0)
            .max_by_key(|(_, (_, range), len)| (*range, *len));

        let Some((index, (channel, _), _)) = candidate else {
            break;
        };

        let mut pixels = boxes.swap_remove(index);
        pixels.sort_unstable_by_key(|p| p[channel]);

        // Cut on a value boundary so equal colors never straddle two boxes.
        let pivot = pixels[pixels.len() / 2][channel];
        let lower = pixels.partition_point(|p| p[channel] < pivot);
        let split = if lower > 0 {
            lower
        } else {
            pixels.partition_point(|p| p[channel] <= pivot)
        };

        let upper = pixels.split_off(split);
        boxes.push(pixels);
        boxes.push(upper);
    }

    boxes.iter().map(|b| bucket_of(b)).collect()
}

fn bucket_of(pixels: &[[u8; 3]]) -> Bucket {
    let mut sums = [0u64; 3];
    for p in pixels {
        for channel in 0..3 {
            sums[channel] += u64::from(p[channel]);
        }
    }
    let n = pixels.len().max(1) as u64;
    let mean = |c: usize| ((sums[c] + n / 2) / n).min(255) as u8;

    Bucket {
        color: Rgb::new(mean(0), mean(1), mean(2)),
        population: pixels.len(),
    }
}

/// Drops buckets below the population/brightness/colorfulness floors and
/// sorts the rest by rank, best first.
///
/// Returns nothing if the surviving buckets cover too little of the image.
fn qualifying_buckets(buckets: &[Bucket], total: usize) -> Vec<Bucket> {
    if total == 0 {
        return Vec::new();
    }
    let total = total as f64;

    let mut survivors: Vec<Bucket> = buckets
        .iter()
        .filter(|b| b.population as f64 / total >= MIN_POPULATION_SHARE)
        .filter(|b| b.color.brightness() >= MIN_BRIGHTNESS)
        .filter(|b| b.color.colorfulness() >= MIN_COLORFULNESS)
        .copied()
        .collect();

    let colored: usize = survivors.iter().map(|b| b.population).sum();
    if (colored as f64) / total < MIN_COLORED_SHARE {
        return Vec::new();
    }

    survivors.sort_by(|a, b| b.rank().total_cmp(&a.rank()));
    survivors
}

// ─────────────────────────────────────────────────────────────────────────────
// Brightness
// ─────────────────────────────────────────────────────────────────────────────

/// Estimates the average brightness from a grid of roughly
/// [`BRIGHTNESS_SAMPLES`] pixels, averaging in linear light.
pub(crate) fn average_brightness(image: &DynamicImage) -> f64 {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return 0.0;
    }

    let area = u64::from(width) * u64::from(height);
    let stride = ((area / BRIGHTNESS_SAMPLES) as f64).sqrt().floor().max(1.0) as usize;

    let linear = |c: u8| (f64::from(c) / 255.0).powf(GAMMA);
    let mut sum = 0.0;
    let mut count = 0u32;
    for y in (0..height).step_by(stride) {
        for x in (0..width).step_by(stride) {
            let [r, g, b, _] = image.get_pixel(x, y).0;
            sum += 0.299 * linear(r) + 0.587 * linear(g) + 0.114 * linear(b);
            count += 1;
        }
    }

    (sum / f64::from(count)).powf(1.0 / GAMMA).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    /// Builds a 32x32 image from horizontal bands of `(rows, color)`.
    fn banded(bands: &[(u32, [u8; 3])]) -> DynamicImage {
        let mut img = RgbaImage::new(32, 32);
        let mut row = 0;
        for &(rows, [r, g, b]) in bands {
            for y in row..row + rows {
                for x in 0..32 {
                    img.put_pixel(x, y, Rgba([r, g, b, 255]));
                }
            }
            row += rows;
        }
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn gray_image_takes_grayscale_path() {
        let colors = analyze(&banded(&[(32, [128, 128, 128])]));
        assert_eq!(colors.primary, Rgb::WHITE);
        assert!((colors.brightness - 0.502).abs() < 0.01, "{}", colors.brightness);
        assert_eq!(colors.secondary, Rgb::WHITE.scaled(colors.brightness));
    }

    #[test]
    fn single_color_takes_monochrome_path() {
        let colors = analyze(&banded(&[(32, [128, 0, 0])]));
        assert_eq!(colors.secondary, Rgb::new(128, 0, 0));
        assert_eq!(colors.primary, Rgb::new(255, 0, 0));
    }

    #[test]
    fn two_colors_brighter_becomes_primary() {
        let colors = analyze(&banded(&[(16, [0, 0, 255]), (16, [255, 0, 0])]));
        assert_eq!(colors.primary, Rgb::new(255, 0, 0));
        assert_eq!(colors.secondary, Rgb::new(0, 0, 255));
    }

    #[test]
    fn ranking_prefers_large_bright_regions() {
        // red rank .625*.299, green .094*.587, blue .281*.114
        let colors = analyze(&banded(&[
            (20, [255, 0, 0]),
            (9, [0, 0, 255]),
            (3, [0, 255, 0]),
        ]));
        assert_eq!(colors.primary, Rgb::new(0, 255, 0));
        assert_eq!(colors.secondary, Rgb::new(255, 0, 0));
    }

    #[test]
    fn tiny_color_accent_on_gray_is_ignored() {
        // One colored row on 31 gray rows is below the colored-share floor.
        let colors = analyze(&banded(&[(31, [90, 90, 90]), (1, [255, 0, 0])]));
        assert_eq!(colors.primary, Rgb::WHITE);
    }

    #[test]
    fn transparent_pixels_are_ignored() {
        let mut img = RgbaImage::new(8, 8);
        for (x, _, p) in img.enumerate_pixels_mut() {
            *p = if x < 4 {
                Rgba([0, 0, 255, 0])
            } else {
                Rgba([0, 200, 0, 255])
            };
        }
        let colors = analyze(&DynamicImage::ImageRgba8(img));
        assert_eq!(colors.secondary, Rgb::new(0, 200, 0));
    }

    #[test]
    fn median_cut_respects_bucket_bound() {
        let pixels: Vec<[u8; 3]> = (0..=255u8).map(|v| [v, 255 - v, v / 2]).collect();
        let buckets = median_cut(pixels, 8);
        assert_eq!(buckets.len(), 8);
        assert_eq!(buckets.iter().map(|b| b.population).sum::<usize>(), 256);
    }

    #[test]
    fn average_brightness_extremes() {
        assert_eq!(average_brightness(&banded(&[(32, [0, 0, 0])])), 0.0);
        let white = average_brightness(&banded(&[(32, [255, 255, 255])]));
        assert!((white - 1.0).abs() < 1e-9);
    }
}
