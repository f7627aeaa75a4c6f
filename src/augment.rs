//! Photometric augmentation for pages that carry a date region.
//!
//! Dates are the rarest class, so every page with at least one date region is
//! emitted four more times with slightly different brightness and contrast.
//! Only pixel intensities change; the region list is shared untouched.

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::map::map_colors;

use crate::types::{has_element_type, Region, DATE_CLASS};

pub const BRIGHTNESS_FACTORS: [f32; 2] = [0.8, 1.2];
pub const CONTRAST_FACTORS: [f32; 2] = [0.9, 1.1];

/// Return the original image followed by its variants, each paired with `regions`.
pub fn augment_image<'a>(
    image: &DynamicImage,
    regions: &'a [Region],
) -> Vec<(DynamicImage, &'a [Region])> {
    let mut augmented = vec![(image.clone(), regions)];

    if !has_element_type(regions, DATE_CLASS) {
        return augmented;
    }

    let rgb = image.to_rgb8();
    for factor in BRIGHTNESS_FACTORS {
        augmented.push((
            DynamicImage::ImageRgb8(adjust_brightness(&rgb, factor)),
            regions,
        ));
    }
    for factor in CONTRAST_FACTORS {
        augmented.push((
            DynamicImage::ImageRgb8(adjust_contrast(&rgb, factor)),
            regions,
        ));
    }

    augmented
}

/// Blend towards black: `p * factor`.
pub fn adjust_brightness(image: &RgbImage, factor: f32) -> RgbImage {
    map_colors(image, |Rgb(channels)| {
        Rgb(channels.map(|c| blend(0.0, c as f32, factor)))
    })
}

/// Blend towards a flat gray at the mean luma: `mean + (p - mean) * factor`.
pub fn adjust_contrast(image: &RgbImage, factor: f32) -> RgbImage {
    let mean = mean_luma(image);
    map_colors(image, |Rgb(channels)| {
        Rgb(channels.map(|c| blend(mean, c as f32, factor)))
    })
}

// Clamped, then truncated towards zero like an 8-bit cast
fn blend(degenerate: f32, value: f32, factor: f32) -> u8 {
    (degenerate + factor * (value - degenerate)).clamp(0.0, 255.0) as u8
}

// ITU-R 601-2 luma, rounded to the nearest integer level
fn mean_luma(image: &RgbImage) -> f32 {
    let count = u64::from(image.width()) * u64::from(image.height());
    if count == 0 {
        return 0.0;
    }
    let sum: u64 = image
        .pixels()
        .map(|Rgb([r, g, b])| {
            (u64::from(*r) * 19595 + u64::from(*g) * 38470 + u64::from(*b) * 7471 + 0x8000) >> 16
        })
        .sum();
    (sum as f64 / count as f64 + 0.5).floor() as f32
}
