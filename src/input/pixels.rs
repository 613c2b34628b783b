//! Small pixel helpers shared by the local analyzers and temporal logic.

use image::imageops::FilterType;
use image::{Rgba, RgbaImage};
use std::borrow::Cow;

/// Rec. 601 luma in `[0, 255]`.
pub fn luma(pixel: &Rgba<u8>) -> f64 {
    let [r, g, b, _] = pixel.0;
    0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64
}

/// HSV-style saturation in `[0, 1]`.
pub fn saturation(pixel: &Rgba<u8>) -> f64 {
    let [r, g, b, _] = pixel.0;
    let max = r.max(g).max(b) as f64;
    let min = r.min(g).min(b) as f64;
    if max == 0.0 {
        0.0
    } else {
        (max - min) / max
    }
}

/// Coordinates of a regular sampling grid with the given step.
pub fn sample_grid(width: u32, height: u32, step: u32) -> impl Iterator<Item = (u32, u32)> {
    let step = step.max(1) as usize;
    (0..height)
        .step_by(step)
        .flat_map(move |y| (0..width).step_by(step).map(move |x| (x, y)))
}

/// Luma plane of an image, row-major.
pub fn luma_plane(image: &RgbaImage) -> Vec<f64> {
    image.pixels().map(luma).collect()
}

/// Lowercase `#rrggbb` representation.
pub fn hex_color(rgb: [u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2])
}

/// Shrink `image` so its longest side is at most `max_side`, preserving
/// aspect ratio. Smaller images are borrowed unchanged.
pub fn downscale(image: &RgbaImage, max_side: u32) -> Cow<'_, RgbaImage> {
    let (width, height) = image.dimensions();
    let longest = width.max(height);
    if longest <= max_side || max_side == 0 {
        return Cow::Borrowed(image);
    }

    let scale = max_side as f64 / longest as f64;
    Cow::Owned(image::imageops::resize(
        image,
        ((width as f64 * scale).round() as u32).max(1),
        ((height as f64 * scale).round() as u32).max(1),
        FilterType::Triangle,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luma_extremes() {
        assert_eq!(luma(&Rgba([0, 0, 0, 255])), 0.0);
        assert!((luma(&Rgba([255, 255, 255, 255])) - 255.0).abs() < 1e-9);
    }

    #[test]
    fn test_saturation() {
        assert_eq!(saturation(&Rgba([128, 128, 128, 255])), 0.0);
        assert_eq!(saturation(&Rgba([255, 0, 0, 255])), 1.0);
    }

    #[test]
    fn test_sample_grid() {
        let points: Vec<(u32, u32)> = sample_grid(5, 3, 2).collect();
        assert_eq!(points, vec![(0, 0), (2, 0), (4, 0), (0, 2), (2, 2), (4, 2)]);
    }

    #[test]
    fn test_downscale() {
        let small = RgbaImage::new(10, 4);
        assert!(matches!(downscale(&small, 16), Cow::Borrowed(_)));

        let wide = RgbaImage::new(400, 100);
        assert_eq!(downscale(&wide, 200).dimensions(), (200, 50));
    }

    #[test]
    fn test_hex_color() {
        assert_eq!(hex_color([255, 16, 0]), "#ff1000");
    }
}
