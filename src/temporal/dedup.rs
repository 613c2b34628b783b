//! Text-change frame deduplication.
//!
//! Compares every frame against the last kept frame using a weighted luma
//! similarity that emphasises the lower caption band and the bright pixels
//! inside it, so runs of frames showing the same subtitle collapse to one.

use crate::input::pixels::{luma, sample_grid};
use image::RgbaImage;
use std::borrow::Borrow;

const FULL_FRAME_WEIGHT: f64 = 0.3;
const TEXT_REGION_WEIGHT: f64 = 0.4;
const BRIGHT_TEXT_WEIGHT: f64 = 0.3;
/// Bright-pixel differences count double before clamping.
const BRIGHT_TEXT_EMPHASIS: f64 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub struct DedupConfig {
    /// Frames at or above this similarity to the last kept frame are dropped.
    pub threshold: f64,
    /// Height of the caption band, as a fraction of the frame from the bottom.
    pub text_region_fraction: f64,
    /// Luma at or above which a pixel counts as likely text.
    pub bright_luma_threshold: u8,
    pub sample_step: u32,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            threshold: 0.85,
            text_region_fraction: 1.0 / 3.0,
            bright_luma_threshold: 200,
            sample_step: 4,
        }
    }
}

/// Weighted similarity in `[0, 1]` between two frames.
///
/// Frames of different dimensions are treated as completely different.
pub fn frame_similarity(a: &RgbaImage, b: &RgbaImage, config: &DedupConfig) -> f64 {
    if a.dimensions() != b.dimensions() {
        return 0.0;
    }

    let (width, height) = a.dimensions();
    if width == 0 || height == 0 {
        return 1.0;
    }

    let fraction = config.text_region_fraction.clamp(0.0, 1.0);
    let region_top = ((height as f64) * (1.0 - fraction)).floor() as u32;
    let bright = config.bright_luma_threshold as f64;

    let (mut full_sum, mut full_n) = (0.0, 0usize);
    let (mut region_sum, mut region_n) = (0.0, 0usize);
    let (mut text_sum, mut text_n) = (0.0, 0usize);

    for (x, y) in sample_grid(width, height, config.sample_step) {
        let la = luma(a.get_pixel(x, y));
        let lb = luma(b.get_pixel(x, y));
        let diff = (la - lb).abs() / 255.0;

        full_sum += diff;
        full_n += 1;

        if y >= region_top {
            region_sum += diff;
            region_n += 1;
            if la >= bright || lb >= bright {
                text_sum += diff;
                text_n += 1;
            }
        }
    }

    let full = mean(full_sum, full_n);
    let region = mean(region_sum, region_n);
    let text = (mean(text_sum, text_n) * BRIGHT_TEXT_EMPHASIS).min(1.0);

    let difference =
        FULL_FRAME_WEIGHT * full + TEXT_REGION_WEIGHT * region + BRIGHT_TEXT_WEIGHT * text;
    (1.0 - difference).clamp(0.0, 1.0)
}

fn mean(sum: f64, n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Indices of frames judged meaningfully different, always starting at 0.
///
/// Returns an empty vector only for an empty input.
pub fn deduplicate<F: Borrow<RgbaImage>>(frames: &[F], config: &DedupConfig) -> Vec<usize> {
    if frames.is_empty() {
        return Vec::new();
    }

    let mut kept = vec![0];
    let mut last = frames[0].borrow();

    for (index, frame) in frames.iter().enumerate().skip(1) {
        let frame = frame.borrow();
        if frame_similarity(last, frame, config) < config.threshold {
            kept.push(index);
            last = frame;
        }
    }

    kept
}
