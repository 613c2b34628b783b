//! Bounded-budget motion keyframe selection.

use crate::input::pixels::sample_grid;
use image::RgbaImage;
use std::borrow::Borrow;
use std::collections::BTreeSet;

/// Mean absolute RGB difference over a sampled grid, normalized to `[0, 1]`.
///
/// Frames of different dimensions score as full motion.
pub fn motion_score(a: &RgbaImage, b: &RgbaImage, sample_step: u32) -> f64 {
    if a.dimensions() != b.dimensions() {
        return 1.0;
    }

    let (width, height) = a.dimensions();
    let mut sum = 0.0;
    let mut samples = 0usize;

    for (x, y) in sample_grid(width, height, sample_step) {
        let pa = a.get_pixel(x, y).0;
        let pb = b.get_pixel(x, y).0;
        let diff: u32 = (0..3).map(|c| pa[c].abs_diff(pb[c]) as u32).sum();
        sum += diff as f64 / (3.0 * 255.0);
        samples += 1;
    }

    if samples == 0 {
        0.0
    } else {
        sum / samples as f64
    }
}

/// Motion score of every consecutive frame pair: `scores[i]` is the change
/// from frame `i` to frame `i + 1`.
pub fn transition_scores<F: Borrow<RgbaImage>>(frames: &[F], sample_step: u32) -> Vec<f64> {
    frames
        .windows(2)
        .map(|pair| motion_score(pair[0].borrow(), pair[1].borrow(), sample_step))
        .collect()
}

/// Choose at most `max_frames` frame indices out of `frame_count`.
///
/// The first and last frames are always kept; the rest of the budget goes
/// to frames that end a local motion peak (highest first), and any slots
/// still open are filled with evenly spaced indices. A budget below two is
/// raised to two so both endpoints fit.
pub fn select_keyframes(scores: &[f64], frame_count: usize, max_frames: usize) -> Vec<usize> {
    if frame_count == 0 {
        return Vec::new();
    }
    if frame_count == 1 {
        return vec![0];
    }

    let budget = max_frames.max(2);
    if frame_count <= budget {
        return (0..frame_count).collect();
    }

    let mut selected = BTreeSet::from([0, frame_count - 1]);

    let mut peaks: Vec<(usize, f64)> = scores
        .iter()
        .enumerate()
        .filter(|&(i, &score)| {
            let left = i == 0 || score >= scores[i - 1];
            let right = i + 1 >= scores.len() || score >= scores[i + 1];
            score > 0.0 && left && right
        })
        .map(|(i, &score)| (i + 1, score))
        .collect();
    peaks.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    for (frame, _) in peaks {
        if selected.len() >= budget {
            break;
        }
        selected.insert(frame);
    }

    if selected.len() < budget {
        let span = (frame_count - 1) as f64;
        let slots = (budget - 1) as f64;
        for k in 0..budget {
            if selected.len() >= budget {
                break;
            }
            let index = ((k as f64) * span / slots).round() as usize;
            selected.insert(index.min(frame_count - 1));
        }
    }

    // Even spacing can collide with earlier picks; top up in index order.
    let mut next = 0;
    while selected.len() < budget && next < frame_count {
        selected.insert(next);
        next += 1;
    }

    selected.into_iter().collect()
}

/// Score transitions and select keyframes in one step.
///
/// `max_frames` below two behaves as two: with more than one frame the
/// first and last are always returned. Configuration rejects such budgets
/// before they get here.
pub fn extract_keyframes<F: Borrow<RgbaImage>>(
    frames: &[F],
    max_frames: usize,
    sample_step: u32,
) -> (Vec<usize>, Vec<f64>) {
    let scores = transition_scores(frames, sample_step);
    let keyframes = select_keyframes(&scores, frames.len(), max_frames);
    (keyframes, scores)
}
