//! Sharpness, brightness and contrast heuristics.

use super::{run_blocking, ANALYSIS_MAX_SIDE};
use crate::input::pixels::{downscale, luma_plane};
use crate::input::AnalysisInput;
use crate::signal::{Signal, SignalLedger};
use crate::wave::{Wave, WaveContext};
use anyhow::Result;
use async_trait::async_trait;
use image::RgbaImage;
use std::sync::Arc;

const NAME: &str = "quality";

#[derive(Debug, Clone)]
pub struct QualityWave {
    /// Laplacian variance below which the image is reported blurry.
    pub blur_threshold: f64,
}

impl Default for QualityWave {
    fn default() -> Self {
        Self {
            blur_threshold: 100.0,
        }
    }
}

/// Variance of the 4-neighbour Laplacian over interior pixels.
pub fn laplacian_variance(plane: &[f64], width: usize, height: usize) -> f64 {
    if width < 3 || height < 3 {
        return 0.0;
    }

    let mut values = Vec::with_capacity((width - 2) * (height - 2));
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let at = |x: usize, y: usize| plane[y * width + x];
            values.push(4.0 * at(x, y) - at(x - 1, y) - at(x + 1, y) - at(x, y - 1) - at(x, y + 1));
        }
    }

    mean_and_variance(&values).1
}

fn mean_and_variance(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance)
}

impl QualityWave {
    fn measure(&self, image: &RgbaImage) -> Vec<Signal> {
        let (width, height) = image.dimensions();
        let plane = luma_plane(image);

        let sharpness = laplacian_variance(&plane, width as usize, height as usize);
        let (mean, variance) = mean_and_variance(&plane);

        vec![
            Signal::new(NAME, "quality.sharpness", sharpness, 0.8),
            Signal::new(NAME, "quality.brightness", mean / 255.0, 1.0),
            Signal::new(NAME, "quality.contrast", variance.sqrt() / 255.0, 1.0),
            Signal::new(NAME, "quality.is_blurry", sharpness < self.blur_threshold, 0.6)
                .with_meta("threshold", self.blur_threshold.to_string()),
        ]
    }
}

#[async_trait]
impl Wave for QualityWave {
    fn name(&self) -> &str {
        NAME
    }

    async fn execute(
        &self,
        input: &AnalysisInput,
        _ledger: &SignalLedger,
        ctx: &WaveContext,
    ) -> Result<Vec<Signal>> {
        let wave = self.clone();
        let frames = Arc::clone(&input.frames);
        run_blocking(ctx, move |_| {
            Ok(wave.measure(&downscale(&frames[0].image, ANALYSIS_MAX_SIDE)))
        })
        .await
    }
}
