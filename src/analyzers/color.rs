//! Palette and tone statistics of the first frame.

use super::{run_blocking, ANALYSIS_MAX_SIDE};
use crate::input::pixels::{downscale, hex_color, luma, saturation};
use crate::input::AnalysisInput;
use crate::signal::{Signal, SignalLedger, SignalValue};
use crate::wave::{Wave, WaveContext};
use anyhow::Result;
use async_trait::async_trait;
use image::RgbaImage;
use std::collections::HashMap;
use std::sync::Arc;

const NAME: &str = "color";

/// Pixels more transparent than this are ignored.
const MIN_ALPHA: u8 = 16;

#[derive(Debug, Clone)]
pub struct ColorWave {
    pub palette_size: usize,
    /// Mean saturation below which the image counts as grayscale.
    pub grayscale_saturation: f64,
}

impl Default for ColorWave {
    fn default() -> Self {
        Self {
            palette_size: 5,
            grayscale_saturation: 0.05,
        }
    }
}

/// 4-bit-per-channel bucket, reported as the bucket's center color.
fn bucket(rgb: [u8; 3]) -> [u8; 3] {
    rgb.map(|c| (c & 0xF0) | 0x08)
}

impl ColorWave {
    fn measure(&self, image: &RgbaImage) -> Vec<Signal> {
        let mut opaque: Vec<_> = image.pixels().filter(|p| p.0[3] >= MIN_ALPHA).collect();
        if opaque.is_empty() {
            opaque = image.pixels().collect();
        }
        if opaque.is_empty() {
            return Vec::new();
        }

        let mut counts: HashMap<[u8; 3], usize> = HashMap::new();
        let (mut luma_sum, mut sat_sum) = (0.0, 0.0);
        for pixel in &opaque {
            let [r, g, b, _] = pixel.0;
            *counts.entry(bucket([r, g, b])).or_default() += 1;
            luma_sum += luma(pixel);
            sat_sum += saturation(pixel);
        }

        let total = opaque.len() as f64;
        let mean_luminance = luma_sum / total / 255.0;
        let mean_saturation = sat_sum / total;

        let mut ranked: Vec<([u8; 3], usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(self.palette_size.max(1));

        let palette: Vec<SignalValue> = ranked
            .iter()
            .map(|(rgb, _)| SignalValue::from(hex_color(*rgb)))
            .collect();
        let (dominant, dominant_count) = ranked[0];
        let dominant_share = dominant_count as f64 / total;

        vec![
            Signal::new(NAME, "color.palette", palette, 0.9),
            Signal::new(NAME, "color.dominant", hex_color(dominant), dominant_share.max(0.5))
                .with_meta("share", format!("{:.3}", dominant_share)),
            Signal::new(NAME, "color.mean_luminance", mean_luminance, 1.0),
            Signal::new(NAME, "color.saturation", mean_saturation, 1.0),
            Signal::new(
                NAME,
                "color.is_grayscale",
                mean_saturation < self.grayscale_saturation,
                0.9,
            ),
        ]
    }
}

#[async_trait]
impl Wave for ColorWave {
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
