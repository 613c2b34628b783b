//! Cheap structural estimates: how busy the image is and how much of it
//! looks like lines of text.
//!
//! Text rows are found by counting sharp luma transitions along each row.
//! Printed glyphs produce dense, regular transitions; photographs mostly
//! produce either very few (smooth areas) or noise-level ones.

use super::{run_blocking, ANALYSIS_MAX_SIDE};
use crate::input::pixels::{downscale, luma_plane};
use crate::input::AnalysisInput;
use crate::signal::{Signal, SignalLedger};
use crate::wave::{Wave, WaveContext};
use anyhow::Result;
use async_trait::async_trait;
use image::RgbaImage;
use std::sync::Arc;

const NAME: &str = "content";

#[derive(Debug, Clone)]
pub struct ContentWave {
    /// Luma step that counts as an edge or transition.
    pub edge_threshold: f64,
    /// Transition density range (per pixel) of a text-like row.
    pub text_row_density: (f64, f64),
    /// Fraction of text-like rows that maps to a likeliness of 1.0.
    pub full_text_coverage: f64,
}

impl Default for ContentWave {
    fn default() -> Self {
        Self {
            edge_threshold: 48.0,
            text_row_density: (0.05, 0.6),
            full_text_coverage: 0.4,
        }
    }
}

impl ContentWave {
    /// Fraction of pixels whose horizontal plus vertical gradient exceeds
    /// the edge threshold.
    pub fn edge_density(&self, plane: &[f64], width: usize, height: usize) -> f64 {
        if width < 2 || height < 2 {
            return 0.0;
        }

        let mut edges = 0usize;
        for y in 0..height - 1 {
            for x in 0..width - 1 {
                let here = plane[y * width + x];
                let gradient = (plane[y * width + x + 1] - here).abs()
                    + (plane[(y + 1) * width + x] - here).abs();
                if gradient > self.edge_threshold {
                    edges += 1;
                }
            }
        }
        edges as f64 / ((width - 1) * (height - 1)) as f64
    }

    pub fn text_likeliness(&self, plane: &[f64], width: usize, height: usize) -> f64 {
        if width < 2 || height == 0 {
            return 0.0;
        }

        let (low, high) = self.text_row_density;
        let text_rows = plane
            .chunks(width)
            .filter(|row| {
                let transitions = row
                    .windows(2)
                    .filter(|pair| (pair[1] - pair[0]).abs() > self.edge_threshold)
                    .count();
                let density = transitions as f64 / (width - 1) as f64;
                density >= low && density <= high
            })
            .count();

        let coverage = text_rows as f64 / height as f64;
        (coverage / self.full_text_coverage).min(1.0)
    }

    fn measure(&self, image: &RgbaImage) -> Vec<Signal> {
        let (width, height) = image.dimensions();
        let (width, height) = (width as usize, height as usize);
        let plane = luma_plane(image);

        vec![
            Signal::new(
                NAME,
                "content.text_likeliness",
                self.text_likeliness(&plane, width, height),
                0.6,
            ),
            Signal::new(
                NAME,
                "content.edge_density",
                self.edge_density(&plane, width, height),
                0.8,
            ),
        ]
    }
}

#[async_trait]
impl Wave for ContentWave {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::testing::{solid, still, striped, value};

    #[tokio::test]
    async fn test_flat_image_has_no_text() {
        let signals = ContentWave::default()
            .execute(&still(solid(32, 32, [200, 30, 30])), &SignalLedger::new(), &WaveContext::default())
            .await
            .unwrap();
        assert_eq!(value(&signals, "content.text_likeliness").and_then(|v| v.as_f64()), Some(0.0));
        assert_eq!(value(&signals, "content.edge_density").and_then(|v| v.as_f64()), Some(0.0));
    }

    #[tokio::test]
    async fn test_striped_band_looks_like_text() {
        let signals = ContentWave::default()
            .execute(&still(striped(64, 48)), &SignalLedger::new(), &WaveContext::default())
            .await
            .unwrap();
        let text = value(&signals, "content.text_likeliness").and_then(|v| v.as_f64()).unwrap();
        assert!(text > 0.5, "text likeliness {}", text);
        let edges = value(&signals, "content.edge_density").and_then(|v| v.as_f64()).unwrap();
        assert!(edges > 0.0 && edges < 1.0);
    }

    #[test]
    fn test_noise_rows_rejected() {
        let wave = ContentWave::default();
        // Every pixel alternates: far denser than glyph strokes.
        let plane: Vec<f64> = (0..100).map(|i| if i % 2 == 0 { 0.0 } else { 255.0 }).collect();
        assert_eq!(wave.text_likeliness(&plane, 10, 10), 0.0);
    }
}
