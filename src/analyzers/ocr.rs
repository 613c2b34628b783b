use crate::input::AnalysisInput;
use crate::signal::{Signal, SignalLedger};
use crate::vision::OcrEngine;
use crate::wave::{Wave, WaveContext};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

const NAME: &str = "ocr";

/// Below this text likeliness the OCR call is not worth making.
const MIN_TEXT_LIKELINESS: f64 = 0.02;

/// Single-frame text extraction.
///
/// Animations are read from their middle motion keyframe when one is
/// available, otherwise from the first frame.
pub struct OcrWave {
    engine: Arc<dyn OcrEngine>,
}

impl OcrWave {
    pub fn new(engine: Arc<dyn OcrEngine>) -> Self {
        Self { engine }
    }
}

fn representative_frame(input: &AnalysisInput, ledger: &SignalLedger) -> usize {
    ledger
        .get("motion.keyframes")
        .and_then(|v| v.as_indices())
        .and_then(|keys| keys.get(keys.len() / 2).copied())
        .filter(|&index| index < input.frame_count())
        .unwrap_or(0)
}

#[async_trait]
impl Wave for OcrWave {
    fn name(&self) -> &str {
        NAME
    }

    async fn execute(
        &self,
        input: &AnalysisInput,
        ledger: &SignalLedger,
        _ctx: &WaveContext,
    ) -> Result<Vec<Signal>> {
        if let Some(likeliness) = ledger.get_f64("content.text_likeliness") {
            if likeliness < MIN_TEXT_LIKELINESS {
                debug!("Text likeliness {:.3}; skipping OCR", likeliness);
                return Ok(Vec::new());
            }
        }

        let frame = representative_frame(input, ledger);
        let reading = self.engine.recognize(&input.frames[frame].image).await?;
        let words = reading.text.split_whitespace().count();
        debug!("OCR read {} word(s) from frame {}", words, frame);

        Ok(vec![
            Signal::new(NAME, "ocr.text", reading.text.as_str(), reading.confidence)
                .with_meta("engine", self.engine.name())
                .with_meta("frame", frame.to_string()),
            Signal::new(NAME, "ocr.confidence", reading.confidence, 1.0),
            Signal::new(NAME, "ocr.word_count", words, reading.confidence),
        ])
    }
}
