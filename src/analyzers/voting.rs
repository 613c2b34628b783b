use crate::input::AnalysisInput;
use crate::signal::{Signal, SignalLedger, SignalValue};
use crate::temporal::{limit_evenly, text_sequence, vote, FrameReading, TemporalConfig};
use crate::vision::OcrEngine;
use crate::wave::{Wave, WaveContext};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, warn};

const NAME: &str = "ocr_voting";

/// Per-frame OCR over the deduplicated frames, fused by consensus vote.
pub struct OcrVotingWave {
    engine: Arc<dyn OcrEngine>,
    config: TemporalConfig,
}

impl OcrVotingWave {
    pub fn new(engine: Arc<dyn OcrEngine>, config: TemporalConfig) -> Self {
        Self { engine, config }
    }
}

#[async_trait]
impl Wave for OcrVotingWave {
    fn name(&self) -> &str {
        NAME
    }

    async fn execute(
        &self,
        input: &AnalysisInput,
        ledger: &SignalLedger,
        ctx: &WaveContext,
    ) -> Result<Vec<Signal>> {
        let kept = ledger
            .get("frames.dedup.kept_indices")
            .and_then(|v| v.as_indices())
            .context("frames.dedup.kept_indices is not a list of frame indices")?;

        let candidates: Vec<usize> = kept
            .into_iter()
            .filter(|&i| i < input.frame_count())
            .collect();
        let frames = limit_evenly(&candidates, self.config.max_frames);
        debug!("Running OCR on {} frame(s)", frames.len());

        let results: Vec<(usize, Result<crate::vision::OcrReading>)> = stream::iter(frames)
            .map(|index| {
                let engine = self.engine.clone();
                let image = &input.frames[index].image;
                async move { (index, engine.recognize(image).await) }
            })
            .buffer_unordered(ctx.concurrency)
            .collect()
            .await;

        let attempted = results.len();
        let mut readings: Vec<FrameReading> = Vec::with_capacity(attempted);
        for (frame, result) in results {
            match result {
                Ok(reading) => readings.push(FrameReading {
                    frame,
                    text: reading.text,
                    confidence: reading.confidence,
                }),
                Err(e) => warn!("OCR failed on frame {}: {:#}", frame, e),
            }
        }
        if attempted > 0 && readings.is_empty() {
            anyhow::bail!("OCR failed on all {} frame(s)", attempted);
        }
        readings.sort_by_key(|r| r.frame);

        let mut signals = vec![Signal::new(
            NAME,
            "ocr.voting.frames_voted",
            readings.len(),
            1.0,
        )];

        let sequence = text_sequence(&readings, self.config.vote_similarity);
        if !sequence.is_empty() {
            signals.push(Signal::new(
                NAME,
                "ocr.temporal.text_sequence",
                SignalValue::from(sequence),
                0.8,
            ));
        }

        if let Some(outcome) = vote(&readings, self.config.vote_similarity) {
            debug!(
                "Consensus '{}' with agreement {:.2}",
                outcome.consensus_text, outcome.agreement
            );
            let supporting = outcome
                .supporting_frames
                .iter()
                .map(|f| f.to_string())
                .collect::<Vec<_>>()
                .join(",");
            signals.push(
                Signal::new(
                    NAME,
                    "ocr.voting.consensus_text",
                    outcome.consensus_text,
                    outcome.stabilization_confidence,
                )
                .with_meta("supporting_frames", supporting),
            );
            signals.push(Signal::new(NAME, "ocr.voting.agreement", outcome.agreement, 1.0));
            signals.push(Signal::new(
                NAME,
                "ocr.voting.stabilization_confidence",
                outcome.stabilization_confidence,
                1.0,
            ));
        }

        Ok(signals)
    }
}
