use super::{analysis_frames, run_blocking};
use crate::input::AnalysisInput;
use crate::signal::{Signal, SignalLedger, SignalValue};
use crate::temporal::{deduplicate, or_fallback, TemporalConfig};
use crate::wave::{Wave, WaveContext};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

const NAME: &str = "dedup";

/// Collapses runs of frames that show the same caption.
pub struct DedupWave {
    config: TemporalConfig,
}

impl DedupWave {
    pub fn new(config: TemporalConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Wave for DedupWave {
    fn name(&self) -> &str {
        NAME
    }

    async fn execute(
        &self,
        input: &AnalysisInput,
        _ledger: &SignalLedger,
        ctx: &WaveContext,
    ) -> Result<Vec<Signal>> {
        let original = input.frame_count();
        if original <= 1 {
            debug!("Single frame input; nothing to deduplicate");
            return Ok(Vec::new());
        }

        let frames = Arc::clone(&input.frames);
        let (dedup, budget) = (self.config.dedup.clone(), self.config.max_frames);
        let kept = run_blocking(ctx, move |cancel| {
            let small = analysis_frames(&frames, cancel)?;
            Ok(or_fallback(deduplicate(&small, &dedup), original, budget))
        })
        .await?;
        let reduction = 1.0 - kept.len() as f64 / original as f64;
        debug!("Kept {} of {} frames", kept.len(), original);

        Ok(vec![
            Signal::new(NAME, "frames.dedup.kept_count", kept.len(), 1.0),
            Signal::new(NAME, "frames.dedup.original_count", original, 1.0),
            Signal::new(NAME, "frames.dedup.reduction", reduction, 1.0),
            Signal::new(NAME, "frames.dedup.kept_indices", SignalValue::from(kept), 0.9)
                .with_meta("threshold", self.config.dedup.threshold.to_string()),
        ])
    }
}
