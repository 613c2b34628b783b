use super::{analysis_frames, run_blocking};
use crate::input::AnalysisInput;
use crate::signal::{Signal, SignalLedger, SignalValue};
use crate::temporal::{extract_keyframes, TemporalConfig};
use crate::wave::{Wave, WaveContext};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

const NAME: &str = "motion";

/// Motion scoring and keyframe selection for animations.
pub struct MotionWave {
    config: TemporalConfig,
}

impl MotionWave {
    pub fn new(config: TemporalConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Wave for MotionWave {
    fn name(&self) -> &str {
        NAME
    }

    async fn execute(
        &self,
        input: &AnalysisInput,
        _ledger: &SignalLedger,
        ctx: &WaveContext,
    ) -> Result<Vec<Signal>> {
        if !input.is_animated() {
            debug!("Single frame input; no motion to measure");
            return Ok(Vec::new());
        }

        let frames = Arc::clone(&input.frames);
        let (max_frames, sample_step) = (self.config.max_frames, self.config.dedup.sample_step);
        let (keyframes, scores) = run_blocking(ctx, move |cancel| {
            let small = analysis_frames(&frames, cancel)?;
            Ok(extract_keyframes(&small, max_frames, sample_step))
        })
        .await?;

        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        let (peak_transition, peak) = scores
            .iter()
            .copied()
            .enumerate()
            .fold((0, 0.0), |best, (i, s)| if s > best.1 { (i, s) } else { best });

        debug!(
            "Selected {} keyframe(s) from {} frames (mean motion {:.3})",
            keyframes.len(),
            input.frame_count(),
            mean
        );

        Ok(vec![
            Signal::new(
                NAME,
                "motion.keyframes",
                SignalValue::from(keyframes),
                0.9,
            )
            .with_meta("budget", self.config.max_frames.to_string()),
            Signal::new(NAME, "motion.mean_score", mean, 0.9),
            Signal::new(NAME, "motion.peak_score", peak, 0.9),
            // The peak transition ends on the following frame.
            Signal::new(NAME, "motion.peak_frame", peak_transition + 1, 0.9),
        ])
    }
}
