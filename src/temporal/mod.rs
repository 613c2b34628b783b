//! Frame-level analysis for animated inputs.
//!
//! - [`dedup`]: collapse visually static runs to one representative frame
//! - [`keyframes`]: bounded-budget selection of motion keyframes
//! - [`voting`]: consensus text across per-frame OCR readings
//!
//! Inputs with one frame never reach this module; the waves that use it emit
//! nothing for still images.

pub mod dedup;
pub mod keyframes;
pub mod voting;

pub use dedup::{deduplicate, frame_similarity, DedupConfig};
pub use keyframes::{extract_keyframes, motion_score, select_keyframes};
pub use voting::{normalize_text, text_sequence, vote, FrameReading, VoteOutcome};

/// Settings shared by the temporal waves.
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalConfig {
    pub dedup: DedupConfig,
    /// Upper bound on frames kept for keyframes and per-frame OCR.
    pub max_frames: usize,
    /// Minimum normalized similarity for two OCR readings to agree.
    pub vote_similarity: f64,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            dedup: DedupConfig::default(),
            max_frames: 10,
            vote_similarity: 0.8,
        }
    }
}

/// Guard against an empty selection: fall back to the original frames,
/// truncated to the budget.
pub fn or_fallback(selected: Vec<usize>, frame_count: usize, budget: usize) -> Vec<usize> {
    if selected.is_empty() {
        (0..frame_count.min(budget.max(1))).collect()
    } else {
        selected
    }
}

/// Thin a sorted index list to at most `budget` entries, keeping the first
/// and last and spacing the rest evenly.
pub fn limit_evenly(indices: &[usize], budget: usize) -> Vec<usize> {
    if indices.len() <= budget {
        return indices.to_vec();
    }
    if budget == 0 {
        return Vec::new();
    }
    if budget == 1 {
        return vec![indices[0]];
    }

    let last = indices.len() - 1;
    let mut picked: Vec<usize> = (0..budget)
        .map(|k| indices[((k * last) as f64 / (budget - 1) as f64).round() as usize])
        .collect();
    picked.dedup();
    picked
}
