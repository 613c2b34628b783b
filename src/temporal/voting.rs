//! Cross-frame consensus over per-frame OCR readings.

use serde::Serialize;

/// OCR output for a single frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReading {
    pub frame: usize,
    pub text: String,
    pub confidence: f64,
}

/// Result of a consensus vote.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoteOutcome {
    pub consensus_text: String,
    /// Fraction of all voting frames whose text matches the consensus.
    pub agreement: f64,
    /// Agreement weighted by the mean OCR confidence of the supporting frames.
    pub stabilization_confidence: f64,
    pub frames_voted: usize,
    pub supporting_frames: Vec<usize>,
}

/// Lowercase, strip punctuation, collapse whitespace.
pub fn normalize_text(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalized edit similarity in `[0, 1]`.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&normalize_text(a), &normalize_text(b))
}

/// Pick the text with the highest cross-frame agreement.
///
/// Frames that read no text still count as voters. Returns `None` when no
/// frame produced any text.
pub fn vote(readings: &[FrameReading], similarity_threshold: f64) -> Option<VoteOutcome> {
    let total = readings.len();
    let candidates: Vec<&FrameReading> = readings
        .iter()
        .filter(|r| !normalize_text(&r.text).is_empty())
        .collect();

    let mut best: Option<(VoteOutcome, f64)> = None;

    for candidate in &candidates {
        let supporters: Vec<&FrameReading> = candidates
            .iter()
            .copied()
            .filter(|r| text_similarity(&candidate.text, &r.text) >= similarity_threshold)
            .collect();

        let agreement = supporters.len() as f64 / total as f64;
        let mean_confidence =
            supporters.iter().map(|r| r.confidence).sum::<f64>() / supporters.len() as f64;

        let better = match &best {
            None => true,
            Some((current, current_conf)) => {
                agreement > current.agreement
                    || (agreement == current.agreement && mean_confidence > *current_conf)
                    || (agreement == current.agreement
                        && mean_confidence == *current_conf
                        && candidate.confidence > confidence_of(readings, &current.consensus_text))
            }
        };

        if better {
            best = Some((
                VoteOutcome {
                    consensus_text: candidate.text.trim().to_string(),
                    agreement,
                    stabilization_confidence: (agreement * mean_confidence).clamp(0.0, 1.0),
                    frames_voted: total,
                    supporting_frames: supporters.iter().map(|r| r.frame).collect(),
                },
                mean_confidence,
            ));
        }
    }

    best.map(|(outcome, _)| outcome)
}

fn confidence_of(readings: &[FrameReading], text: &str) -> f64 {
    readings
        .iter()
        .filter(|r| r.text.trim() == text)
        .map(|r| r.confidence)
        .fold(0.0, f64::max)
}

/// Distinct texts in frame order, merging consecutive near-duplicates.
///
/// This recovers a subtitle sequence from frames that each show one line.
pub fn text_sequence(readings: &[FrameReading], similarity_threshold: f64) -> Vec<String> {
    let mut ordered: Vec<&FrameReading> = readings.iter().collect();
    ordered.sort_by_key(|r| r.frame);

    let mut sequence: Vec<String> = Vec::new();
    for reading in ordered {
        let text = reading.text.trim();
        if normalize_text(text).is_empty() {
            continue;
        }
        let repeats_last = sequence
            .last()
            .map(|last| text_similarity(last, text) >= similarity_threshold)
            .unwrap_or(false);
        if !repeats_last {
            sequence.push(text.to_string());
        }
    }
    sequence
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(frame: usize, text: &str, confidence: f64) -> FrameReading {
        FrameReading {
            frame,
            text: text.to_string(),
            confidence,
        }
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Hello,   WORLD! "), "hello world");
        assert_eq!(normalize_text("..."), "");
    }

    #[test]
    fn test_majority_wins_despite_ocr_noise() {
        let readings = vec![
            reading(0, "I can't believe it", 0.8),
            reading(1, "I cant believe it", 0.7),
            reading(2, "l can't beleive it", 0.6),
            reading(3, "Totally different", 0.95),
        ];
        let outcome = vote(&readings, 0.8).unwrap();
        assert!(normalize_text(&outcome.consensus_text).contains("believe"));
        assert_eq!(outcome.agreement, 0.75);
        assert_eq!(outcome.frames_voted, 4);
        assert_eq!(outcome.supporting_frames.len(), 3);
        assert!(outcome.stabilization_confidence > 0.0);
        assert!(outcome.stabilization_confidence <= outcome.agreement);
    }

    #[test]
    fn test_blank_frames_count_as_voters() {
        let readings = vec![reading(0, "EXIT", 0.9), reading(1, "", 0.0), reading(2, "  ", 0.0)];
        let outcome = vote(&readings, 0.8).unwrap();
        assert_eq!(outcome.consensus_text, "EXIT");
        assert!((outcome.agreement - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_text_means_no_consensus() {
        let readings = vec![reading(0, "", 0.0), reading(1, "!!", 0.1)];
        assert!(vote(&readings, 0.8).is_none());
        assert!(vote(&[], 0.8).is_none());
    }

    #[test]
    fn test_text_sequence_merges_repeats() {
        let readings = vec![
            reading(2, "Second line", 0.9),
            reading(0, "First line", 0.9),
            reading(1, "First line.", 0.8),
            reading(3, "", 0.0),
            reading(4, "Second line", 0.9),
        ];
        assert_eq!(text_sequence(&readings, 0.8), vec!["First line", "Second line"]);
    }
}
