//! Remote caption and alt text.
//!
//! Text already read locally is passed to the model as context so the
//! caption can quote it instead of re-reading it.

use crate::input::AnalysisInput;
use crate::signal::{Signal, SignalLedger};
use crate::vision::VisionClient;
use crate::wave::{Wave, WaveContext};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

const NAME: &str = "caption";

pub const DEFAULT_CAPTION_PROMPT: &str = "Describe this image in one or two sentences for \
someone who cannot see it. Mention any visible text verbatim.";

/// Screen readers truncate or chunk longer alt text.
const MAX_ALT_TEXT_CHARS: usize = 125;

pub struct CaptionWave {
    client: Arc<dyn VisionClient>,
    prompt: String,
}

impl CaptionWave {
    pub fn new(client: Arc<dyn VisionClient>, prompt: impl Into<String>) -> Self {
        Self {
            client,
            prompt: prompt.into(),
        }
    }

    fn build_prompt(&self, input: &AnalysisInput, ledger: &SignalLedger) -> String {
        let mut prompt = self.prompt.clone();
        if input.is_animated() {
            prompt.push_str(" The image is one frame of an animation.");
        }

        let known_text = ledger
            .get_str("ocr.voting.consensus_text")
            .or_else(|| ledger.get_str("ocr.text"))
            .map(str::trim)
            .filter(|t| !t.is_empty());
        if let Some(text) = known_text {
            prompt.push_str(&format!("\nText detected in the image: \"{}\"", text));
        }
        prompt
    }
}

/// First sentence of a caption, cut at a word boundary to fit alt text.
pub fn alt_text(caption: &str) -> String {
    let caption = caption.trim();
    let first = caption
        .char_indices()
        .find(|&(i, c)| {
            matches!(c, '.' | '!' | '?')
                && caption[i + c.len_utf8()..]
                    .chars()
                    .next()
                    .map_or(true, char::is_whitespace)
        })
        .map(|(i, c)| &caption[..i + c.len_utf8()])
        .unwrap_or(caption);

    if first.chars().count() <= MAX_ALT_TEXT_CHARS {
        return first.to_string();
    }

    let cut: String = first.chars().take(MAX_ALT_TEXT_CHARS - 1).collect();
    let trimmed = match cut.rfind(char::is_whitespace) {
        Some(space) if space > 0 => &cut[..space],
        _ => cut.as_str(),
    };
    format!("{}…", trimmed.trim_end_matches([',', ';', ':']))
}

#[async_trait]
impl Wave for CaptionWave {
    fn name(&self) -> &str {
        NAME
    }

    async fn execute(
        &self,
        input: &AnalysisInput,
        ledger: &SignalLedger,
        _ctx: &WaveContext,
    ) -> Result<Vec<Signal>> {
        let frame = ledger
            .get("motion.keyframes")
            .and_then(|v| v.as_indices())
            .and_then(|keys| keys.get(keys.len() / 2).copied())
            .filter(|&index| index < input.frame_count())
            .unwrap_or(0);

        let prompt = self.build_prompt(input, ledger);
        debug!("Captioning frame {} with {}", frame, self.client.model());
        let caption = self
            .client
            .caption(&input.frames[frame].image, &prompt)
            .await?;

        if caption.trim().is_empty() {
            anyhow::bail!("{} returned an empty caption", self.client.model());
        }

        Ok(vec![
            Signal::new(NAME, "vision.caption", caption.trim(), 0.85)
                .with_meta("frame", frame.to_string()),
            Signal::new(NAME, "vision.alt_text", alt_text(&caption), 0.8),
            Signal::new(NAME, "vision.model", self.client.model(), 1.0),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::testing::{ledger_with, solid, still, value, CannedVision};
    use crate::signal::SignalValue;

    #[test]
    fn test_alt_text_first_sentence() {
        assert_eq!(
            alt_text("A storefront with a red awning. People walk past."),
            "A storefront with a red awning."
        );
        assert_eq!(alt_text("Version 2.5 release banner"), "Version 2.5 release banner");
    }

    #[test]
    fn test_alt_text_truncates_on_word_boundary() {
        let long = "word ".repeat(60);
        let alt = alt_text(&long);
        assert!(alt.chars().count() <= MAX_ALT_TEXT_CHARS);
        assert!(alt.ends_with("word…"));
    }

    #[tokio::test]
    async fn test_caption_includes_ocr_context() {
        let client = Arc::new(CannedVision::new("A sign reading OPEN. It is neon."));
        let ledger = ledger_with(&[("ocr.text", SignalValue::from("OPEN"))]);

        let signals = CaptionWave::new(client.clone(), DEFAULT_CAPTION_PROMPT)
            .execute(&still(solid(4, 4, [0, 0, 0])), &ledger, &WaveContext::default())
            .await
            .unwrap();

        assert_eq!(value(&signals, "vision.alt_text"), Some(&SignalValue::from("A sign reading OPEN.")));
        assert_eq!(value(&signals, "vision.model"), Some(&SignalValue::from("canned-vision")));
        let prompts = client.prompts.lock().unwrap();
        assert!(prompts[0].contains("\"OPEN\""));
    }

    #[tokio::test]
    async fn test_empty_caption_is_failure() {
        let client = Arc::new(CannedVision::new("   "));
        let result = CaptionWave::new(client, "Describe")
            .execute(&still(solid(4, 4, [0, 0, 0])), &SignalLedger::new(), &WaveContext::default())
            .await;
        assert!(result.is_err());
    }
}
