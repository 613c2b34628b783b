//! OCR through a vision-language model.

use super::{OcrEngine, OcrReading, VisionClient};
use anyhow::Result;
use async_trait::async_trait;
use image::RgbaImage;
use std::sync::Arc;

const OCR_PROMPT: &str = "Transcribe every piece of legible text in this image exactly as written, \
one line per text block. Output only the text. If there is no legible text, output NO_TEXT.";

const NO_TEXT_MARKER: &str = "NO_TEXT";

/// Reads text by prompting a vision model.
///
/// Language models give no per-character confidence, so every non-empty
/// reading carries a fixed configured confidence.
pub struct VisionOcr {
    client: Arc<dyn VisionClient>,
    assumed_confidence: f64,
}

impl VisionOcr {
    pub fn new(client: Arc<dyn VisionClient>, assumed_confidence: f64) -> Self {
        Self {
            client,
            assumed_confidence: assumed_confidence.clamp(0.0, 1.0),
        }
    }
}

#[async_trait]
impl OcrEngine for VisionOcr {
    fn name(&self) -> &str {
        self.client.model()
    }

    async fn recognize(&self, image: &RgbaImage) -> Result<OcrReading> {
        let reply = self.client.caption(image, OCR_PROMPT).await?;
        let text = clean_transcription(&reply);

        Ok(OcrReading {
            confidence: if text.is_empty() { 0.0 } else { self.assumed_confidence },
            text,
        })
    }
}

/// Strip code fences, quotes and the no-text marker from a model reply.
fn clean_transcription(reply: &str) -> String {
    let lines: Vec<&str> = reply
        .lines()
        .map(str::trim)
        .filter(|l| !l.starts_with("```"))
        .filter(|l| !l.is_empty())
        .collect();
    let joined = lines.join("\n");
    let trimmed = joined.trim_matches(|c| c == '"' || c == '\'').trim();

    if trimmed.eq_ignore_ascii_case(NO_TEXT_MARKER) {
        String::new()
    } else {
        trimmed.to_string()
    }
}
