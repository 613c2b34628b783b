//! Remote model backends.
//!
//! Waves depend on the [`VisionClient`] and [`OcrEngine`] traits only; the
//! Ollama implementations live in [`ollama`] and [`ocr`].

pub mod ocr;
pub mod ollama;

pub use ocr::VisionOcr;
pub use ollama::{OllamaConfig, OllamaVisionClient};

use anyhow::Result;
use async_trait::async_trait;
use image::RgbaImage;

/// A vision-language model that can describe an image.
#[async_trait]
pub trait VisionClient: Send + Sync {
    /// Model identifier reported in signals.
    fn model(&self) -> &str;

    async fn caption(&self, image: &RgbaImage, prompt: &str) -> Result<String>;
}

/// Text read from one image.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrReading {
    pub text: String,
    pub confidence: f64,
}

/// Anything that can read text from an image.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;

    async fn recognize(&self, image: &RgbaImage) -> Result<OcrReading>;
}
