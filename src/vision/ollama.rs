//! Ollama chat client for vision models.
//!
//! Images are PNG-encoded, base64'd and attached to a single user message on
//! `/api/chat` with streaming disabled.

use super::VisionClient;
use crate::input::pixels::downscale;
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::time::Duration;
use tracing::{debug, info};

/// Longest image side sent to the model.
const MAX_UPLOAD_SIDE: u32 = 1024;

/// Connection settings for the Ollama backend.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub ollama_url: String,
    pub model_name: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            model_name: "llava:latest".to_string(),
            temperature: 0.1,
            timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

pub struct OllamaVisionClient {
    config: OllamaConfig,
    http_client: reqwest::Client,
}

impl OllamaVisionClient {
    pub fn new(config: OllamaConfig) -> Result<Self> {
        info!(
            "Initializing vision client with model {} at {}",
            config.model_name, config.ollama_url
        );

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Send one prompt with one image and return the model's reply.
    async fn send_image_prompt(&self, image: &RgbaImage, prompt: &str) -> Result<String> {
        let url = format!("{}/api/chat", self.config.ollama_url.trim_end_matches('/'));

        let request = OllamaChatRequest {
            model: self.config.model_name.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
                images: Some(vec![encode_png_base64(image)?]),
            }],
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
            },
        };

        debug!("Sending vision request to {}", url);

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    anyhow::anyhow!("Request timed out after {}s", self.config.timeout_seconds)
                } else if e.is_connect() {
                    anyhow::anyhow!(
                        "Cannot connect to Ollama at {}. Is Ollama running?",
                        self.config.ollama_url
                    )
                } else {
                    anyhow::anyhow!("Failed to send request: {}", e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Ollama API error {}: {}", status, body));
        }

        let chat_response: OllamaChatResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        Ok(chat_response.message.content.trim().to_string())
    }
}

#[async_trait]
impl VisionClient for OllamaVisionClient {
    fn model(&self) -> &str {
        &self.config.model_name
    }

    async fn caption(&self, image: &RgbaImage, prompt: &str) -> Result<String> {
        self.send_image_prompt(image, prompt).await
    }
}

/// PNG-encode an image (downscaled if large) and base64 it.
pub fn encode_png_base64(image: &RgbaImage) -> Result<String> {
    let upload = downscale(image, MAX_UPLOAD_SIDE);

    let mut bytes = Vec::new();
    upload
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .context("Failed to encode image as PNG")?;

    Ok(STANDARD.encode(bytes))
}
