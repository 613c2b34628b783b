//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.imagesift.toml` files.

use crate::analyzers::{AnalyzerServices, DEFAULT_CAPTION_PROMPT};
use crate::pipeline::{CoordinatorOptions, PipelineCatalog, PipelineProfile};
use crate::temporal::{DedupConfig, TemporalConfig};
use crate::vision::{OllamaConfig, OllamaVisionClient, VisionOcr};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Default config file name, looked up in the current directory.
pub const CONFIG_FILE: &str = ".imagesift.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    /// Remote vision model settings.
    #[serde(default)]
    pub vision: VisionConfig,

    #[serde(default)]
    pub ocr: OcrConfig,

    /// Frame deduplication, keyframe and voting settings.
    #[serde(default)]
    pub temporal: TemporalSettings,

    /// User-defined pipeline profiles. A profile named like a built-in
    /// replaces it.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pipelines: Vec<PipelineProfile>,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Maximum concurrent backend calls per wave.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Run waves of equal priority concurrently.
    #[serde(default = "default_true")]
    pub parallel_tiers: bool,

    /// Pipeline used when none is given on the command line.
    #[serde(default = "default_pipeline")]
    pub default_pipeline: String,

    /// Cancel a run after this many seconds, keeping completed waves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_timeout_seconds: Option<u64>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            concurrency: default_concurrency(),
            parallel_tiers: true,
            default_pipeline: default_pipeline(),
            run_timeout_seconds: None,
        }
    }
}

fn default_concurrency() -> usize {
    4
}

fn default_true() -> bool {
    true
}

fn default_pipeline() -> String {
    "auto".to_string()
}

/// Vision-language model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    /// Disable to keep every run local.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Ollama API URL.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_caption_prompt")]
    pub caption_prompt: String,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ollama_url: default_ollama_url(),
            model: default_model(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout(),
            caption_prompt: default_caption_prompt(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llava:latest".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_timeout() -> u64 {
    120
}

fn default_caption_prompt() -> String {
    DEFAULT_CAPTION_PROMPT.to_string()
}

/// Where OCR readings come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrBackend {
    /// Transcription prompts through the vision model.
    #[default]
    Vision,
    /// OCR waves disabled.
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default)]
    pub backend: OcrBackend,

    /// Model used for OCR, if different from the caption model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Confidence assigned to non-empty model transcriptions.
    #[serde(default = "default_assumed_confidence")]
    pub assumed_confidence: f64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            backend: OcrBackend::Vision,
            model: None,
            assumed_confidence: default_assumed_confidence(),
        }
    }
}

fn default_assumed_confidence() -> f64 {
    0.7
}

/// Temporal analysis settings as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalSettings {
    /// Frames at least this similar to the last kept frame are dropped.
    #[serde(default = "default_dedup_threshold")]
    pub dedup_threshold: f64,

    /// Frame budget for keyframes and per-frame OCR.
    #[serde(default = "default_max_frames")]
    pub max_frames: usize,

    /// Height of the caption band, from the bottom of the frame.
    #[serde(default = "default_text_region_fraction")]
    pub text_region_fraction: f64,

    #[serde(default = "default_bright_luma_threshold")]
    pub bright_luma_threshold: u8,

    /// Pixel stride used when comparing frames.
    #[serde(default = "default_sample_step")]
    pub sample_step: u32,

    /// Minimum text similarity for two OCR readings to agree.
    #[serde(default = "default_vote_similarity")]
    pub vote_similarity: f64,
}

impl Default for TemporalSettings {
    fn default() -> Self {
        Self {
            dedup_threshold: default_dedup_threshold(),
            max_frames: default_max_frames(),
            text_region_fraction: default_text_region_fraction(),
            bright_luma_threshold: default_bright_luma_threshold(),
            sample_step: default_sample_step(),
            vote_similarity: default_vote_similarity(),
        }
    }
}

fn default_dedup_threshold() -> f64 {
    0.85
}

fn default_max_frames() -> usize {
    10
}

fn default_text_region_fraction() -> f64 {
    1.0 / 3.0
}

fn default_bright_luma_threshold() -> u8 {
    200
}

fn default_sample_step() -> u32 {
    4
}

fn default_vote_similarity() -> f64 {
    0.8
}

impl From<&TemporalSettings> for TemporalConfig {
    fn from(settings: &TemporalSettings) -> Self {
        Self {
            dedup: DedupConfig {
                threshold: settings.dedup_threshold,
                text_region_fraction: settings.text_region_fraction,
                bright_luma_threshold: settings.bright_luma_threshold,
                sample_step: settings.sample_step,
            },
            max_frames: settings.max_frames,
            vote_similarity: settings.vote_similarity,
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// Options only override the config when given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref model) = args.model {
            self.vision.model = model.clone();
        }
        if let Some(ref url) = args.ollama_url {
            self.vision.ollama_url = url.clone();
        }
        if let Some(ref pipeline) = args.pipeline {
            self.general.default_pipeline = pipeline.clone();
        }
        if let Some(max_frames) = args.max_frames {
            self.temporal.max_frames = max_frames;
        }
        if let Some(threshold) = args.dedup_threshold {
            self.temporal.dedup_threshold = threshold;
        }
        if let Some(timeout) = args.timeout {
            self.general.run_timeout_seconds = Some(timeout);
        }

        // Flags always override
        if args.no_vision {
            self.vision.enabled = false;
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Log level for the session. `quiet` wins over `general.verbose`,
    /// which `--verbose` has already been merged into.
    pub fn log_level(&self, quiet: bool) -> tracing::Level {
        if quiet {
            tracing::Level::ERROR
        } else if self.general.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Check value ranges. Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        let unit = |name: &str, value: f64| {
            if value > 0.0 && value <= 1.0 {
                Ok(())
            } else {
                Err(format!("{} must be in (0, 1], got {}", name, value))
            }
        };
        unit("temporal.dedup_threshold", self.temporal.dedup_threshold)?;
        unit("temporal.text_region_fraction", self.temporal.text_region_fraction)?;
        unit("temporal.vote_similarity", self.temporal.vote_similarity)?;
        unit("ocr.assumed_confidence", self.ocr.assumed_confidence)?;

        if self.temporal.max_frames < 2 {
            return Err("temporal.max_frames must be at least 2".to_string());
        }
        if self.temporal.sample_step == 0 {
            return Err("temporal.sample_step must be at least 1".to_string());
        }
        if self.general.concurrency == 0 {
            return Err("general.concurrency must be at least 1".to_string());
        }
        if self.general.run_timeout_seconds == Some(0) {
            return Err("general.run_timeout_seconds must be at least 1".to_string());
        }
        if !self.vision.ollama_url.starts_with("http://")
            && !self.vision.ollama_url.starts_with("https://")
        {
            return Err("vision.ollama_url must start with 'http://' or 'https://'".to_string());
        }
        if !(0.0..=1.0).contains(&self.vision.temperature) {
            return Err("vision.temperature must be between 0.0 and 1.0".to_string());
        }

        Ok(())
    }

    pub fn coordinator_options(&self) -> CoordinatorOptions {
        CoordinatorOptions {
            concurrency: self.general.concurrency,
            parallel_tiers: self.general.parallel_tiers,
            run_timeout: self.general.run_timeout_seconds.map(Duration::from_secs),
        }
    }

    /// Built-in pipelines plus the user's `[[pipelines]]`.
    pub fn pipeline_catalog(&self) -> Result<PipelineCatalog> {
        let mut catalog =
            PipelineCatalog::builtin().context("Built-in pipeline catalogue is invalid")?;
        for profile in &self.pipelines {
            catalog.register(profile.clone());
        }
        Ok(catalog)
    }

    /// Construct the backends the built-in waves need.
    pub fn analyzer_services(&self) -> Result<AnalyzerServices> {
        let mut services = AnalyzerServices {
            temporal: TemporalConfig::from(&self.temporal),
            caption_prompt: self.vision.caption_prompt.clone(),
            ..AnalyzerServices::default()
        };

        if !self.vision.enabled {
            return Ok(services);
        }

        let vision_config = OllamaConfig {
            ollama_url: self.vision.ollama_url.clone(),
            model_name: self.vision.model.clone(),
            temperature: self.vision.temperature,
            timeout_seconds: self.vision.timeout_seconds,
        };
        let vision = Arc::new(OllamaVisionClient::new(vision_config.clone())?);
        services.vision = Some(vision.clone());

        if self.ocr.backend == OcrBackend::Vision {
            let ocr_client = match &self.ocr.model {
                Some(model) if *model != self.vision.model => {
                    Arc::new(OllamaVisionClient::new(OllamaConfig {
                        model_name: model.clone(),
                        temperature: 0.0,
                        ..vision_config
                    })?)
                }
                _ => vision,
            };
            services.ocr = Some(Arc::new(VisionOcr::new(
                ocr_client,
                self.ocr.assumed_confidence,
            )));
        }

        Ok(services)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
