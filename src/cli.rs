//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// ImageSift - wave-scheduled signal extraction for images
///
/// Runs cheap local analyzers over a still or animated image, then decides
/// whether a local vision model is worth asking for a caption.
///
/// Examples:
///   imagesift photo.jpg
///   imagesift banner.gif --pipeline advancedocr --signals @ocr
///   imagesift meme.png --pipeline alttext --format text
///   imagesift clip.gif --pipeline stats --no-vision --format json
///   imagesift --list-pipelines
///   imagesift --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Image file to analyze (PNG, JPEG, GIF, WebP, ...)
    #[arg(
        value_name = "INPUT",
        required_unless_present_any = ["init_config", "list_waves", "list_collections", "list_pipelines"]
    )]
    pub input: Option<PathBuf>,

    /// Pipeline profile to run
    ///
    /// Built-ins: stats, motion, simpleocr, advancedocr, auto, quality,
    /// caption, alttext. Defaults to the config's default_pipeline.
    #[arg(short, long, value_name = "NAME", env = "IMAGESIFT_PIPELINE")]
    pub pipeline: Option<String>,

    /// Signals to include in the output
    ///
    /// Comma-separated keys, `prefix*` globs, or `@collection` names.
    /// Example: --signals "@ocr,color.dominant"
    #[arg(short, long, value_name = "FILTER")]
    pub signals: Option<String>,

    /// Output format (json, text)
    #[arg(long, default_value = "json", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// List registered waves and exit
    #[arg(long)]
    pub list_waves: bool,

    /// List signal collections and exit
    #[arg(long)]
    pub list_collections: bool,

    /// List pipeline profiles and exit
    #[arg(long)]
    pub list_pipelines: bool,

    /// Path to configuration file
    ///
    /// If not specified, looks for .imagesift.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Ollama vision model
    ///
    /// Recommended models: llava:latest, llama3.2-vision, minicpm-v.
    #[arg(short, long, env = "IMAGESIFT_MODEL")]
    pub model: Option<String>,

    /// Ollama API endpoint URL
    #[arg(long, env = "OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// Frame budget for keyframes and per-frame OCR
    #[arg(long, value_name = "COUNT")]
    pub max_frames: Option<usize>,

    /// Similarity at or above which consecutive frames are merged (0-1]
    #[arg(long, value_name = "RATIO")]
    pub dedup_threshold: Option<f64>,

    /// Cancel the run after this many seconds and report what finished
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Never call the vision model (local analysis only)
    #[arg(long)]
    pub no_vision: bool,

    /// Exit with code 2 if the run was cancelled or timed out
    #[arg(long)]
    pub fail_on_partial: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .imagesift.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON (default)
    #[default]
    Json,
    /// Plain text table
    Text,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Whether this invocation only lists catalogue contents.
    pub fn is_listing(&self) -> bool {
        self.list_waves || self.list_collections || self.list_pipelines
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref url) = self.ollama_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Ollama URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(max_frames) = self.max_frames {
            if max_frames < 2 {
                return Err("Max frames must be at least 2".to_string());
            }
        }

        if let Some(threshold) = self.dedup_threshold {
            if !(threshold > 0.0 && threshold <= 1.0) {
                return Err("Dedup threshold must be in (0, 1]".to_string());
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(ref input) = self.input {
            if !self.is_listing() && !input.is_file() {
                return Err(format!("Input file does not exist: {}", input.display()));
            }
        }

        Ok(())
    }
}
