//! Built-in wave implementations.
//!
//! Local waves (identity, color, quality, content, motion, dedup, route)
//! work on decoded pixels only. The OCR and caption waves call out through
//! the [`OcrEngine`] and [`VisionClient`] traits and are only registered
//! when a backend is configured; without one they show up as
//! "no analyzer" notes on the run.

pub mod caption;
pub mod color;
pub mod content;
pub mod dedup;
pub mod identity;
pub mod motion;
pub mod ocr;
pub mod quality;
pub mod route;
pub mod voting;

pub use caption::{CaptionWave, DEFAULT_CAPTION_PROMPT};
pub use color::ColorWave;
pub use content::ContentWave;
pub use dedup::DedupWave;
pub use identity::IdentityWave;
pub use motion::MotionWave;
pub use ocr::OcrWave;
pub use quality::QualityWave;
pub use route::RouteWave;
pub use voting::OcrVotingWave;

use crate::error::PipelineError;
use crate::input::pixels::downscale;
use crate::input::Frame;
use crate::pipeline::{EscalationHeuristic, TextAndDetailHeuristic};
use crate::temporal::TemporalConfig;
use crate::vision::{OcrEngine, VisionClient};
use crate::wave::{WaveContext, WaveRegistry};
use anyhow::{bail, Context, Result};
use image::RgbaImage;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Longest side local pixel analyzers work at.
pub(crate) const ANALYSIS_MAX_SIDE: u32 = 512;

/// Run CPU-bound pixel work on the blocking pool.
///
/// The async side only awaits the join handle, so the coordinator can
/// abandon the wave at its deadline. The job gets the run's cancellation
/// token and should check it between frames.
pub(crate) async fn run_blocking<T, F>(ctx: &WaveContext, job: F) -> Result<T>
where
    F: FnOnce(&CancellationToken) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let cancel = ctx.cancel.clone();
    tokio::task::spawn_blocking(move || job(&cancel))
        .await
        .context("Pixel analysis task panicked")?
}

/// Downscaled copies of `frames`, stopping early once `cancel` fires.
pub(crate) fn analysis_frames(
    frames: &[Frame],
    cancel: &CancellationToken,
) -> Result<Vec<RgbaImage>> {
    let mut copies = Vec::with_capacity(frames.len());
    for frame in frames {
        if cancel.is_cancelled() {
            bail!("cancelled after {} of {} frame(s)", copies.len(), frames.len());
        }
        copies.push(downscale(&frame.image, ANALYSIS_MAX_SIDE).into_owned());
    }
    Ok(copies)
}

/// Backends and settings the built-in waves are constructed from.
#[derive(Clone)]
pub struct AnalyzerServices {
    pub temporal: TemporalConfig,
    pub ocr: Option<Arc<dyn OcrEngine>>,
    pub vision: Option<Arc<dyn VisionClient>>,
    pub caption_prompt: String,
    pub heuristic: Arc<dyn EscalationHeuristic>,
}

impl Default for AnalyzerServices {
    fn default() -> Self {
        Self {
            temporal: TemporalConfig::default(),
            ocr: None,
            vision: None,
            caption_prompt: DEFAULT_CAPTION_PROMPT.to_string(),
            heuristic: Arc::new(TextAndDetailHeuristic::default()),
        }
    }
}

/// The built-in manifest catalogue with every available analyzer attached.
pub fn builtin_registry(services: AnalyzerServices) -> Result<WaveRegistry, PipelineError> {
    let mut registry = WaveRegistry::builtin_catalog()?;
    register_builtin(&mut registry, services);
    Ok(registry)
}

/// Attach the built-in analyzers to an existing registry.
pub fn register_builtin(registry: &mut WaveRegistry, services: AnalyzerServices) {
    registry.register(Arc::new(IdentityWave));
    registry.register(Arc::new(ColorWave::default()));
    registry.register(Arc::new(QualityWave::default()));
    registry.register(Arc::new(ContentWave::default()));
    registry.register(Arc::new(MotionWave::new(services.temporal.clone())));
    registry.register(Arc::new(DedupWave::new(services.temporal.clone())));
    registry.register(Arc::new(RouteWave::new(services.heuristic.clone())));

    match services.ocr {
        Some(engine) => {
            info!("OCR backend: {}", engine.name());
            registry.register(Arc::new(OcrWave::new(engine.clone())));
            registry.register(Arc::new(OcrVotingWave::new(engine, services.temporal)));
        }
        None => info!("No OCR backend configured; OCR waves disabled"),
    }

    match services.vision {
        Some(client) => {
            info!("Vision backend: {}", client.model());
            registry.register(Arc::new(CaptionWave::new(client, services.caption_prompt)));
        }
        None => info!("No vision backend configured; caption wave disabled"),
    }
}
