//! Input decoding: turns an image file into a frame sequence.
//!
//! Animated GIF and WebP files yield every frame with its display delay;
//! all other formats decode to a single frame.

pub mod pixels;

use crate::error::PipelineError;
use image::codecs::gif::GifDecoder;
use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, ImageFormat, RgbaImage};
use sha2::{Digest, Sha256};
use std::borrow::Borrow;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// One decoded frame.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbaImage,
    /// Display time of this frame. Zero for still images.
    pub delay_ms: u32,
}

impl Frame {
    pub fn still(image: RgbaImage) -> Self {
        Self { image, delay_ms: 0 }
    }
}

impl Borrow<RgbaImage> for Frame {
    fn borrow(&self) -> &RgbaImage {
        &self.image
    }
}

/// A decoded input ready for analysis.
#[derive(Debug, Clone)]
pub struct AnalysisInput {
    /// Short content hash used as the run's input identifier.
    pub id: String,
    /// Full SHA-256 of the source bytes (empty for synthetic inputs).
    pub sha256: String,
    pub path: Option<PathBuf>,
    /// Lowercase container format (`png`, `gif`, ...).
    pub format: Option<String>,
    pub byte_len: u64,
    /// Shared so pixel work can move to blocking threads without copying.
    pub frames: Arc<[Frame]>,
}

impl AnalysisInput {
    /// Build an input from already-decoded frames.
    pub fn from_frames(id: impl Into<String>, frames: Vec<Frame>) -> Self {
        Self {
            id: id.into(),
            sha256: String::new(),
            path: None,
            format: None,
            byte_len: 0,
            frames: frames.into(),
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn is_animated(&self) -> bool {
        self.frames.len() > 1
    }

    /// The first frame. Inputs always have at least one.
    pub fn first_frame(&self) -> &RgbaImage {
        &self.frames[0].image
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.first_frame().dimensions()
    }

    /// Total animation length in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.frames.iter().map(|f| f.delay_ms as u64).sum()
    }
}

/// Read and decode an image file.
pub fn load(path: &Path) -> Result<AnalysisInput, PipelineError> {
    let bytes = std::fs::read(path).map_err(|e| PipelineError::InvalidInput {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    decode(&bytes, path)
}

/// Decode in-memory image bytes. `path` is only used for identification.
pub fn decode(bytes: &[u8], path: &Path) -> Result<AnalysisInput, PipelineError> {
    let invalid = |reason: String| PipelineError::InvalidInput {
        path: path.to_path_buf(),
        reason,
    };

    let format = image::guess_format(bytes).map_err(|e| invalid(e.to_string()))?;
    debug!("Detected {:?} for {}", format, path.display());

    let frames = match format {
        ImageFormat::Gif => {
            let decoder = GifDecoder::new(Cursor::new(bytes)).map_err(|e| invalid(e.to_string()))?;
            collect_animation(decoder.into_frames()).map_err(invalid)?
        }
        ImageFormat::WebP => {
            let decoder = WebPDecoder::new(Cursor::new(bytes)).map_err(|e| invalid(e.to_string()))?;
            if decoder.has_animation() {
                collect_animation(decoder.into_frames()).map_err(invalid)?
            } else {
                decode_still(bytes, format).map_err(invalid)?
            }
        }
        _ => decode_still(bytes, format).map_err(invalid)?,
    };

    if frames.is_empty() {
        return Err(PipelineError::EmptyInput {
            path: path.to_path_buf(),
        });
    }

    let sha256 = hex_digest(bytes);
    info!(
        "Decoded {} ({} frame(s), {} bytes)",
        path.display(),
        frames.len(),
        bytes.len()
    );

    Ok(AnalysisInput {
        id: sha256[..16].to_string(),
        sha256,
        path: Some(path.to_path_buf()),
        format: Some(format!("{:?}", format).to_lowercase()),
        byte_len: bytes.len() as u64,
        frames: frames.into(),
    })
}

fn decode_still(bytes: &[u8], format: ImageFormat) -> Result<Vec<Frame>, String> {
    let image = image::load_from_memory_with_format(bytes, format).map_err(|e| e.to_string())?;
    Ok(vec![Frame::still(image.to_rgba8())])
}

fn collect_animation(frames: image::Frames<'_>) -> Result<Vec<Frame>, String> {
    let decoded = frames.collect_frames().map_err(|e| e.to_string())?;
    Ok(decoded
        .into_iter()
        .map(|frame| {
            let (numer, denom) = frame.delay().numer_denom_ms();
            let delay_ms = if denom == 0 { 0 } else { numer / denom };
            Frame {
                image: frame.into_buffer(),
                delay_ms,
            }
        })
        .collect())
}

fn hex_digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
