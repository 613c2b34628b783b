//! ImageSift - wave-scheduled signal extraction for images.
//!
//! An input image (still or animated) is decoded into frames and passed
//! through a sequence of prioritized analyzers called waves. Each wave reads
//! the signals emitted by earlier waves from a shared append-only
//! [`SignalLedger`](signal::SignalLedger) and contributes its own. Cheap
//! local waves run first; a routing step then decides whether an expensive
//! vision-language model is worth invoking.
//!
//! ```rust,ignore
//! use imagesift::analyzers::{builtin_registry, AnalyzerServices};
//! use imagesift::pipeline::{Coordinator, CoordinatorOptions, PipelineCatalog};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! let registry = builtin_registry(AnalyzerServices::default())?;
//! let catalog = PipelineCatalog::builtin()?;
//! let coordinator = Coordinator::new(Arc::new(registry), Arc::new(catalog), CoordinatorOptions::default());
//!
//! let input = imagesift::input::load("banner.gif".as_ref())?;
//! let profile = coordinator.run_pipeline(&input, "advancedocr", CancellationToken::new()).await?;
//! println!("{:?}", profile.get_effective_value("ocr.voting.consensus_text"));
//! ```

pub mod analyzers;
pub mod cli;
pub mod config;
pub mod error;
pub mod input;
pub mod pipeline;
pub mod report;
pub mod signal;
pub mod temporal;
pub mod vision;
pub mod wave;

pub use error::PipelineError;
