//! Waves: prioritized analyzers with a declared dependency contract.
//!
//! The static side of a wave is its [`WaveManifest`], loaded as data. The
//! executable side is a [`Wave`] implementation registered under the same
//! name in the [`WaveRegistry`].

pub mod manifest;
pub mod registry;

pub use manifest::{WaveManifest, EXPENSIVE_TAG};
pub use registry::{ManifestIssue, WaveRegistry};

use crate::input::AnalysisInput;
use crate::signal::{Signal, SignalLedger};
use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Per-run execution context handed to every wave.
#[derive(Debug, Clone)]
pub struct WaveContext {
    /// Cancelled when the run is cancelled or times out.
    pub cancel: CancellationToken,
    /// Maximum concurrent backend calls a single wave may issue.
    pub concurrency: usize,
}

impl WaveContext {
    pub fn new(cancel: CancellationToken, concurrency: usize) -> Self {
        Self {
            cancel,
            concurrency: concurrency.max(1),
        }
    }
}

impl Default for WaveContext {
    fn default() -> Self {
        Self::new(CancellationToken::new(), 4)
    }
}

/// An analyzer stage.
///
/// `execute` reads the ledger as it stood when the wave's priority tier
/// started and returns every signal it wants recorded. Returned signals are
/// appended together, or not at all if the wave fails or is cancelled.
#[async_trait]
pub trait Wave: Send + Sync {
    /// Must match the manifest name this wave is registered under.
    fn name(&self) -> &str;

    async fn execute(
        &self,
        input: &AnalysisInput,
        ledger: &SignalLedger,
        ctx: &WaveContext,
    ) -> Result<Vec<Signal>>;
}
