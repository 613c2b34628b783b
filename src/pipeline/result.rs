//! The outcome of one coordinator run.

use super::escalation::EscalationDecision;
use crate::signal::{Signal, SignalFilter, SignalLedger, SignalValue};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Diagnostic attached to a run. None of these abort the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunNote {
    /// Required keys were absent when the wave's turn came.
    DependencyUnmet { wave: String, missing: Vec<String> },
    /// The manifest has no registered implementation.
    NoAnalyzer { wave: String },
    /// The analyzer returned an error; it contributed no signals.
    Failed { wave: String, message: String },
    /// An expensive wave that escalation declined to run.
    Declined { wave: String, reason: String },
    /// Not run, or interrupted, because the run was cancelled or timed out.
    Cancelled { wave: String },
    /// A second signal for the same (source, key) pair was dropped.
    DuplicateSignal { wave: String, key: String },
}

impl RunNote {
    pub fn wave(&self) -> &str {
        match self {
            RunNote::DependencyUnmet { wave, .. }
            | RunNote::NoAnalyzer { wave }
            | RunNote::Failed { wave, .. }
            | RunNote::Declined { wave, .. }
            | RunNote::Cancelled { wave }
            | RunNote::DuplicateSignal { wave, .. } => wave,
        }
    }
}

impl fmt::Display for RunNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunNote::DependencyUnmet { wave, missing } => {
                write!(f, "{}: skipped, missing {}", wave, missing.join(", "))
            }
            RunNote::NoAnalyzer { wave } => write!(f, "{}: no analyzer registered", wave),
            RunNote::Failed { wave, message } => write!(f, "{}: failed: {}", wave, message),
            RunNote::Declined { wave, reason } => write!(f, "{}: not escalated ({})", wave, reason),
            RunNote::Cancelled { wave } => write!(f, "{}: cancelled", wave),
            RunNote::DuplicateSignal { wave, key } => {
                write!(f, "{}: duplicate signal '{}' dropped", wave, key)
            }
        }
    }
}

/// Fused signals for one input plus provenance of how they were produced.
#[derive(Debug, Clone, Serialize)]
pub struct ImageProfile {
    pub input_id: String,
    pub pipeline: String,
    pub analyzed_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    /// Waves that ran to completion, in execution order.
    pub executed_waves: Vec<String>,
    pub notes: Vec<RunNote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation: Option<EscalationDecision>,
    /// Set when the run was cancelled or timed out before finishing.
    pub partial: bool,
    pub signals: SignalLedger,
}

impl ImageProfile {
    /// Effective value of `key` (highest confidence, latest on ties).
    pub fn get_effective_value(&self, key: &str) -> Option<&SignalValue> {
        self.signals.get(key)
    }

    pub fn get_best_signal(&self, key: &str) -> Option<&Signal> {
        self.signals.get_best(key)
    }

    pub fn has_signal(&self, key: &str) -> bool {
        self.signals.has(key)
    }

    pub fn all_signals(&self) -> &[Signal] {
        self.signals.all()
    }

    pub fn filtered(&self, filter: &SignalFilter) -> Vec<&Signal> {
        filter.apply(self.signals.all())
    }

    pub fn executed(&self, wave: &str) -> bool {
        self.executed_waves.iter().any(|w| w == wave)
    }

    pub fn escalated(&self) -> bool {
        self.escalation.as_ref().map(|d| d.escalate).unwrap_or(false)
    }
}
