//! Signals: atomic, confidence-scored facts emitted by waves.
//!
//! A [`Signal`] is immutable once built. Waves return them in batches and the
//! coordinator appends each batch to the run's [`SignalLedger`].

pub mod filter;
pub mod ledger;

pub use filter::SignalFilter;
pub use ledger::{LedgerError, SignalLedger};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Typed payload carried by a signal.
///
/// Serialized untagged so JSON output reads naturally (`"ocr.text": "hi"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<SignalValue>),
    Map(BTreeMap<String, SignalValue>),
}

impl SignalValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SignalValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SignalValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SignalValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[SignalValue]> {
        match self {
            SignalValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Interpret a list of numbers as frame indices.
    pub fn as_indices(&self) -> Option<Vec<usize>> {
        self.as_list()?
            .iter()
            .map(|v| v.as_f64().filter(|n| *n >= 0.0).map(|n| n as usize))
            .collect()
    }
}

impl fmt::Display for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalValue::Bool(b) => write!(f, "{}", b),
            SignalValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{:.3}", n)
                }
            }
            SignalValue::Text(s) => write!(f, "{}", s),
            SignalValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            SignalValue::Map(map) => {
                let parts: Vec<String> = map.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

impl From<bool> for SignalValue {
    fn from(value: bool) -> Self {
        SignalValue::Bool(value)
    }
}

impl From<f64> for SignalValue {
    fn from(value: f64) -> Self {
        SignalValue::Number(value)
    }
}

impl From<f32> for SignalValue {
    fn from(value: f32) -> Self {
        SignalValue::Number(value as f64)
    }
}

impl From<u32> for SignalValue {
    fn from(value: u32) -> Self {
        SignalValue::Number(value as f64)
    }
}

impl From<usize> for SignalValue {
    fn from(value: usize) -> Self {
        SignalValue::Number(value as f64)
    }
}

impl From<&str> for SignalValue {
    fn from(value: &str) -> Self {
        SignalValue::Text(value.to_string())
    }
}

impl From<String> for SignalValue {
    fn from(value: String) -> Self {
        SignalValue::Text(value)
    }
}

impl<T: Into<SignalValue>> From<Vec<T>> for SignalValue {
    fn from(values: Vec<T>) -> Self {
        SignalValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// A single (source, key, value, confidence) fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Name of the wave that produced this signal.
    pub source: String,
    /// Dotted hierarchical key, e.g. `ocr.voting.consensus_text`.
    pub key: String,
    pub value: SignalValue,
    /// Producer certainty in `[0, 1]`.
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Signal {
    /// Build a signal. Confidence is clamped into `[0, 1]`; NaN becomes 0.
    pub fn new(
        source: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<SignalValue>,
        confidence: f64,
    ) -> Self {
        Self {
            source: source.into(),
            key: key.into(),
            value: value.into(),
            confidence: clamp_confidence(confidence),
            metadata: BTreeMap::new(),
        }
    }

    /// Attach an auxiliary metadata entry (reason codes and the like).
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}
