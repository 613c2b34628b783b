//! Append-only signal ledger with confidence-based fusion accessors.

use super::{Signal, SignalValue};
use serde::{Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors raised when appending to the ledger.
#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("signal '{key}' from '{wave}' was already recorded in this run")]
    DuplicateSignal { wave: String, key: String },
}

/// All signals emitted during one analysis run.
///
/// Signals are stored in emission order and indexed by key. Nothing is ever
/// removed or mutated; callers only get shared references.
#[derive(Debug, Default, Clone)]
pub struct SignalLedger {
    signals: Vec<Signal>,
    by_key: HashMap<String, Vec<usize>>,
    written: HashSet<(String, String)>,
}

impl SignalLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a signal. A `(source, key)` pair may only be written once.
    pub fn add(&mut self, signal: Signal) -> Result<(), LedgerError> {
        let pair = (signal.source.clone(), signal.key.clone());
        if self.written.contains(&pair) {
            return Err(LedgerError::DuplicateSignal {
                wave: pair.0,
                key: pair.1,
            });
        }

        let index = self.signals.len();
        self.by_key.entry(signal.key.clone()).or_default().push(index);
        self.written.insert(pair);
        self.signals.push(signal);
        Ok(())
    }

    /// The effective value for `key`: the value of its best signal.
    pub fn get(&self, key: &str) -> Option<&SignalValue> {
        self.get_best(key).map(|s| &s.value)
    }

    /// Effective confidence for `key`.
    pub fn confidence(&self, key: &str) -> Option<f64> {
        self.get_best(key).map(|s| s.confidence)
    }

    /// The signal with the highest confidence for `key`.
    ///
    /// Ties go to the most recently emitted signal.
    pub fn get_best(&self, key: &str) -> Option<&Signal> {
        let indices = self.by_key.get(key)?;
        let mut best: Option<&Signal> = None;
        for &index in indices {
            let candidate = &self.signals[index];
            match best {
                Some(current) if candidate.confidence < current.confidence => {}
                _ => best = Some(candidate),
            }
        }
        best
    }

    /// Every signal recorded under `key`, in emission order.
    pub fn get_all(&self, key: &str) -> Vec<&Signal> {
        self.by_key
            .get(key)
            .map(|indices| indices.iter().map(|&i| &self.signals[i]).collect())
            .unwrap_or_default()
    }

    pub fn has(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    /// All signals in emission order.
    pub fn all(&self) -> &[Signal] {
        &self.signals
    }

    /// Distinct keys, in first-emission order.
    pub fn keys(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.signals
            .iter()
            .filter(|s| seen.insert(s.key.as_str()))
            .map(|s| s.key.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Signals emitted by a given wave.
    pub fn from_source<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a Signal> + 'a {
        self.signals.iter().filter(move |s| s.source == source)
    }

    /// Convenience: effective value as `f64`.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(SignalValue::as_f64)
    }

    /// Convenience: effective value as `bool`.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(SignalValue::as_bool)
    }

    /// Convenience: effective value as `&str`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(SignalValue::as_str)
    }
}

impl Serialize for SignalLedger {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.signals.serialize(serializer)
    }
}
