//! Static wave metadata.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Tag marking waves that call a remote, costly model.
///
/// These only run after the escalation decision.
pub const EXPENSIVE_TAG: &str = "expensive";

/// Declared contract of one wave: when it runs and what it reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveManifest {
    pub name: String,
    /// Ascending: lower numbers run earlier.
    pub priority: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub emits: BTreeSet<String>,
    /// Keys that must already be in the ledger for this wave to run.
    #[serde(default)]
    pub requires: BTreeSet<String>,
    /// Keys consumed when present.
    #[serde(default)]
    pub optional: BTreeSet<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl WaveManifest {
    pub fn new(name: impl Into<String>, priority: u32) -> Self {
        Self {
            name: name.into(),
            priority,
            description: String::new(),
            emits: BTreeSet::new(),
            requires: BTreeSet::new(),
            optional: BTreeSet::new(),
            tags: BTreeSet::new(),
        }
    }

    pub fn emitting<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.emits.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn requiring<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn consuming<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optional.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn tagged<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn is_expensive(&self) -> bool {
        self.has_tag(EXPENSIVE_TAG)
    }

    /// Whether this wave declares `key` as an output.
    pub fn declares(&self, key: &str) -> bool {
        self.emits.contains(key)
    }
}
