//! The process-wide wave registry.
//!
//! Built once at startup from the manifest catalogue plus the analyzer
//! implementations, then shared read-only (usually behind an `Arc`).

use super::{Wave, WaveManifest};
use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

const BUILTIN_MANIFESTS: &str = include_str!("manifests.toml");

/// On-disk shape of a manifest catalogue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestCatalog {
    #[serde(default, rename = "wave")]
    pub waves: Vec<WaveManifest>,
    #[serde(default)]
    pub collections: BTreeMap<String, BTreeSet<String>>,
}

/// A dependency that can never be satisfied in the default ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestIssue {
    pub wave: String,
    pub key: String,
}

impl fmt::Display for ManifestIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "wave '{}' requires '{}' but no earlier-priority wave emits it",
            self.wave, self.key
        )
    }
}

pub struct WaveRegistry {
    manifests: Vec<WaveManifest>,
    collections: BTreeMap<String, BTreeSet<String>>,
    analyzers: HashMap<String, Arc<dyn Wave>>,
}

impl WaveRegistry {
    /// Build a registry from manifests in declaration order.
    ///
    /// Duplicate wave names are a configuration error.
    pub fn new(
        manifests: Vec<WaveManifest>,
        collections: BTreeMap<String, BTreeSet<String>>,
    ) -> Result<Self, PipelineError> {
        let mut seen = BTreeSet::new();
        for manifest in &manifests {
            if !seen.insert(manifest.name.as_str()) {
                return Err(PipelineError::Config(format!(
                    "duplicate wave manifest '{}'",
                    manifest.name
                )));
            }
        }

        Ok(Self {
            manifests,
            collections,
            analyzers: HashMap::new(),
        })
    }

    /// Parse a TOML manifest catalogue.
    pub fn from_toml(text: &str) -> Result<Self, PipelineError> {
        let catalog: ManifestCatalog = toml::from_str(text)
            .map_err(|e| PipelineError::Config(format!("invalid wave catalogue: {}", e)))?;
        Self::new(catalog.waves, catalog.collections)
    }

    /// The catalogue compiled into the binary, without analyzers attached.
    pub fn builtin_catalog() -> Result<Self, PipelineError> {
        Self::from_toml(BUILTIN_MANIFESTS)
    }

    /// Attach the implementation for a declared wave.
    pub fn register(&mut self, analyzer: Arc<dyn Wave>) {
        let name = analyzer.name().to_string();
        if self.manifest(&name).is_none() {
            warn!("Registering analyzer '{}' with no manifest; it will never run", name);
        }
        debug!("Registered analyzer '{}'", name);
        self.analyzers.insert(name, analyzer);
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn Wave>) -> Self {
        self.register(analyzer);
        self
    }

    /// All manifests in declaration order.
    pub fn manifests(&self) -> &[WaveManifest] {
        &self.manifests
    }

    pub fn manifest(&self, name: &str) -> Option<&WaveManifest> {
        self.manifests.iter().find(|m| m.name == name)
    }

    /// Position of a wave in declaration order, used as the priority tie-break.
    pub fn declaration_index(&self, name: &str) -> Option<usize> {
        self.manifests.iter().position(|m| m.name == name)
    }

    pub fn analyzer(&self, name: &str) -> Option<Arc<dyn Wave>> {
        self.analyzers.get(name).cloned()
    }

    /// Named signal collections, each a set of filter patterns.
    pub fn collections(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.collections
    }

    /// Every key any wave may emit.
    pub fn all_keys(&self) -> BTreeSet<&str> {
        self.manifests
            .iter()
            .flat_map(|m| m.emits.iter().map(String::as_str))
            .collect()
    }

    /// Manifests that declare `key` as an output.
    pub fn producers_of(&self, key: &str) -> Vec<&WaveManifest> {
        self.manifests.iter().filter(|m| m.declares(key)).collect()
    }

    /// Check that every required key is emitted by a strictly earlier wave.
    ///
    /// Findings are logged and returned; they never stop startup.
    pub fn validate(&self) -> Vec<ManifestIssue> {
        let mut issues = Vec::new();

        for manifest in &self.manifests {
            for key in &manifest.requires {
                let satisfied = self
                    .manifests
                    .iter()
                    .any(|p| p.priority < manifest.priority && p.declares(key));
                if !satisfied {
                    let issue = ManifestIssue {
                        wave: manifest.name.clone(),
                        key: key.clone(),
                    };
                    warn!("{}", issue);
                    issues.push(issue);
                }
            }
        }

        for manifest in &self.manifests {
            if !self.analyzers.contains_key(&manifest.name) {
                debug!("Wave '{}' has no analyzer registered", manifest.name);
            }
        }

        issues
    }
}

impl fmt::Debug for WaveRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.analyzers.keys().collect();
        names.sort();
        f.debug_struct("WaveRegistry")
            .field("manifests", &self.manifests.len())
            .field("collections", &self.collections.keys().collect::<Vec<_>>())
            .field("analyzers", &names)
            .finish()
    }
}
