//! Named pipeline profiles: a wave filter plus an escalation policy.
//!
//! Profiles are plain data. Adding one never touches the coordinator; it is
//! either a new entry in the built-in catalogue or a `[[pipelines]]` block in
//! the user's config file.

use super::escalation::{EscalationPolicy, DEFAULT_ESCALATION_SIGNAL};
use crate::error::PipelineError;
use crate::wave::{WaveManifest, WaveRegistry};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const BUILTIN_PIPELINES: &str = include_str!("pipelines.toml");

/// Escalation mode as written in profile files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscalationMode {
    #[default]
    Never,
    Always,
    Conditional,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineProfile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Wave names or tags to run; `*` selects every wave.
    #[serde(default)]
    pub include: Vec<String>,
    /// Wave names or tags removed after inclusion.
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub escalation: EscalationMode,
    /// Boolean signal consulted when `escalation = "conditional"`.
    #[serde(default = "default_escalation_signal")]
    pub escalation_signal: String,
    /// Preferred output shape for renderers (`table`, `text`, `alttext`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Explicitly allowed to select no waves.
    #[serde(default)]
    pub noop: bool,
}

fn default_escalation_signal() -> String {
    DEFAULT_ESCALATION_SIGNAL.to_string()
}

impl PipelineProfile {
    pub fn new(name: impl Into<String>, include: &[&str], escalation: EscalationMode) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            include: include.iter().map(|s| s.to_string()).collect(),
            exclude: Vec::new(),
            escalation,
            escalation_signal: default_escalation_signal(),
            output: None,
            noop: false,
        }
    }

    pub fn excluding(mut self, exclude: &[&str]) -> Self {
        self.exclude = exclude.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Whether this profile's filter selects `manifest`.
    pub fn selects(&self, manifest: &WaveManifest) -> bool {
        let matches = |entry: &String| entry == &manifest.name || manifest.has_tag(entry);
        let included = self.include.iter().any(|e| e == "*" || matches(e));
        included && !self.exclude.iter().any(matches)
    }

    pub fn policy(&self) -> EscalationPolicy {
        match self.escalation {
            EscalationMode::Never => EscalationPolicy::Never,
            EscalationMode::Always => EscalationPolicy::Always,
            EscalationMode::Conditional => EscalationPolicy::Conditional {
                signal: self.escalation_signal.clone(),
            },
        }
    }

    /// Selected manifests in run order: ascending priority, ties in
    /// registry declaration order.
    pub fn resolve<'r>(&self, registry: &'r WaveRegistry) -> Vec<&'r WaveManifest> {
        let mut selected: Vec<&WaveManifest> = registry
            .manifests()
            .iter()
            .filter(|m| self.selects(m))
            .collect();
        selected.sort_by_key(|m| m.priority);
        selected
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PipelineFile {
    #[serde(default)]
    pipeline: Vec<PipelineProfile>,
}

/// All pipeline profiles the process knows about.
#[derive(Debug, Clone, Default)]
pub struct PipelineCatalog {
    profiles: Vec<PipelineProfile>,
}

impl PipelineCatalog {
    pub fn builtin() -> Result<Self, PipelineError> {
        Self::from_toml(BUILTIN_PIPELINES)
    }

    pub fn from_toml(text: &str) -> Result<Self, PipelineError> {
        let file: PipelineFile = toml::from_str(text)
            .map_err(|e| PipelineError::Config(format!("invalid pipeline catalogue: {}", e)))?;
        let mut catalog = Self::default();
        for profile in file.pipeline {
            catalog.register(profile);
        }
        Ok(catalog)
    }

    /// Add a profile, replacing any existing profile of the same name.
    /// Names compare case-insensitively, the same way `get` looks them up.
    pub fn register(&mut self, profile: PipelineProfile) {
        if let Some(existing) = self
            .profiles
            .iter_mut()
            .find(|p| p.name.eq_ignore_ascii_case(&profile.name))
        {
            debug!("Replacing pipeline '{}'", profile.name);
            *existing = profile;
        } else {
            self.profiles.push(profile);
        }
    }

    pub fn get(&self, name: &str) -> Result<&PipelineProfile, PipelineError> {
        self.profiles
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| PipelineError::UnknownProfile {
                name: name.to_string(),
                available: self.names(),
            })
    }

    pub fn names(&self) -> Vec<String> {
        self.profiles.iter().map(|p| p.name.clone()).collect()
    }

    pub fn profiles(&self) -> &[PipelineProfile] {
        &self.profiles
    }

    /// Names of profiles that select no waves and are not marked `noop`.
    pub fn validate(&self, registry: &WaveRegistry) -> Vec<String> {
        let mut empty = Vec::new();
        for profile in &self.profiles {
            if !profile.noop && profile.resolve(registry).is_empty() {
                warn!("Pipeline '{}' selects no waves", profile.name);
                empty.push(profile.name.clone());
            }
        }
        empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> WaveRegistry {
        WaveRegistry::builtin_catalog().unwrap()
    }

    fn names(manifests: &[&WaveManifest]) -> Vec<String> {
        manifests.iter().map(|m| m.name.clone()).collect()
    }

    #[test]
    fn test_every_builtin_resolves_non_empty() {
        let catalog = PipelineCatalog::builtin().unwrap();
        assert!(catalog.validate(&registry()).is_empty());
        for name in ["stats", "motion", "simpleocr", "advancedocr", "auto", "quality", "caption", "alttext"] {
            assert!(catalog.get(name).is_ok(), "missing {}", name);
        }
    }

    #[test]
    fn test_stats_selects_fast_metrics_only() {
        let catalog = PipelineCatalog::builtin().unwrap();
        let registry = registry();
        let stats = catalog.get("stats").unwrap();
        assert_eq!(names(&stats.resolve(&registry)), vec!["identity", "color", "quality"]);
        assert_eq!(stats.policy(), EscalationPolicy::Never);
    }

    #[test]
    fn test_exclusion_by_tag() {
        let catalog = PipelineCatalog::builtin().unwrap();
        let registry = registry();
        let simple = names(&catalog.get("simpleocr").unwrap().resolve(&registry));
        assert!(simple.contains(&"ocr".to_string()));
        assert!(!simple.contains(&"dedup".to_string()));
        assert!(!simple.contains(&"ocr_voting".to_string()));
        assert!(simple.contains(&"caption".to_string()));

        let advanced = names(&catalog.get("advancedocr").unwrap().resolve(&registry));
        assert!(advanced.contains(&"dedup".to_string()));
        assert!(advanced.contains(&"ocr_voting".to_string()));
    }

    #[test]
    fn test_resolve_is_priority_then_declaration_order() {
        let catalog = PipelineCatalog::builtin().unwrap();
        let registry = registry();
        let all = catalog.get("quality").unwrap().resolve(&registry);
        assert!(all.windows(2).all(|w| w[0].priority <= w[1].priority));
        let color = all.iter().position(|m| m.name == "color").unwrap();
        let quality = all.iter().position(|m| m.name == "quality").unwrap();
        assert!(color < quality);
    }

    #[test]
    fn test_unknown_profile() {
        let catalog = PipelineCatalog::builtin().unwrap();
        match catalog.get("turbo") {
            Err(PipelineError::UnknownProfile { name, available }) => {
                assert_eq!(name, "turbo");
                assert!(available.contains(&"stats".to_string()));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_register_replaces_and_adds() {
        let mut catalog = PipelineCatalog::builtin().unwrap();
        let before = catalog.names().len();

        catalog.register(PipelineProfile::new("stats", &["identity"], EscalationMode::Never));
        assert_eq!(catalog.names().len(), before);
        assert_eq!(catalog.get("stats").unwrap().include, vec!["identity"]);

        catalog.register(
            PipelineProfile::new("colors", &["color"], EscalationMode::Conditional)
                .excluding(&["quality"]),
        );
        assert_eq!(catalog.names().len(), before + 1);
        assert!(matches!(
            catalog.get("colors").unwrap().policy(),
            EscalationPolicy::Conditional { .. }
        ));
    }

    #[test]
    fn test_register_replaces_regardless_of_case() {
        let mut catalog = PipelineCatalog::builtin().unwrap();
        let before = catalog.names().len();

        catalog.register(PipelineProfile::new("Stats", &["identity"], EscalationMode::Never));

        assert_eq!(catalog.names().len(), before);
        let profile = catalog.get("stats").unwrap();
        assert_eq!(profile.name, "Stats");
        assert_eq!(profile.include, vec!["identity"]);
    }

    #[test]
    fn test_empty_profile_flagged_unless_noop() {
        let registry = registry();
        let mut catalog = PipelineCatalog::default();
        catalog.register(PipelineProfile::new("nothing", &["no-such-tag"], EscalationMode::Never));
        assert_eq!(catalog.validate(&registry), vec!["nothing"]);

        let mut noop = PipelineProfile::new("nothing", &[], EscalationMode::Never);
        noop.noop = true;
        catalog.register(noop);
        assert!(catalog.validate(&registry).is_empty());
    }
}
