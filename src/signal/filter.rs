//! Glob-style signal selection: `pattern1,pattern2,@collection`.
//!
//! - `*` matches every key
//! - `prefix*` matches keys starting with `prefix`
//! - `@name` expands to the patterns of a registered collection
//! - anything else must match the key exactly

use super::Signal;
use crate::error::PipelineError;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pattern {
    Any,
    Prefix(String),
    Exact(String),
}

impl Pattern {
    fn parse(raw: &str) -> Self {
        if raw == "*" {
            Pattern::Any
        } else if let Some(prefix) = raw.strip_suffix('*') {
            Pattern::Prefix(prefix.to_string())
        } else {
            Pattern::Exact(raw.to_string())
        }
    }

    fn matches(&self, key: &str) -> bool {
        match self {
            Pattern::Any => true,
            Pattern::Prefix(prefix) => key.starts_with(prefix.as_str()),
            Pattern::Exact(exact) => key == exact,
        }
    }
}

/// A parsed signal filter.
#[derive(Debug, Clone)]
pub struct SignalFilter {
    patterns: Vec<Pattern>,
}

impl SignalFilter {
    /// A filter that keeps everything.
    pub fn all() -> Self {
        Self {
            patterns: vec![Pattern::Any],
        }
    }

    /// Parse a comma-separated filter expression.
    ///
    /// Collection references are expanded against `collections`; an unknown
    /// collection is a configuration error.
    pub fn parse(
        expr: &str,
        collections: &BTreeMap<String, BTreeSet<String>>,
    ) -> Result<Self, PipelineError> {
        let mut patterns = Vec::new();

        for part in expr.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if let Some(name) = part.strip_prefix('@') {
                let members = collections.get(name).ok_or_else(|| {
                    PipelineError::InvalidFilter(format!(
                        "unknown collection '@{}' (known: {})",
                        name,
                        collections.keys().cloned().collect::<Vec<_>>().join(", ")
                    ))
                })?;
                patterns.extend(members.iter().map(|m| Pattern::parse(m)));
            } else {
                patterns.push(Pattern::parse(part));
            }
        }

        if patterns.is_empty() {
            return Err(PipelineError::InvalidFilter(format!(
                "filter '{}' contains no patterns",
                expr
            )));
        }

        Ok(Self { patterns })
    }

    pub fn matches(&self, key: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(key))
    }

    /// Keep the signals whose key matches, preserving order.
    pub fn apply<'a>(&self, signals: &'a [Signal]) -> Vec<&'a Signal> {
        signals.iter().filter(|s| self.matches(&s.key)).collect()
    }
}

impl Default for SignalFilter {
    fn default() -> Self {
        Self::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collections() -> BTreeMap<String, BTreeSet<String>> {
        let mut map = BTreeMap::new();
        map.insert(
            "alttext".to_string(),
            ["vision.caption", "ocr.text", "color.dominant"]
                .into_iter()
                .map(String::from)
                .collect(),
        );
        map
    }

    fn signals() -> Vec<Signal> {
        vec![
            Signal::new("identity", "identity.width", 10u32, 1.0),
            Signal::new("color", "color.dominant", "#ff0000", 0.8),
            Signal::new("ocr", "ocr.text", "hi", 0.7),
            Signal::new("ocr_voting", "ocr.voting.agreement", 0.9, 0.9),
        ]
    }

    #[test]
    fn test_star_matches_everything() {
        let filter = SignalFilter::parse("*", &collections()).unwrap();
        assert_eq!(filter.apply(&signals()).len(), 4);
    }

    #[test]
    fn test_prefix_and_exact() {
        let filter = SignalFilter::parse("ocr.*, identity.width", &collections()).unwrap();
        let sigs = signals();
        let keys: Vec<&str> = filter.apply(&sigs).iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["identity.width", "ocr.text", "ocr.voting.agreement"]);
    }

    #[test]
    fn test_collection_expansion() {
        let filter = SignalFilter::parse("@alttext", &collections()).unwrap();
        let sigs = signals();
        let keys: Vec<&str> = filter.apply(&sigs).iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["color.dominant", "ocr.text"]);
    }

    #[test]
    fn test_unknown_collection_is_error() {
        let err = SignalFilter::parse("@nope", &collections()).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_empty_filter_is_error() {
        assert!(SignalFilter::parse(" , ", &collections()).is_err());
    }
}
