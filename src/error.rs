//! Caller-visible pipeline failures.
//!
//! Per-wave faults never surface here; they are recorded as run notes on the
//! resulting profile. These variants are the configuration and input errors
//! that stop a run before any wave executes.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unknown pipeline '{name}' (available: {})", available.join(", "))]
    UnknownProfile { name: String, available: Vec<String> },

    #[error("cannot decode {}: {reason}", path.display())]
    InvalidInput { path: PathBuf, reason: String },

    #[error("input {} contains no frames", path.display())]
    EmptyInput { path: PathBuf },

    #[error("invalid signal filter: {0}")]
    InvalidFilter(String),

    #[error("configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_profile_lists_available() {
        let err = PipelineError::UnknownProfile {
            name: "bogus".to_string(),
            available: vec!["stats".to_string(), "auto".to_string()],
        };
        assert_eq!(err.to_string(), "unknown pipeline 'bogus' (available: stats, auto)");
    }
}
