//! JSON and plain-text rendering of an [`ImageProfile`].
//!
//! Both renderers apply the caller's [`SignalFilter`] to the signal list
//! and to the table of effective values; run metadata is always included.

use crate::pipeline::{EscalationDecision, ImageProfile, RunNote};
use crate::signal::{Signal, SignalFilter, SignalValue};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Longest value shown in a text table cell.
const MAX_CELL_CHARS: usize = 60;

#[derive(Serialize)]
struct JsonReport<'a> {
    input_id: &'a str,
    pipeline: &'a str,
    analyzed_at: DateTime<Utc>,
    elapsed_ms: u64,
    partial: bool,
    executed_waves: &'a [String],
    notes: &'a [RunNote],
    #[serde(skip_serializing_if = "Option::is_none")]
    escalation: Option<&'a EscalationDecision>,
    /// Effective value per selected key.
    values: BTreeMap<&'a str, &'a SignalValue>,
    signals: Vec<&'a Signal>,
}

/// Effective value of every key that has at least one selected signal.
fn effective_values<'a>(
    profile: &'a ImageProfile,
    selected: &[&'a Signal],
) -> BTreeMap<&'a str, &'a SignalValue> {
    selected
        .iter()
        .filter_map(|s| {
            profile
                .get_effective_value(&s.key)
                .map(|value| (s.key.as_str(), value))
        })
        .collect()
}

/// Generate a pretty-printed JSON report.
pub fn generate_json_report(profile: &ImageProfile, filter: &SignalFilter) -> Result<String> {
    let signals = profile.filtered(filter);
    let report = JsonReport {
        input_id: &profile.input_id,
        pipeline: &profile.pipeline,
        analyzed_at: profile.analyzed_at,
        elapsed_ms: profile.elapsed_ms,
        partial: profile.partial,
        executed_waves: &profile.executed_waves,
        notes: &profile.notes,
        escalation: profile.escalation.as_ref(),
        values: effective_values(profile, &signals),
        signals,
    };
    serde_json::to_string_pretty(&report).context("Failed to serialize report to JSON")
}

/// Generate a plain-text report with a table of effective values.
pub fn generate_text_report(profile: &ImageProfile, filter: &SignalFilter) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "ImageSift report for {} (pipeline: {})\n",
        profile.input_id, profile.pipeline
    ));
    output.push_str(&format!(
        "Analyzed {} in {}ms{}\n\n",
        profile.analyzed_at.format("%Y-%m-%d %H:%M:%S UTC"),
        profile.elapsed_ms,
        if profile.partial { " (partial)" } else { "" }
    ));

    output.push_str(&generate_headline_section(profile));
    output.push_str(&generate_values_section(profile, filter));
    output.push_str(&generate_run_section(profile));

    output
}

/// Caption or alt text, when the run produced one.
fn generate_headline_section(profile: &ImageProfile) -> String {
    let mut section = String::new();
    for (label, key) in [("Alt text", "vision.alt_text"), ("Caption", "vision.caption")] {
        if let Some(text) = profile.get_effective_value(key).and_then(|v| v.as_str()) {
            section.push_str(&format!("{}: {}\n", label, text));
        }
    }
    if !section.is_empty() {
        section.push('\n');
    }
    section
}

fn generate_values_section(profile: &ImageProfile, filter: &SignalFilter) -> String {
    let selected = profile.filtered(filter);
    let values = effective_values(profile, &selected);
    if values.is_empty() {
        return "No signals selected.\n\n".to_string();
    }

    let rows: Vec<(String, String, String, String)> = values
        .iter()
        .map(|(key, value)| {
            let best = profile.get_best_signal(key);
            (
                key.to_string(),
                truncate(&value.to_string(), MAX_CELL_CHARS),
                best.map(|s| format!("{:.2}", s.confidence)).unwrap_or_default(),
                best.map(|s| s.source.clone()).unwrap_or_default(),
            )
        })
        .collect();

    let key_width = rows.iter().map(|r| r.0.chars().count()).max().unwrap_or(0).max(6);
    let value_width = rows.iter().map(|r| r.1.chars().count()).max().unwrap_or(0).max(5);

    let mut section = format!(
        "{:<kw$}  {:<vw$}  {:>4}  {}\n",
        "SIGNAL",
        "VALUE",
        "CONF",
        "SOURCE",
        kw = key_width,
        vw = value_width
    );
    for (key, value, confidence, source) in rows {
        section.push_str(&format!(
            "{:<kw$}  {:<vw$}  {:>4}  {}\n",
            key,
            value,
            confidence,
            source,
            kw = key_width,
            vw = value_width
        ));
    }
    section.push('\n');
    section
}

fn generate_run_section(profile: &ImageProfile) -> String {
    let mut section = String::new();

    section.push_str(&format!("Waves run: {}\n", profile.executed_waves.join(", ")));
    if let Some(decision) = &profile.escalation {
        section.push_str(&format!(
            "Escalation: {} ({})\n",
            if decision.escalate { "yes" } else { "no" },
            decision.reason
        ));
    }
    if !profile.notes.is_empty() {
        section.push_str("Notes:\n");
        for note in &profile.notes {
            section.push_str(&format!("  - {}\n", note));
        }
    }

    section
}

fn truncate(text: &str, max_chars: usize) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() <= max_chars {
        single_line
    } else {
        let cut: String = single_line.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

/// Write rendered output to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}
