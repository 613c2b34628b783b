//! Whether to invoke the remote vision model.
//!
//! The policy is chosen per pipeline profile and evaluated once, after the
//! local waves have finished. The boolean consumed by the conditional policy
//! is produced by the `route` wave through an [`EscalationHeuristic`].

use crate::signal::SignalLedger;
use serde::{Deserialize, Serialize};

/// Signal consulted by the conditional policy unless a profile overrides it.
pub const DEFAULT_ESCALATION_SIGNAL: &str = "route.escalate";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum EscalationPolicy {
    Never,
    Always,
    /// Escalate iff the effective value of `signal` is `true`.
    Conditional { signal: String },
}

/// Outcome of applying a policy to a ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EscalationDecision {
    pub escalate: bool,
    pub policy: EscalationPolicy,
    pub reason: String,
}

impl EscalationPolicy {
    pub fn decide(&self, ledger: &SignalLedger) -> EscalationDecision {
        let (escalate, reason) = match self {
            EscalationPolicy::Never => (false, "pipeline never escalates".to_string()),
            EscalationPolicy::Always => (true, "pipeline always escalates".to_string()),
            EscalationPolicy::Conditional { signal } => match ledger.get_bool(signal) {
                Some(true) => {
                    let why = ledger.get_str("route.reason").unwrap_or("signal is true");
                    (true, format!("{}: {}", signal, why))
                }
                Some(false) => (false, format!("{} is false", signal)),
                None => (false, format!("{} not present", signal)),
            },
        };

        EscalationDecision {
            escalate,
            policy: self.clone(),
            reason,
        }
    }
}

/// Result of a routing heuristic.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteAssessment {
    pub escalate: bool,
    pub confidence: f64,
    pub reason: String,
}

/// Pluggable local decision on whether the expensive model is warranted.
pub trait EscalationHeuristic: Send + Sync {
    fn assess(&self, ledger: &SignalLedger) -> RouteAssessment;
}

/// Default routing rule.
///
/// Escalates when text is likely but local OCR found none or read it with
/// low confidence, and when the image is visually busy. Obviously simple
/// images (little text, few edges) stay local.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextAndDetailHeuristic {
    pub text_likeliness_threshold: f64,
    pub min_ocr_confidence: f64,
    pub busy_edge_density: f64,
}

impl Default for TextAndDetailHeuristic {
    fn default() -> Self {
        Self {
            text_likeliness_threshold: 0.5,
            min_ocr_confidence: 0.6,
            busy_edge_density: 0.25,
        }
    }
}

impl EscalationHeuristic for TextAndDetailHeuristic {
    fn assess(&self, ledger: &SignalLedger) -> RouteAssessment {
        let text_likeliness = ledger.get_f64("content.text_likeliness").unwrap_or(0.0);
        let edge_density = ledger.get_f64("content.edge_density").unwrap_or(0.0);

        let ocr_text = ledger
            .get_str("ocr.voting.consensus_text")
            .or_else(|| ledger.get_str("ocr.text"))
            .map(str::trim)
            .filter(|t| !t.is_empty());
        let ocr_confidence = ledger
            .get_f64("ocr.voting.stabilization_confidence")
            .or_else(|| ledger.get_f64("ocr.confidence"))
            .unwrap_or(0.0);

        if text_likeliness >= self.text_likeliness_threshold {
            match ocr_text {
                None => {
                    return RouteAssessment {
                        escalate: true,
                        confidence: text_likeliness,
                        reason: "text likely but local OCR found none".to_string(),
                    }
                }
                Some(_) if ocr_confidence < self.min_ocr_confidence => {
                    return RouteAssessment {
                        escalate: true,
                        confidence: 1.0 - ocr_confidence,
                        reason: format!("local OCR confidence {:.2} is low", ocr_confidence),
                    }
                }
                Some(_) => {}
            }
        }

        if edge_density >= self.busy_edge_density {
            return RouteAssessment {
                escalate: true,
                confidence: edge_density.min(1.0),
                reason: format!("visually detailed (edge density {:.2})", edge_density),
            };
        }

        RouteAssessment {
            escalate: false,
            confidence: 1.0 - edge_density.max(text_likeliness * 0.5),
            reason: "simple image; local signals suffice".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Signal;

    fn ledger_with(signals: Vec<Signal>) -> SignalLedger {
        let mut ledger = SignalLedger::new();
        for s in signals {
            ledger.add(s).unwrap();
        }
        ledger
    }

    #[test]
    fn test_never_ignores_signals() {
        let ledger = ledger_with(vec![Signal::new("route", "route.escalate", true, 1.0)]);
        assert!(!EscalationPolicy::Never.decide(&ledger).escalate);
    }

    #[test]
    fn test_always_escalates_on_empty_ledger() {
        assert!(EscalationPolicy::Always.decide(&SignalLedger::new()).escalate);
    }

    #[test]
    fn test_conditional_follows_effective_value() {
        let policy = EscalationPolicy::Conditional {
            signal: DEFAULT_ESCALATION_SIGNAL.to_string(),
        };

        assert!(!policy.decide(&SignalLedger::new()).escalate);

        let no = ledger_with(vec![Signal::new("route", "route.escalate", false, 0.9)]);
        assert!(!policy.decide(&no).escalate);

        // Two opinions: the more confident one decides.
        let mixed = ledger_with(vec![
            Signal::new("route", "route.escalate", false, 0.4),
            Signal::new("other", "route.escalate", true, 0.8),
        ]);
        assert!(policy.decide(&mixed).escalate);

        let not_bool = ledger_with(vec![Signal::new("route", "route.escalate", "yes", 1.0)]);
        assert!(!policy.decide(&not_bool).escalate);
    }

    #[test]
    fn test_heuristic_escalates_when_text_unread() {
        let ledger = ledger_with(vec![Signal::new("content", "content.text_likeliness", 0.8, 0.6)]);
        let assessment = TextAndDetailHeuristic::default().assess(&ledger);
        assert!(assessment.escalate);
        assert!(assessment.reason.contains("OCR"));
    }

    #[test]
    fn test_heuristic_keeps_simple_images_local() {
        let ledger = ledger_with(vec![
            Signal::new("content", "content.text_likeliness", 0.05, 0.6),
            Signal::new("content", "content.edge_density", 0.02, 0.6),
        ]);
        assert!(!TextAndDetailHeuristic::default().assess(&ledger).escalate);
    }

    #[test]
    fn test_heuristic_trusts_confident_ocr() {
        let ledger = ledger_with(vec![
            Signal::new("content", "content.text_likeliness", 0.9, 0.6),
            Signal::new("content", "content.edge_density", 0.1, 0.6),
            Signal::new("ocr", "ocr.text", "SALE 50% OFF", 0.9),
            Signal::new("ocr", "ocr.confidence", 0.9, 0.9),
        ]);
        assert!(!TextAndDetailHeuristic::default().assess(&ledger).escalate);
    }
}
