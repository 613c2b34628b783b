use crate::input::AnalysisInput;
use crate::pipeline::EscalationHeuristic;
use crate::signal::{Signal, SignalLedger};
use crate::wave::{Wave, WaveContext};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

const NAME: &str = "route";

/// Records the local opinion on whether the remote model is needed.
///
/// The coordinator's conditional escalation policy reads `route.escalate`.
pub struct RouteWave {
    heuristic: Arc<dyn EscalationHeuristic>,
}

impl RouteWave {
    pub fn new(heuristic: Arc<dyn EscalationHeuristic>) -> Self {
        Self { heuristic }
    }
}

#[async_trait]
impl Wave for RouteWave {
    fn name(&self) -> &str {
        NAME
    }

    async fn execute(
        &self,
        _input: &AnalysisInput,
        ledger: &SignalLedger,
        _ctx: &WaveContext,
    ) -> Result<Vec<Signal>> {
        let assessment = self.heuristic.assess(ledger);
        debug!("Route: escalate={} ({})", assessment.escalate, assessment.reason);

        Ok(vec![
            Signal::new(NAME, "route.escalate", assessment.escalate, assessment.confidence),
            Signal::new(NAME, "route.reason", assessment.reason, assessment.confidence),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::testing::{ledger_with, solid, still, value};
    use crate::pipeline::{RouteAssessment, TextAndDetailHeuristic};
    use crate::signal::SignalValue;

    struct Fixed(bool);

    impl EscalationHeuristic for Fixed {
        fn assess(&self, _ledger: &SignalLedger) -> RouteAssessment {
            RouteAssessment {
                escalate: self.0,
                confidence: 0.7,
                reason: "fixed".to_string(),
            }
        }
    }

    #[tokio::test]
    async fn test_heuristic_is_pluggable() {
        let input = still(solid(2, 2, [0, 0, 0]));
        let signals = RouteWave::new(Arc::new(Fixed(true)))
            .execute(&input, &SignalLedger::new(), &WaveContext::default())
            .await
            .unwrap();
        assert_eq!(value(&signals, "route.escalate"), Some(&SignalValue::Bool(true)));
        assert_eq!(signals[0].confidence, 0.7);
    }

    #[tokio::test]
    async fn test_default_heuristic_on_unread_text() {
        let ledger = ledger_with(&[("content.text_likeliness", SignalValue::Number(0.9))]);
        let signals = RouteWave::new(Arc::new(TextAndDetailHeuristic::default()))
            .execute(&still(solid(2, 2, [0, 0, 0])), &ledger, &WaveContext::default())
            .await
            .unwrap();
        assert_eq!(value(&signals, "route.escalate"), Some(&SignalValue::Bool(true)));
    }
}
