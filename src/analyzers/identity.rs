//! Basic facts about the input container.

use crate::input::AnalysisInput;
use crate::signal::{Signal, SignalLedger};
use crate::wave::{Wave, WaveContext};
use anyhow::Result;
use async_trait::async_trait;

const NAME: &str = "identity";

pub struct IdentityWave;

#[async_trait]
impl Wave for IdentityWave {
    fn name(&self) -> &str {
        NAME
    }

    async fn execute(
        &self,
        input: &AnalysisInput,
        _ledger: &SignalLedger,
        _ctx: &WaveContext,
    ) -> Result<Vec<Signal>> {
        let (width, height) = input.dimensions();
        let aspect_ratio = if height == 0 {
            0.0
        } else {
            ((width as f64 / height as f64) * 10_000.0).round() / 10_000.0
        };

        let mut signals = vec![
            Signal::new(NAME, "identity.width", width, 1.0),
            Signal::new(NAME, "identity.height", height, 1.0),
            Signal::new(NAME, "identity.aspect_ratio", aspect_ratio, 1.0),
            Signal::new(NAME, "identity.frame_count", input.frame_count(), 1.0),
            Signal::new(NAME, "identity.is_animated", input.is_animated(), 1.0),
        ];

        if input.is_animated() {
            signals.push(Signal::new(
                NAME,
                "identity.duration_ms",
                input.duration_ms() as f64,
                1.0,
            ));
        }
        if let Some(format) = &input.format {
            signals.push(Signal::new(NAME, "identity.format", format.as_str(), 1.0));
        }
        if !input.sha256.is_empty() {
            signals.push(Signal::new(NAME, "identity.sha256", input.sha256.as_str(), 1.0));
        }

        Ok(signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::testing::{animated, solid, still, value};
    use crate::signal::SignalValue;

    #[tokio::test]
    async fn test_still_image() {
        let input = still(solid(40, 20, [1, 2, 3]));
        let signals = IdentityWave
            .execute(&input, &SignalLedger::new(), &WaveContext::default())
            .await
            .unwrap();

        assert_eq!(value(&signals, "identity.width"), Some(&SignalValue::Number(40.0)));
        assert_eq!(value(&signals, "identity.aspect_ratio"), Some(&SignalValue::Number(2.0)));
        assert_eq!(value(&signals, "identity.is_animated"), Some(&SignalValue::Bool(false)));
        assert!(value(&signals, "identity.duration_ms").is_none());
        assert!(value(&signals, "identity.sha256").is_none());
        assert!(signals.iter().all(|s| s.source == NAME));
    }

    #[tokio::test]
    async fn test_animation_reports_duration() {
        let mut input = animated(vec![solid(4, 4, [0, 0, 0]); 3]);
        input.format = Some("gif".to_string());
        let signals = IdentityWave
            .execute(&input, &SignalLedger::new(), &WaveContext::default())
            .await
            .unwrap();

        assert_eq!(value(&signals, "identity.frame_count"), Some(&SignalValue::Number(3.0)));
        assert_eq!(value(&signals, "identity.duration_ms"), Some(&SignalValue::Number(300.0)));
        assert_eq!(value(&signals, "identity.format"), Some(&SignalValue::from("gif")));
    }
}
