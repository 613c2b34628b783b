//! The wave scheduler.
//!
//! Waves run in ascending priority. Priority is the only dependency
//! mechanism: there is no runtime planner. Before each wave runs, its
//! `requires` keys are checked against the ledger and the wave is skipped
//! (with a note) if any are missing. Registry validation at startup is what
//! makes that check pass for well-formed pipelines; the runtime check only
//! keeps a broken pipeline from failing outright.
//!
//! Waves sharing a priority form a tier. With `parallel_tiers` they run
//! concurrently against the ledger as it stood before the tier, and their
//! signals are appended in declaration order once the whole tier has joined.

use super::events::{EventBus, PipelineEvent};
use super::profiles::PipelineCatalog;
use super::result::{ImageProfile, RunNote};
use crate::error::PipelineError;
use crate::input::AnalysisInput;
use crate::signal::{LedgerError, Signal, SignalLedger};
use crate::wave::{Wave, WaveContext, WaveManifest, WaveRegistry};
use chrono::Utc;
use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    /// Per-wave limit on concurrent backend calls.
    pub concurrency: usize,
    /// Run waves of equal priority concurrently.
    pub parallel_tiers: bool,
    /// Cancel the run after this long; completed waves are kept.
    pub run_timeout: Option<Duration>,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            parallel_tiers: true,
            run_timeout: None,
        }
    }
}

enum WaveOutcome {
    Completed { signals: Vec<Signal>, elapsed: Duration },
    Failed(String),
    Cancelled,
}

#[derive(Default)]
struct RunState {
    ledger: SignalLedger,
    executed: Vec<String>,
    notes: Vec<RunNote>,
    partial: bool,
}

pub struct Coordinator {
    registry: Arc<WaveRegistry>,
    catalog: Arc<PipelineCatalog>,
    options: CoordinatorOptions,
    events: EventBus,
}

impl Coordinator {
    pub fn new(
        registry: Arc<WaveRegistry>,
        catalog: Arc<PipelineCatalog>,
        options: CoordinatorOptions,
    ) -> Self {
        Self {
            registry,
            catalog,
            options,
            events: EventBus::new(),
        }
    }

    /// Receive status events for every subsequent run.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    pub fn registry(&self) -> &WaveRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &PipelineCatalog {
        &self.catalog
    }

    pub fn list_waves(&self) -> &[WaveManifest] {
        self.registry.manifests()
    }

    pub fn list_collections(&self) -> &BTreeMap<String, BTreeSet<String>> {
        self.registry.collections()
    }

    /// Analyze one input with the named pipeline.
    ///
    /// Fails only for configuration problems (unknown pipeline, empty
    /// input), before any wave runs. Wave-level problems are recorded as
    /// notes on the returned profile.
    pub async fn run_pipeline(
        &self,
        input: &AnalysisInput,
        pipeline: &str,
        cancel: CancellationToken,
    ) -> Result<ImageProfile, PipelineError> {
        let profile = self.catalog.get(pipeline)?;
        if input.frames.is_empty() {
            return Err(PipelineError::EmptyInput {
                path: input.path.clone().unwrap_or_default(),
            });
        }

        let started = Instant::now();
        let deadline = self
            .options
            .run_timeout
            .map(|timeout| tokio::time::Instant::now() + timeout);
        let ctx = WaveContext::new(cancel.child_token(), self.options.concurrency);

        let (expensive, local): (Vec<&WaveManifest>, Vec<&WaveManifest>) = profile
            .resolve(&self.registry)
            .into_iter()
            .partition(|m| m.is_expensive());

        info!(
            "Running pipeline '{}' on {} ({} local, {} remote wave(s))",
            profile.name,
            input.id,
            local.len(),
            expensive.len()
        );
        self.events.publish(PipelineEvent::RunStarted {
            input: input.id.clone(),
            pipeline: profile.name.clone(),
            waves: local.len() + expensive.len(),
        });

        let mut state = RunState::default();
        self.run_phase(&local, input, &ctx, deadline, &mut state).await;

        let mut escalation = None;
        if state.partial {
            for manifest in &expensive {
                state.notes.push(RunNote::Cancelled {
                    wave: manifest.name.clone(),
                });
            }
        } else {
            let decision = profile.policy().decide(&state.ledger);
            info!(
                "Escalation {}: {}",
                if decision.escalate { "granted" } else { "declined" },
                decision.reason
            );
            self.events.publish(PipelineEvent::EscalationDecided {
                escalate: decision.escalate,
                reason: decision.reason.clone(),
            });

            if decision.escalate {
                self.run_phase(&expensive, input, &ctx, deadline, &mut state).await;
            } else {
                for manifest in &expensive {
                    self.events.publish(PipelineEvent::WaveSkipped {
                        wave: manifest.name.clone(),
                        reason: decision.reason.clone(),
                    });
                    state.notes.push(RunNote::Declined {
                        wave: manifest.name.clone(),
                        reason: decision.reason.clone(),
                    });
                }
            }
            escalation = Some(decision);
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            "Pipeline '{}' finished in {}ms: {} wave(s) ran, {} signal(s){}",
            profile.name,
            elapsed_ms,
            state.executed.len(),
            state.ledger.len(),
            if state.partial { " (partial)" } else { "" }
        );
        self.events.publish(PipelineEvent::RunFinished {
            executed: state.executed.len(),
            elapsed_ms,
            partial: state.partial,
        });

        Ok(ImageProfile {
            input_id: input.id.clone(),
            pipeline: profile.name.clone(),
            analyzed_at: Utc::now(),
            elapsed_ms,
            executed_waves: state.executed,
            notes: state.notes,
            escalation,
            partial: state.partial,
            signals: state.ledger,
        })
    }

    async fn run_phase(
        &self,
        manifests: &[&WaveManifest],
        input: &AnalysisInput,
        ctx: &WaveContext,
        deadline: Option<tokio::time::Instant>,
        state: &mut RunState,
    ) {
        for tier in priority_tiers(manifests) {
            if state.partial || ctx.cancel.is_cancelled() || deadline_passed(deadline) {
                state.partial = true;
                for manifest in tier {
                    state.notes.push(RunNote::Cancelled {
                        wave: manifest.name.clone(),
                    });
                }
                continue;
            }

            if self.options.parallel_tiers && tier.len() > 1 {
                let runnable: Vec<(&WaveManifest, Arc<dyn Wave>)> = tier
                    .iter()
                    .filter_map(|m| self.prepare(m, state).map(|analyzer| (*m, analyzer)))
                    .collect();

                let ledger = &state.ledger;
                let outcomes = join_all(runnable.iter().map(|(manifest, analyzer)| {
                    self.execute_wave(manifest, analyzer.as_ref(), input, ledger, ctx, deadline)
                }))
                .await;

                for ((manifest, _), outcome) in runnable.iter().zip(outcomes) {
                    self.record(manifest, outcome, state);
                }
            } else {
                for manifest in tier {
                    if state.partial {
                        state.notes.push(RunNote::Cancelled {
                            wave: manifest.name.clone(),
                        });
                        continue;
                    }
                    if let Some(analyzer) = self.prepare(manifest, state) {
                        let outcome = self
                            .execute_wave(manifest, analyzer.as_ref(), input, &state.ledger, ctx, deadline)
                            .await;
                        self.record(manifest, outcome, state);
                    }
                }
            }
        }
    }

    /// Check a wave's dependency contract and look up its analyzer.
    fn prepare(&self, manifest: &WaveManifest, state: &mut RunState) -> Option<Arc<dyn Wave>> {
        let missing: Vec<String> = manifest
            .requires
            .iter()
            .filter(|key| !state.ledger.has(key))
            .cloned()
            .collect();

        if !missing.is_empty() {
            warn!(
                "Skipping wave '{}': dependency unmet ({})",
                manifest.name,
                missing.join(", ")
            );
            self.events.publish(PipelineEvent::WaveSkipped {
                wave: manifest.name.clone(),
                reason: format!("missing {}", missing.join(", ")),
            });
            state.notes.push(RunNote::DependencyUnmet {
                wave: manifest.name.clone(),
                missing,
            });
            return None;
        }

        match self.registry.analyzer(&manifest.name) {
            Some(analyzer) => Some(analyzer),
            None => {
                warn!("Skipping wave '{}': no analyzer registered", manifest.name);
                self.events.publish(PipelineEvent::WaveSkipped {
                    wave: manifest.name.clone(),
                    reason: "no analyzer registered".to_string(),
                });
                state.notes.push(RunNote::NoAnalyzer {
                    wave: manifest.name.clone(),
                });
                None
            }
        }
    }

    async fn execute_wave(
        &self,
        manifest: &WaveManifest,
        analyzer: &dyn Wave,
        input: &AnalysisInput,
        ledger: &SignalLedger,
        ctx: &WaveContext,
        deadline: Option<tokio::time::Instant>,
    ) -> WaveOutcome {
        debug!("Starting wave '{}' (priority {})", manifest.name, manifest.priority);
        self.events.publish(PipelineEvent::WaveStarted {
            wave: manifest.name.clone(),
        });

        let started = Instant::now();
        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => WaveOutcome::Cancelled,
            _ = wait_for_deadline(deadline) => {
                warn!("Run timed out during wave '{}'", manifest.name);
                ctx.cancel.cancel();
                WaveOutcome::Cancelled
            }
            result = analyzer.execute(input, ledger, ctx) => match result {
                // A wave that never yields can only be caught once it returns.
                Ok(_) if deadline_passed(deadline) => {
                    warn!(
                        "Wave '{}' finished after the run deadline; discarding its output",
                        manifest.name
                    );
                    ctx.cancel.cancel();
                    WaveOutcome::Cancelled
                }
                Ok(signals) => WaveOutcome::Completed {
                    signals,
                    elapsed: started.elapsed(),
                },
                Err(e) => WaveOutcome::Failed(format!("{:#}", e)),
            },
        }
    }

    /// Apply a wave's outcome to the run state. Signals are only ever
    /// appended for a completed wave.
    fn record(&self, manifest: &WaveManifest, outcome: WaveOutcome, state: &mut RunState) {
        let name = &manifest.name;
        match outcome {
            WaveOutcome::Completed { signals, elapsed } => {
                let mut appended = 0;
                for mut signal in signals {
                    if signal.source != *name {
                        debug!(
                            "Wave '{}' emitted signal with source '{}'; attributing to wave",
                            name, signal.source
                        );
                        signal.source = name.clone();
                    }
                    if !manifest.declares(&signal.key) {
                        warn!("Wave '{}' emitted undeclared key '{}'", name, signal.key);
                    }
                    match state.ledger.add(signal) {
                        Ok(()) => appended += 1,
                        Err(LedgerError::DuplicateSignal { wave, key }) => {
                            warn!("Dropping duplicate signal '{}' from '{}'", key, wave);
                            state.notes.push(RunNote::DuplicateSignal { wave, key });
                        }
                    }
                }

                let elapsed_ms = elapsed.as_millis() as u64;
                debug!("Wave '{}' emitted {} signal(s) in {}ms", name, appended, elapsed_ms);
                state.executed.push(name.clone());
                self.events.publish(PipelineEvent::WaveCompleted {
                    wave: name.clone(),
                    signals: appended,
                    elapsed_ms,
                });
            }
            WaveOutcome::Failed(message) => {
                warn!("Wave '{}' failed: {}", name, message);
                self.events.publish(PipelineEvent::WaveFailed {
                    wave: name.clone(),
                    error: message.clone(),
                });
                state.notes.push(RunNote::Failed {
                    wave: name.clone(),
                    message,
                });
            }
            WaveOutcome::Cancelled => {
                info!("Wave '{}' cancelled", name);
                state.partial = true;
                self.events.publish(PipelineEvent::WaveSkipped {
                    wave: name.clone(),
                    reason: "cancelled".to_string(),
                });
                state.notes.push(RunNote::Cancelled { wave: name.clone() });
            }
        }
    }
}

/// Split priority-sorted manifests into runs of equal priority.
fn priority_tiers<'a>(manifests: &[&'a WaveManifest]) -> Vec<Vec<&'a WaveManifest>> {
    let mut tiers: Vec<Vec<&WaveManifest>> = Vec::new();
    for &manifest in manifests {
        match tiers.last_mut() {
            Some(tier) if tier[0].priority == manifest.priority => tier.push(manifest),
            _ => tiers.push(vec![manifest]),
        }
    }
    tiers
}

fn deadline_passed(deadline: Option<tokio::time::Instant>) -> bool {
    deadline
        .map(|d| tokio::time::Instant::now() >= d)
        .unwrap_or(false)
}

async fn wait_for_deadline(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Frame;
    use crate::pipeline::profiles::{EscalationMode, PipelineProfile};
    use crate::signal::SignalValue;
    use anyhow::Result;
    use async_trait::async_trait;
    use image::{Rgba, RgbaImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Emits fixed signals and records what it saw in the ledger.
    struct StubWave {
        name: String,
        emits: Vec<(String, SignalValue, f64)>,
        delay: Option<Duration>,
        /// Busy time spent without yielding to the runtime.
        blocking: Option<Duration>,
        fail: bool,
        calls: AtomicUsize,
        observed: Mutex<Vec<String>>,
    }

    impl StubWave {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                emits: Vec::new(),
                delay: None,
                blocking: None,
                fail: false,
                calls: AtomicUsize::new(0),
                observed: Mutex::new(Vec::new()),
            }
        }

        fn emit(mut self, key: &str, value: impl Into<SignalValue>, confidence: f64) -> Self {
            self.emits.push((key.to_string(), value.into(), confidence));
            self
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        fn busy(mut self, duration: Duration) -> Self {
            self.blocking = Some(duration);
            self
        }

        fn failing(mut self) -> Self {
            self.fail = true;
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn observed(&self) -> Vec<String> {
            self.observed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Wave for StubWave {
        fn name(&self) -> &str {
            &self.name
        }

        async fn execute(
            &self,
            _input: &AnalysisInput,
            ledger: &SignalLedger,
            _ctx: &WaveContext,
        ) -> Result<Vec<Signal>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.observed.lock().unwrap() = ledger.keys().into_iter().map(String::from).collect();
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(duration) = self.blocking {
                std::thread::sleep(duration);
            }
            if self.fail {
                anyhow::bail!("analyzer exploded");
            }
            Ok(self
                .emits
                .iter()
                .map(|(k, v, c)| Signal::new(self.name.clone(), k.clone(), v.clone(), *c))
                .collect())
        }
    }

    fn still() -> AnalysisInput {
        AnalysisInput::from_frames(
            "test",
            vec![Frame::still(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255])))],
        )
    }

    fn coordinator(
        manifests: Vec<WaveManifest>,
        waves: Vec<Arc<StubWave>>,
        profiles: Vec<PipelineProfile>,
        options: CoordinatorOptions,
    ) -> Coordinator {
        let mut registry = WaveRegistry::new(manifests, BTreeMap::new()).unwrap();
        for wave in waves {
            registry.register(wave);
        }
        let mut catalog = PipelineCatalog::default();
        catalog.register(PipelineProfile::new("all", &["*"], EscalationMode::Never));
        for profile in profiles {
            catalog.register(profile);
        }
        Coordinator::new(Arc::new(registry), Arc::new(catalog), options)
    }

    #[tokio::test]
    async fn test_unmet_dependency_skips_wave() {
        let identity = Arc::new(StubWave::new("identity").emit("identity.width", 4u32, 1.0));
        let harmony = Arc::new(StubWave::new("harmony").emit("color.harmony", "warm", 0.5));
        let coordinator = coordinator(
            vec![
                WaveManifest::new("identity", 10).emitting(["identity.width"]),
                WaveManifest::new("harmony", 30)
                    .emitting(["color.harmony"])
                    .requiring(["color.palette"]),
            ],
            vec![identity.clone(), harmony.clone()],
            vec![],
            CoordinatorOptions::default(),
        );

        let profile = coordinator
            .run_pipeline(&still(), "all", CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(profile.executed_waves, vec!["identity"]);
        assert!(!profile.has_signal("color.harmony"));
        assert_eq!(harmony.calls(), 0);
        assert_eq!(
            profile.notes,
            vec![RunNote::DependencyUnmet {
                wave: "harmony".to_string(),
                missing: vec!["color.palette".to_string()],
            }]
        );
        assert!(!profile.partial);
    }

    #[tokio::test]
    async fn test_consumer_sees_producer_output() {
        let producer = Arc::new(StubWave::new("color").emit("color.palette", vec!["#000000"], 0.9));
        let consumer = Arc::new(StubWave::new("harmony").emit("color.harmony", "mono", 0.5));
        let coordinator = coordinator(
            vec![
                WaveManifest::new("harmony", 30)
                    .emitting(["color.harmony"])
                    .requiring(["color.palette"]),
                WaveManifest::new("color", 20).emitting(["color.palette"]),
            ],
            vec![producer.clone(), consumer.clone()],
            vec![],
            CoordinatorOptions::default(),
        );

        let profile = coordinator
            .run_pipeline(&still(), "all", CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(profile.executed_waves, vec!["color", "harmony"]);
        assert_eq!(consumer.observed(), vec!["color.palette"]);
        assert!(producer.observed().is_empty());
    }

    #[tokio::test]
    async fn test_same_tier_waves_do_not_observe_each_other() {
        let a = Arc::new(StubWave::new("a").emit("a.key", 1.0, 0.5));
        let b = Arc::new(StubWave::new("b").emit("b.key", 1.0, 0.5));
        let coordinator = coordinator(
            vec![
                WaveManifest::new("a", 20).emitting(["a.key"]),
                WaveManifest::new("b", 20).emitting(["b.key"]),
            ],
            vec![a.clone(), b.clone()],
            vec![],
            CoordinatorOptions::default(),
        );

        let profile = coordinator
            .run_pipeline(&still(), "all", CancellationToken::new())
            .await
            .unwrap();

        assert!(a.observed().is_empty());
        assert!(b.observed().is_empty());
        assert_eq!(profile.executed_waves, vec!["a", "b"]);
        assert_eq!(profile.signals.keys(), vec!["a.key", "b.key"]);
    }

    #[tokio::test]
    async fn test_sequential_tier_follows_declaration_order() {
        let a = Arc::new(StubWave::new("a").emit("a.key", 1.0, 0.5));
        let b = Arc::new(StubWave::new("b").emit("b.key", 1.0, 0.5));
        let coordinator = coordinator(
            vec![
                WaveManifest::new("a", 20).emitting(["a.key"]),
                WaveManifest::new("b", 20).emitting(["b.key"]),
            ],
            vec![a.clone(), b.clone()],
            vec![],
            CoordinatorOptions {
                parallel_tiers: false,
                ..CoordinatorOptions::default()
            },
        );

        coordinator
            .run_pipeline(&still(), "all", CancellationToken::new())
            .await
            .unwrap();

        assert!(a.observed().is_empty());
        assert_eq!(b.observed(), vec!["a.key"]);
    }

    #[tokio::test]
    async fn test_failure_is_recorded_and_run_continues() {
        let broken = Arc::new(StubWave::new("broken").emit("broken.key", 1.0, 0.5).failing());
        let after = Arc::new(StubWave::new("after").emit("after.key", 1.0, 0.5));
        let coordinator = coordinator(
            vec![
                WaveManifest::new("broken", 10).emitting(["broken.key"]),
                WaveManifest::new("after", 20).emitting(["after.key"]),
            ],
            vec![broken, after],
            vec![],
            CoordinatorOptions::default(),
        );

        let profile = coordinator
            .run_pipeline(&still(), "all", CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(profile.executed_waves, vec!["after"]);
        assert!(!profile.has_signal("broken.key"));
        assert!(matches!(
            &profile.notes[0],
            RunNote::Failed { wave, message } if wave == "broken" && message.contains("exploded")
        ));
    }

    #[tokio::test]
    async fn test_unknown_pipeline_fails_before_any_wave() {
        let wave = Arc::new(StubWave::new("a").emit("a.key", 1.0, 0.5));
        let coordinator = coordinator(
            vec![WaveManifest::new("a", 10).emitting(["a.key"])],
            vec![wave.clone()],
            vec![],
            CoordinatorOptions::default(),
        );

        let err = coordinator
            .run_pipeline(&still(), "nope", CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownProfile { .. }));
        assert_eq!(wave.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_input_rejected() {
        let coordinator = coordinator(vec![], vec![], vec![], CoordinatorOptions::default());
        let empty = AnalysisInput::from_frames("empty", vec![]);
        let err = coordinator
            .run_pipeline(&empty, "all", CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyInput { .. }));
    }

    fn escalation_setup(route_value: bool) -> (Coordinator, Arc<StubWave>) {
        let route = Arc::new(StubWave::new("route").emit("route.escalate", route_value, 0.8));
        let caption = Arc::new(StubWave::new("caption").emit("vision.caption", "a cat", 0.9));
        let manifests = vec![
            WaveManifest::new("route", 70).emitting(["route.escalate"]),
            WaveManifest::new("caption", 100)
                .emitting(["vision.caption"])
                .tagged(["expensive"]),
        ];
        let profiles = vec![
            PipelineProfile::new("never", &["*"], EscalationMode::Never),
            PipelineProfile::new("always", &["*"], EscalationMode::Always),
            PipelineProfile::new("conditional", &["*"], EscalationMode::Conditional),
        ];
        let coordinator = coordinator(
            manifests,
            vec![route, caption.clone()],
            profiles,
            CoordinatorOptions::default(),
        );
        (coordinator, caption)
    }

    #[tokio::test]
    async fn test_escalation_policies() {
        for route_value in [true, false] {
            let (coordinator, caption) = escalation_setup(route_value);
            let profile = coordinator
                .run_pipeline(&still(), "never", CancellationToken::new())
                .await
                .unwrap();
            assert_eq!(caption.calls(), 0);
            assert!(!profile.escalated());
            assert!(matches!(&profile.notes[0], RunNote::Declined { wave, .. } if wave == "caption"));

            let (coordinator, caption) = escalation_setup(route_value);
            let profile = coordinator
                .run_pipeline(&still(), "always", CancellationToken::new())
                .await
                .unwrap();
            assert_eq!(caption.calls(), 1);
            assert!(profile.has_signal("vision.caption"));

            let (coordinator, caption) = escalation_setup(route_value);
            let profile = coordinator
                .run_pipeline(&still(), "conditional", CancellationToken::new())
                .await
                .unwrap();
            assert_eq!(caption.calls(), usize::from(route_value));
            assert_eq!(profile.escalated(), route_value);
        }
    }

    #[tokio::test]
    async fn test_effective_value_across_waves() {
        let low = Arc::new(StubWave::new("low").emit("color.dominant", "red", 0.6));
        let high = Arc::new(StubWave::new("high").emit("color.dominant", "blue", 0.9));
        let coordinator = coordinator(
            vec![
                WaveManifest::new("high", 10).emitting(["color.dominant"]),
                WaveManifest::new("low", 20).emitting(["color.dominant"]),
            ],
            vec![low, high],
            vec![],
            CoordinatorOptions::default(),
        );

        let profile = coordinator
            .run_pipeline(&still(), "all", CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            profile.get_effective_value("color.dominant"),
            Some(&SignalValue::from("blue"))
        );
        let best = profile.get_best_signal("color.dominant").unwrap();
        assert_eq!(best.source, "high");
        assert!(std::ptr::eq(best, &profile.all_signals()[0]));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_returns_partial() {
        let wave = Arc::new(StubWave::new("a").emit("a.key", 1.0, 0.5));
        let coordinator = coordinator(
            vec![WaveManifest::new("a", 10).emitting(["a.key"])],
            vec![wave.clone()],
            vec![],
            CoordinatorOptions::default(),
        );

        let cancel = CancellationToken::new();
        cancel.cancel();
        let profile = coordinator.run_pipeline(&still(), "all", cancel).await.unwrap();

        assert!(profile.partial);
        assert!(profile.signals.is_empty());
        assert_eq!(wave.calls(), 0);
        assert!(profile.escalation.is_none());
    }

    #[tokio::test]
    async fn test_timeout_keeps_completed_waves() {
        let fast = Arc::new(StubWave::new("fast").emit("fast.key", 1.0, 0.5));
        let slow = Arc::new(
            StubWave::new("slow")
                .emit("slow.key", 1.0, 0.5)
                .slow(Duration::from_secs(30)),
        );
        let later = Arc::new(StubWave::new("later").emit("later.key", 1.0, 0.5));
        let coordinator = coordinator(
            vec![
                WaveManifest::new("fast", 10).emitting(["fast.key"]),
                WaveManifest::new("slow", 20).emitting(["slow.key"]),
                WaveManifest::new("later", 30).emitting(["later.key"]),
            ],
            vec![fast, slow, later.clone()],
            vec![],
            CoordinatorOptions {
                run_timeout: Some(Duration::from_millis(50)),
                ..CoordinatorOptions::default()
            },
        );

        let profile = coordinator
            .run_pipeline(&still(), "all", CancellationToken::new())
            .await
            .unwrap();

        assert!(profile.partial);
        assert_eq!(profile.executed_waves, vec!["fast"]);
        assert!(profile.has_signal("fast.key"));
        assert!(!profile.has_signal("slow.key"));
        assert_eq!(later.calls(), 0);
        assert!(profile.notes.contains(&RunNote::Cancelled { wave: "slow".to_string() }));
        assert!(profile.notes.contains(&RunNote::Cancelled { wave: "later".to_string() }));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_parallel_tier() {
        let fast = Arc::new(StubWave::new("fast").emit("fast.key", 1.0, 0.5));
        let left = Arc::new(
            StubWave::new("left")
                .emit("left.key", 1.0, 0.5)
                .slow(Duration::from_secs(30)),
        );
        let right = Arc::new(
            StubWave::new("right")
                .emit("right.key", 1.0, 0.5)
                .slow(Duration::from_secs(30)),
        );
        let coordinator = coordinator(
            vec![
                WaveManifest::new("fast", 10).emitting(["fast.key"]),
                WaveManifest::new("left", 20).emitting(["left.key"]),
                WaveManifest::new("right", 20).emitting(["right.key"]),
            ],
            vec![fast, left.clone(), right.clone()],
            vec![],
            CoordinatorOptions::default(),
        );

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let profile = coordinator.run_pipeline(&still(), "all", cancel).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(profile.partial);
        assert_eq!(profile.executed_waves, vec!["fast"]);
        assert_eq!(left.calls(), 1);
        assert_eq!(right.calls(), 1);
        assert!(profile.notes.contains(&RunNote::Cancelled { wave: "left".to_string() }));
        assert!(profile.notes.contains(&RunNote::Cancelled { wave: "right".to_string() }));
        assert!(!profile.has_signal("left.key"));
        assert!(!profile.has_signal("right.key"));
    }

    #[tokio::test]
    async fn test_wave_finishing_past_deadline_is_discarded() {
        let hog = Arc::new(
            StubWave::new("hog")
                .emit("hog.key", 1.0, 0.5)
                .busy(Duration::from_millis(200)),
        );
        let later = Arc::new(StubWave::new("later").emit("later.key", 1.0, 0.5));
        let coordinator = coordinator(
            vec![
                WaveManifest::new("hog", 10).emitting(["hog.key"]),
                WaveManifest::new("later", 20).emitting(["later.key"]),
            ],
            vec![hog.clone(), later.clone()],
            vec![],
            CoordinatorOptions {
                run_timeout: Some(Duration::from_millis(20)),
                ..CoordinatorOptions::default()
            },
        );

        let profile = coordinator
            .run_pipeline(&still(), "all", CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(hog.calls(), 1);
        assert!(profile.partial);
        assert!(profile.executed_waves.is_empty());
        assert!(!profile.has_signal("hog.key"));
        assert_eq!(later.calls(), 0);
        assert_eq!(
            profile.notes,
            vec![
                RunNote::Cancelled { wave: "hog".to_string() },
                RunNote::Cancelled { wave: "later".to_string() },
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_analyzer_noted() {
        let coordinator = coordinator(
            vec![WaveManifest::new("ghost", 10).emitting(["ghost.key"])],
            vec![],
            vec![],
            CoordinatorOptions::default(),
        );
        let profile = coordinator
            .run_pipeline(&still(), "all", CancellationToken::new())
            .await
            .unwrap();
        assert!(profile.executed_waves.is_empty());
        assert_eq!(profile.notes, vec![RunNote::NoAnalyzer { wave: "ghost".to_string() }]);
    }

    #[tokio::test]
    async fn test_events_published() {
        let wave = Arc::new(StubWave::new("a").emit("a.key", 1.0, 0.5));
        let coordinator = coordinator(
            vec![WaveManifest::new("a", 10).emitting(["a.key"])],
            vec![wave],
            vec![],
            CoordinatorOptions::default(),
        );
        let mut rx = coordinator.subscribe();

        coordinator
            .run_pipeline(&still(), "all", CancellationToken::new())
            .await
            .unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(matches!(events.first(), Some(PipelineEvent::RunStarted { .. })));
        assert!(events.contains(&PipelineEvent::WaveStarted { wave: "a".to_string() }));
        assert!(events
            .iter()
            .any(|e| matches!(e, PipelineEvent::WaveCompleted { wave, signals: 1, .. } if wave == "a")));
        assert!(matches!(
            events.last(),
            Some(PipelineEvent::RunFinished { executed: 1, partial: false, .. })
        ));
    }

    #[test]
    fn test_priority_tiers() {
        let a = WaveManifest::new("a", 10);
        let b = WaveManifest::new("b", 20);
        let c = WaveManifest::new("c", 20);
        let d = WaveManifest::new("d", 30);
        let tiers = priority_tiers(&[&a, &b, &c, &d]);
        let names: Vec<Vec<&str>> = tiers
            .iter()
            .map(|t| t.iter().map(|m| m.name.as_str()).collect())
            .collect();
        assert_eq!(names, vec![vec!["a"], vec!["b", "c"], vec!["d"]]);
    }
}
