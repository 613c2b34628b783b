//! Status events published while a run progresses.

use serde::Serialize;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 128;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    RunStarted { input: String, pipeline: String, waves: usize },
    WaveStarted { wave: String },
    WaveCompleted { wave: String, signals: usize, elapsed_ms: u64 },
    WaveSkipped { wave: String, reason: String },
    WaveFailed { wave: String, error: String },
    EscalationDecided { escalate: bool, reason: String },
    RunFinished { executed: usize, elapsed_ms: u64, partial: bool },
}

/// Fan-out publisher. Publishing with no subscribers is a no-op.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: PipelineEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
