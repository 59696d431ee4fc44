use log::trace;
use serde::Serialize;
use tokio::sync::broadcast;

use super::state::{ConnectivityStatus, CurrentEmotion, CyclePhase};

/// Typed state-change notifications published by the controller. Presentation
/// layers subscribe; the pipeline never depends on any UI refresh mechanism.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PipelineEvent {
    PhaseChanged { phase: CyclePhase },
    PredictionUpdated { current: CurrentEmotion },
    ConnectivityChanged { connectivity: ConnectivityStatus },
    ErrorOccurred { message: String },
    HistoryCleared,
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    /// Delivery is best-effort: publishing with no live subscribers is fine.
    pub fn publish(&self, event: PipelineEvent) {
        trace!("pipeline event: {event:?}");
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
