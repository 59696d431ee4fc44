use std::sync::{Arc, RwLock};

use chrono::Utc;
use log::{error, warn};
use tokio::sync::Mutex;

use crate::camera::{FrameSource, Haptics};
use crate::db::Database;
use crate::errors::PipelineError;
use crate::models::{PredictionRecord, UserSettings};
use crate::remote::PredictService;

use super::events::{EventBus, PipelineEvent};
use super::state::{
    CameraFacing, ConnectivityStatus, CurrentEmotion, CyclePhase, PipelineState,
};

/// Haptic feedback fires only for strictly higher confidence; 0.8 exactly
/// does not trigger.
pub const HAPTIC_CONFIDENCE_THRESHOLD: f64 = 0.8;

/// How one capture cycle ended. `Skipped` means the entry guard refused the
/// tick because a prior cycle was still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Skipped,
    Succeeded,
    Failed,
}

/// Orchestrates one capture cycle end to end: entry guard, frame acquisition,
/// privacy branch, remote call or local placeholder, persistence, side
/// effects. Always returns the phase to `Idle`, whatever the exit path.
pub struct PipelineController {
    state: Arc<Mutex<PipelineState>>,
    db: Database,
    service: Arc<dyn PredictService>,
    frame_source: Arc<dyn FrameSource>,
    haptics: Arc<dyn Haptics>,
    settings: Arc<RwLock<UserSettings>>,
    events: EventBus,
    user_id: String,
}

impl PipelineController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Database,
        service: Arc<dyn PredictService>,
        frame_source: Arc<dyn FrameSource>,
        haptics: Arc<dyn Haptics>,
        events: EventBus,
        user_id: String,
        settings: UserSettings,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(PipelineState::new())),
            db,
            service,
            frame_source,
            haptics,
            settings: Arc::new(RwLock::new(settings)),
            events,
            user_id,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub async fn is_processing(&self) -> bool {
        self.state.lock().await.phase != CyclePhase::Idle
    }

    pub async fn snapshot(&self) -> PipelineState {
        self.state.lock().await.clone()
    }

    /// Replaces the live settings the privacy branch consults. Callers persist
    /// separately; this only swaps the in-memory handle.
    pub fn apply_settings(&self, settings: UserSettings) {
        let mut guard = match self.settings.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = settings;
    }

    pub fn current_settings(&self) -> UserSettings {
        match self.settings.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Pure UI-state flip; no effect on cycle processing.
    pub async fn toggle_camera_facing(&self) -> CameraFacing {
        let mut state = self.state.lock().await;
        state.camera_facing = state.camera_facing.flipped();
        state.camera_facing
    }

    pub async fn mark_connectivity(&self, connectivity: ConnectivityStatus) {
        let changed = {
            let mut state = self.state.lock().await;
            let changed = state.connectivity != connectivity;
            state.connectivity = connectivity;
            changed
        };
        if changed {
            self.events
                .publish(PipelineEvent::ConnectivityChanged { connectivity });
        }
    }

    /// Drops the in-memory cache after the durable history was cleared.
    pub async fn clear_recent(&self) {
        {
            let mut state = self.state.lock().await;
            state.recent.clear();
            state.session_predictions = 0;
        }
        self.events.publish(PipelineEvent::HistoryCleared);
    }

    /// Runs one capture cycle. Every failure is contained here: it lands in
    /// shared error state and the event bus, never propagates to the caller.
    pub async fn run_cycle(&self) -> CycleOutcome {
        {
            let mut state = self.state.lock().await;
            if state.phase != CyclePhase::Idle {
                return CycleOutcome::Skipped;
            }
            state.phase = CyclePhase::Capturing;
        }
        self.publish_phase(CyclePhase::Capturing);

        let outcome = self.execute_cycle().await;

        {
            let mut state = self.state.lock().await;
            state.phase = CyclePhase::Idle;
        }
        self.publish_phase(CyclePhase::Idle);

        outcome
    }

    async fn execute_cycle(&self) -> CycleOutcome {
        if !self.frame_source.permission_granted() {
            self.record_error(PipelineError::Permission).await;
            return CycleOutcome::Failed;
        }

        let timestamp = Utc::now();
        let frame = match self.frame_source.capture_frame().await {
            Ok(frame) => frame,
            Err(err) => {
                self.record_error(PipelineError::Capture(format!("{err:#}")))
                    .await;
                return CycleOutcome::Failed;
            }
        };

        // Live value at branch time, not a cycle-start snapshot.
        let privacy_mode = self.current_settings().privacy_mode;

        if privacy_mode {
            self.placeholder_cycle(timestamp).await
        } else {
            self.predict_cycle(frame, timestamp).await
        }
    }

    async fn placeholder_cycle(&self, timestamp: chrono::DateTime<Utc>) -> CycleOutcome {
        self.set_phase(CyclePhase::LocalPlaceholder).await;

        let record = PredictionRecord::placeholder(&self.user_id, timestamp);
        match self.db.insert_prediction(&record).await {
            Ok(()) => {
                self.state.lock().await.push_recent(record);
                CycleOutcome::Succeeded
            }
            Err(err) => {
                self.record_error(PipelineError::persistence(err)).await;
                CycleOutcome::Failed
            }
        }
    }

    async fn predict_cycle(
        &self,
        frame: Vec<u8>,
        timestamp: chrono::DateTime<Utc>,
    ) -> CycleOutcome {
        self.set_phase(CyclePhase::Calling).await;

        let outcome = match self
            .service
            .predict(frame, self.user_id.clone(), timestamp)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                self.record_error(PipelineError::Network(err)).await;
                return CycleOutcome::Failed;
            }
        };

        let current = CurrentEmotion {
            emotion: outcome.emotion,
            confidence: outcome.confidence,
            all_emotions: outcome.all_emotions.clone(),
            processing_time_ms: outcome.processing_time_ms,
            timestamp,
        };
        {
            let mut state = self.state.lock().await;
            state.current = Some(current.clone());
            state.last_error = None;
        }
        self.events
            .publish(PipelineEvent::PredictionUpdated { current });
        self.mark_connectivity(ConnectivityStatus::Connected).await;

        let record = PredictionRecord {
            id: None,
            user_id: self.user_id.clone(),
            emotion: outcome.emotion,
            confidence: outcome.confidence,
            timestamp,
            all_emotions: outcome.all_emotions,
            processing_time_ms: outcome.processing_time_ms,
            created_at: Utc::now(),
        };

        if let Err(err) = self.db.insert_prediction(&record).await {
            self.record_error(PipelineError::persistence(err)).await;
            return CycleOutcome::Failed;
        }

        {
            let mut state = self.state.lock().await;
            state.push_recent(record);
            state.session_predictions += 1;
        }

        if outcome.confidence > HAPTIC_CONFIDENCE_THRESHOLD {
            // Haptics are best-effort and must never fail the cycle.
            if let Err(err) = self.haptics.pulse() {
                warn!("haptic feedback failed: {err:#}");
            }
        }

        CycleOutcome::Succeeded
    }

    async fn set_phase(&self, phase: CyclePhase) {
        self.state.lock().await.phase = phase;
        self.publish_phase(phase);
    }

    fn publish_phase(&self, phase: CyclePhase) {
        self.events.publish(PipelineEvent::PhaseChanged { phase });
    }

    async fn record_error(&self, err: PipelineError) {
        let message = err.to_string();
        error!("capture cycle failed: {message}");

        let flip = matches!(&err, PipelineError::Network(net) if net.is_unreachable());
        {
            let mut state = self.state.lock().await;
            state.last_error = Some(message.clone());
        }
        if flip {
            self.mark_connectivity(ConnectivityStatus::Disconnected).await;
        }
        self.events.publish(PipelineEvent::ErrorOccurred { message });
    }
}
