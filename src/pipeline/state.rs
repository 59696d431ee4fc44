use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::PredictionRecord;

/// Interactive history cap; the durable store keeps everything.
pub const RECENT_CACHE_CAP: usize = 100;

/// Explicit cycle phase, inspected by the scheduler before each tick. A new
/// cycle may only start from `Idle`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CyclePhase {
    Idle,
    Capturing,
    Calling,
    LocalPlaceholder,
}

impl Default for CyclePhase {
    fn default() -> Self {
        CyclePhase::Idle
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ConnectivityStatus {
    Connected,
    Disconnected,
}

impl Default for ConnectivityStatus {
    fn default() -> Self {
        ConnectivityStatus::Connected
    }
}

/// Which device camera feeds the pipeline. Pure UI state; flipping it has no
/// effect on cycle processing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CameraFacing {
    Front,
    Back,
}

impl CameraFacing {
    pub fn flipped(self) -> Self {
        match self {
            CameraFacing::Front => CameraFacing::Back,
            CameraFacing::Back => CameraFacing::Front,
        }
    }
}

impl Default for CameraFacing {
    fn default() -> Self {
        CameraFacing::Front
    }
}

/// Latest successful prediction, for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentEmotion {
    pub emotion: crate::models::Emotion,
    pub confidence: f64,
    pub all_emotions: HashMap<String, f64>,
    pub processing_time_ms: f64,
    pub timestamp: DateTime<Utc>,
}

/// Shared pipeline state. Mutated only by the controller; everything else
/// reads snapshots.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineState {
    pub phase: CyclePhase,
    pub current: Option<CurrentEmotion>,
    pub session_predictions: u64,
    pub connectivity: ConnectivityStatus,
    pub last_error: Option<String>,
    pub camera_facing: CameraFacing,
    /// Bounded cache view of the persisted history, most recent first. Not
    /// authoritative.
    pub recent: VecDeque<PredictionRecord>,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            phase: CyclePhase::Idle,
            current: None,
            session_predictions: 0,
            connectivity: ConnectivityStatus::Connected,
            last_error: None,
            camera_facing: CameraFacing::Front,
            recent: VecDeque::new(),
        }
    }
}

impl PipelineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_recent(&mut self, record: PredictionRecord) {
        self.recent.push_front(record);
        self.recent.truncate(RECENT_CACHE_CAP);
    }
}
