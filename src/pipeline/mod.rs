mod controller;
mod events;
mod scheduler;
mod state;

pub use controller::{CycleOutcome, PipelineController, HAPTIC_CONFIDENCE_THRESHOLD};
pub use events::{EventBus, PipelineEvent};
pub use scheduler::CaptureScheduler;
pub use state::{
    CameraFacing, ConnectivityStatus, CurrentEmotion, CyclePhase, PipelineState,
    RECENT_CACHE_CAP,
};
