use std::future::Future;
use std::pin::Pin;

use anyhow::Result;

pub type CaptureFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + 'a>>;

/// External camera collaborator. Capturing suspends until a frame is ready;
/// permission state is managed outside the pipeline and exposed as a gate the
/// controller checks before capturing.
pub trait FrameSource: Send + Sync {
    fn permission_granted(&self) -> bool;
    fn capture_frame(&self) -> CaptureFuture<'_>;
}

/// Haptic-feedback collaborator. Failures are swallowed by the pipeline and
/// must never fail a cycle.
pub trait Haptics: Send + Sync {
    fn pulse(&self) -> Result<()>;
}

/// No-op haptics for platforms without a vibration motor.
pub struct NullHaptics;

impl Haptics for NullHaptics {
    fn pulse(&self) -> Result<()> {
        Ok(())
    }
}
