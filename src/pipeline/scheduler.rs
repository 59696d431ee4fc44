use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::{debug, info};
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::controller::{CycleOutcome, PipelineController};
use crate::models::{FRAME_RATE_MAX, FRAME_RATE_MIN};

/// Drives periodic capture attempts at `frame_rate` captures per second.
/// Cycles are never queued: a tick that arrives while a cycle is in flight is
/// a no-op.
pub struct CaptureScheduler {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
    frame_rate: Option<u32>,
}

impl CaptureScheduler {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
            frame_rate: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn frame_rate(&self) -> Option<u32> {
        self.frame_rate
    }

    pub fn start(&mut self, controller: Arc<PipelineController>, frame_rate: u32) -> Result<()> {
        if self.handle.is_some() {
            bail!("capture scheduler already active");
        }
        if !(FRAME_RATE_MIN..=FRAME_RATE_MAX).contains(&frame_rate) {
            bail!("frame_rate {frame_rate} outside {FRAME_RATE_MIN}..={FRAME_RATE_MAX}");
        }

        let period = Duration::from_millis(1000 / u64::from(frame_rate));
        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();

        info!("Starting capture loop at {frame_rate} fps ({period:?} period)");
        let handle = tokio::spawn(capture_loop(controller, period, token_clone));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        self.frame_rate = Some(frame_rate);
        Ok(())
    }

    /// Cancels the loop and waits for it to exit. An in-flight cycle is not
    /// interrupted; it runs to its terminal outcome before the join returns.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        self.frame_rate = None;

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("capture loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }

    /// Re-arms the timer at a new rate. The old loop is cancelled and joined
    /// before the new period starts, so no old-period tick can fire afterwards
    /// and no two loops ever run concurrently.
    pub async fn set_frame_rate(
        &mut self,
        controller: Arc<PipelineController>,
        frame_rate: u32,
    ) -> Result<()> {
        self.stop().await?;
        self.start(controller, frame_rate)
    }
}

impl Default for CaptureScheduler {
    fn default() -> Self {
        Self::new()
    }
}

async fn capture_loop(
    controller: Arc<PipelineController>,
    period: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if controller.is_processing().await {
                    debug!("tick skipped: cycle still in flight");
                    continue;
                }
                // Failures are contained inside the cycle; nothing to
                // propagate here.
                if controller.run_cycle().await == CycleOutcome::Failed {
                    debug!("capture cycle ended in failure");
                }
            }
            _ = cancel_token.cancelled() => {
                info!("capture loop shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CaptureFuture, FrameSource, Haptics, NullHaptics};
    use crate::db::Database;
    use crate::models::{Emotion, UserSettings};
    use crate::pipeline::EventBus;
    use crate::remote::{PredictService, PredictionOutcome, ServiceFuture};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct InstrumentedCamera {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        captures: AtomicUsize,
        hold: Duration,
    }

    impl InstrumentedCamera {
        fn new(hold: Duration) -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                captures: AtomicUsize::new(0),
                hold,
            }
        }
    }

    impl FrameSource for InstrumentedCamera {
        fn permission_granted(&self) -> bool {
            true
        }

        fn capture_frame(&self) -> CaptureFuture<'_> {
            Box::pin(async move {
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_in_flight.fetch_max(now, Ordering::SeqCst);
                self.captures.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(self.hold).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(vec![0u8; 8])
            })
        }
    }

    struct InstantService;

    impl PredictService for InstantService {
        fn predict(
            &self,
            _frame: Vec<u8>,
            _user_id: String,
            _timestamp: chrono::DateTime<chrono::Utc>,
        ) -> ServiceFuture<PredictionOutcome> {
            Box::pin(async move {
                Ok(PredictionOutcome {
                    emotion: Emotion::Neutral,
                    confidence: 0.5,
                    all_emotions: HashMap::new(),
                    processing_time_ms: 1.0,
                })
            })
        }
    }

    fn controller_with(camera: Arc<InstrumentedCamera>) -> (TempDir, Arc<PipelineController>) {
        let dir = TempDir::new().expect("temp dir");
        let db = Database::new(dir.path().join("test.sqlite3")).expect("open db");
        let haptics: Arc<dyn Haptics> = Arc::new(NullHaptics);

        let controller = Arc::new(PipelineController::new(
            db,
            Arc::new(InstantService),
            camera,
            haptics,
            EventBus::default(),
            "test-user".to_string(),
            UserSettings::default(),
        ));
        (dir, controller)
    }

    #[tokio::test]
    async fn cycles_never_overlap() {
        // Each capture holds longer than the tick period, so ticks arrive
        // while cycles are in flight and must be dropped, not queued.
        let camera = Arc::new(InstrumentedCamera::new(Duration::from_millis(80)));
        let (_dir, controller) = controller_with(camera.clone());

        let mut scheduler = CaptureScheduler::new();
        scheduler.start(controller, 30).expect("start");

        tokio::time::sleep(Duration::from_millis(400)).await;
        scheduler.stop().await.expect("stop");

        assert_eq!(camera.max_in_flight.load(Ordering::SeqCst), 1);
        assert!(camera.captures.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn no_cycle_starts_after_stop() {
        let camera = Arc::new(InstrumentedCamera::new(Duration::from_millis(1)));
        let (_dir, controller) = controller_with(camera.clone());

        let mut scheduler = CaptureScheduler::new();
        scheduler.start(controller, 20).expect("start");
        tokio::time::sleep(Duration::from_millis(150)).await;
        scheduler.stop().await.expect("stop");

        let after_stop = camera.captures.load(Ordering::SeqCst);
        assert!(after_stop >= 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(camera.captures.load(Ordering::SeqCst), after_stop);
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn out_of_range_rate_is_rejected_before_spawning() {
        let camera = Arc::new(InstrumentedCamera::new(Duration::from_millis(1)));
        let (_dir, controller) = controller_with(camera.clone());

        let mut scheduler = CaptureScheduler::new();
        assert!(scheduler.start(controller.clone(), 0).is_err());
        assert!(scheduler.start(controller.clone(), 4).is_err());
        assert!(scheduler.start(controller, 2000).is_err());
        assert!(!scheduler.is_running());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(camera.captures.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn double_start_is_rejected() {
        let camera = Arc::new(InstrumentedCamera::new(Duration::from_millis(1)));
        let (_dir, controller) = controller_with(camera);

        let mut scheduler = CaptureScheduler::new();
        scheduler.start(controller.clone(), 15).expect("start");
        assert!(scheduler.start(controller, 15).is_err());
        scheduler.stop().await.expect("stop");
    }

    #[tokio::test]
    async fn set_frame_rate_swaps_the_loop_atomically() {
        let camera = Arc::new(InstrumentedCamera::new(Duration::from_millis(1)));
        let (_dir, controller) = controller_with(camera.clone());

        let mut scheduler = CaptureScheduler::new();
        scheduler.start(controller.clone(), 5).expect("start");
        assert_eq!(scheduler.frame_rate(), Some(5));

        scheduler
            .set_frame_rate(controller, 30)
            .await
            .expect("reconfigure");
        assert_eq!(scheduler.frame_rate(), Some(30));
        assert!(scheduler.is_running());

        tokio::time::sleep(Duration::from_millis(200)).await;
        scheduler.stop().await.expect("stop");

        // Only one loop may have been running at a time.
        assert_eq!(camera.max_in_flight.load(Ordering::SeqCst), 1);
    }
}
