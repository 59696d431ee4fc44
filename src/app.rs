use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use tokio::sync::broadcast;
use tokio::sync::Mutex;

use crate::camera::{FrameSource, Haptics};
use crate::config::{AppConfig, ConfigStore};
use crate::db::Database;
use crate::errors::NetworkError;
use crate::export;
use crate::identity;
use crate::models::{EmotionStats, PredictionRecord, UserSettings};
use crate::pipeline::{
    CameraFacing, CaptureScheduler, ConnectivityStatus, EventBus, PipelineController,
    PipelineEvent, PipelineState,
};
use crate::remote::{HealthStatus, PredictionClient};

/// Initializes the `log` facade from the environment. Call once at startup.
pub fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}

/// Top-level assembly: wires the event store, remote client, pipeline
/// controller and capture scheduler, and owns the per-installation identity.
pub struct EmotionSense {
    db: Database,
    config: AppConfig,
    client: PredictionClient,
    controller: Arc<PipelineController>,
    scheduler: Mutex<CaptureScheduler>,
    events: EventBus,
    user_id: String,
    data_dir: PathBuf,
}

impl EmotionSense {
    pub async fn new(
        data_dir: PathBuf,
        frame_source: Arc<dyn FrameSource>,
        haptics: Arc<dyn Haptics>,
    ) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let config = ConfigStore::new(data_dir.join("config.json"))?.config();
        let user_id = identity::load_or_create_user_id(&data_dir.join("user_id"))?;
        let db = Database::new(data_dir.join("emotionsense.sqlite3"))?;
        let settings = db.get_settings(&user_id).await?;

        let client = PredictionClient::new(config.backend_url.clone(), config.api_timeout_ms)?;
        let events = EventBus::default();

        let controller = Arc::new(PipelineController::new(
            db.clone(),
            Arc::new(client.clone()),
            frame_source,
            haptics,
            events.clone(),
            user_id.clone(),
            settings,
        ));

        info!("EmotionSense core ready for user {user_id}");

        Ok(Self {
            db,
            config,
            client,
            controller,
            scheduler: Mutex::new(CaptureScheduler::new()),
            events,
            user_id,
            data_dir,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> PipelineState {
        self.controller.snapshot().await
    }

    pub async fn toggle_camera_facing(&self) -> CameraFacing {
        self.controller.toggle_camera_facing().await
    }

    /// Starts the capture loop at the user's configured frame rate.
    pub async fn start_capture(&self) -> Result<()> {
        let frame_rate = self.controller.current_settings().frame_rate;
        self.scheduler
            .lock()
            .await
            .start(self.controller.clone(), frame_rate)
    }

    /// Stops scheduling new cycles; an in-flight cycle finishes first.
    pub async fn stop_capture(&self) -> Result<()> {
        self.scheduler.lock().await.stop().await
    }

    pub async fn settings(&self) -> Result<UserSettings> {
        self.db.get_settings(&self.user_id).await
    }

    /// Persists new settings, swaps the controller's live handle, and re-arms
    /// the scheduler when the frame rate changed while running.
    pub async fn update_settings(&self, settings: UserSettings) -> Result<UserSettings> {
        let previous_rate = self.controller.current_settings().frame_rate;
        let stored = self.db.upsert_settings(&self.user_id, settings).await?;
        self.controller.apply_settings(stored.clone());

        let mut scheduler = self.scheduler.lock().await;
        if scheduler.is_running() && stored.frame_rate != previous_rate {
            scheduler
                .set_frame_rate(self.controller.clone(), stored.frame_rate)
                .await?;
        }

        Ok(stored)
    }

    pub async fn history(&self, limit: u32) -> Result<Vec<PredictionRecord>> {
        self.db.recent_predictions(&self.user_id, limit).await
    }

    pub async fn stats(&self, window_hours: u32) -> Result<EmotionStats> {
        self.db.emotion_stats(&self.user_id, window_hours).await
    }

    pub async fn total_count(&self) -> Result<u64> {
        self.db.total_count(&self.user_id).await
    }

    pub async fn clear_history(&self) -> Result<()> {
        self.db.clear_predictions(&self.user_id).await?;
        self.controller.clear_recent().await;
        Ok(())
    }

    /// Writes the full history to a timestamped file in `dir` (defaults to
    /// the data directory).
    pub async fn export_history(&self, dir: Option<&Path>) -> Result<PathBuf> {
        let dir = dir.unwrap_or(self.data_dir.as_path());
        export::write_export(&self.db, &self.user_id, dir).await
    }

    pub async fn import_history(&self, data_json: &str) -> Result<u64> {
        export::import_document(&self.db, &self.user_id, data_json).await
    }

    /// Manual retry path for the offline indicator. Liveness and readiness are
    /// distinct probes: a live service that is still loading its model answers
    /// `/health` but not `/health/ready`, and only a ready service counts as
    /// connected.
    pub async fn retry_connection(&self) -> Result<HealthStatus, NetworkError> {
        match self.client.check_health().await {
            Ok(health) => {
                let connectivity = if self.client.check_readiness().await? {
                    ConnectivityStatus::Connected
                } else {
                    ConnectivityStatus::Disconnected
                };
                self.controller.mark_connectivity(connectivity).await;
                Ok(health)
            }
            Err(err) => {
                if err.is_unreachable() {
                    self.controller
                        .mark_connectivity(ConnectivityStatus::Disconnected)
                        .await;
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CaptureFuture, NullHaptics};
    use crate::models::Emotion;
    use std::time::Duration;
    use tempfile::TempDir;

    struct StubCamera;

    impl FrameSource for StubCamera {
        fn permission_granted(&self) -> bool {
            true
        }

        fn capture_frame(&self) -> CaptureFuture<'_> {
            Box::pin(async move { Ok(vec![0u8; 8]) })
        }
    }

    async fn app(dir: &TempDir) -> EmotionSense {
        EmotionSense::new(
            dir.path().to_path_buf(),
            Arc::new(StubCamera),
            Arc::new(NullHaptics),
        )
        .await
        .expect("assemble app")
    }

    #[tokio::test]
    async fn user_id_survives_reassembly() {
        let dir = TempDir::new().unwrap();
        let first = app(&dir).await.user_id().to_string();
        let second = app(&dir).await.user_id().to_string();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn settings_update_round_trips() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir).await;

        let mut settings = app.settings().await.unwrap();
        assert_eq!(settings.frame_rate, 15);

        settings.frame_rate = 25;
        settings.dark_mode = true;
        app.update_settings(settings).await.unwrap();

        let stored = app.settings().await.unwrap();
        assert_eq!(stored.frame_rate, 25);
        assert!(stored.dark_mode);
    }

    #[tokio::test]
    async fn privacy_capture_runs_fully_offline() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir).await;

        let mut settings = app.settings().await.unwrap();
        settings.privacy_mode = true;
        settings.frame_rate = 30;
        app.update_settings(settings).await.unwrap();

        app.start_capture().await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        app.stop_capture().await.unwrap();

        let total = app.total_count().await.unwrap();
        assert!(total >= 1);

        let history = app.history(100).await.unwrap();
        assert!(history
            .iter()
            .all(|record| record.emotion == Emotion::Processing));
    }

    #[tokio::test]
    async fn clear_history_then_stats_is_empty() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir).await;

        let mut settings = app.settings().await.unwrap();
        settings.privacy_mode = true;
        app.update_settings(settings).await.unwrap();

        app.start_capture().await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        app.stop_capture().await.unwrap();
        assert!(app.total_count().await.unwrap() > 0);

        app.clear_history().await.unwrap();
        assert_eq!(app.total_count().await.unwrap(), 0);

        let stats = app.stats(24).await.unwrap();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.dominant_emotion, None);
    }

    #[tokio::test]
    async fn failed_retry_flips_connectivity_to_disconnected() {
        let dir = TempDir::new().unwrap();
        // Port 9 (discard) is not listening; the retry must surface the
        // transport failure and flip the indicator.
        std::fs::write(
            dir.path().join("config.json"),
            r#"{"backendUrl":"http://127.0.0.1:9","apiTimeoutMs":1000}"#,
        )
        .unwrap();
        let app = app(&dir).await;

        let err = app.retry_connection().await.unwrap_err();
        assert!(err.is_unreachable());

        let snapshot = app.snapshot().await;
        assert_eq!(snapshot.connectivity, ConnectivityStatus::Disconnected);
    }

    #[tokio::test]
    async fn export_then_import_preserves_count() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir).await;

        let mut settings = app.settings().await.unwrap();
        settings.privacy_mode = true;
        app.update_settings(settings).await.unwrap();

        app.start_capture().await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        app.stop_capture().await.unwrap();

        let before = app.total_count().await.unwrap();
        assert!(before > 0);

        let path = app.export_history(None).await.unwrap();
        let contents = std::fs::read_to_string(path).unwrap();

        app.clear_history().await.unwrap();
        let imported = app.import_history(&contents).await.unwrap();
        assert_eq!(imported, before);
        assert_eq!(app.total_count().await.unwrap(), before);
    }
}
