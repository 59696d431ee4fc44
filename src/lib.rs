mod app;
pub mod camera;
mod config;
mod db;
mod errors;
mod export;
mod identity;
pub mod models;
pub mod pipeline;
pub mod remote;

pub use app::{init_logging, EmotionSense};
pub use config::{AppConfig, ConfigStore};
pub use db::Database;
pub use errors::{NetworkError, PipelineError};
pub use export::{import_document, write_export};
pub use identity::{load_or_create_user_id, reset_user_id};
