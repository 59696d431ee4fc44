mod client;
mod types;

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};

use crate::errors::NetworkError;

pub use client::PredictionClient;
pub use types::{HealthStatus, PredictRequest, PredictResponse, PredictionOutcome};

pub type ServiceFuture<T> = Pin<Box<dyn Future<Output = Result<T, NetworkError>> + Send>>;

/// Seam between the pipeline controller and the inference endpoint, so cycle
/// logic can be exercised against a scripted service in tests.
pub trait PredictService: Send + Sync {
    fn predict(
        &self,
        frame: Vec<u8>,
        user_id: String,
        timestamp: DateTime<Utc>,
    ) -> ServiceFuture<PredictionOutcome>;
}
