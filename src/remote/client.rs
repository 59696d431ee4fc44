use std::time::Duration;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use reqwest::Client;

use crate::errors::NetworkError;

use super::types::{HealthStatus, PredictRequest, PredictResponse, PredictionOutcome};
use super::{PredictService, ServiceFuture};

/// HTTP boundary to the inference service. Holds no state beyond the base URL
/// and configured timeout, so one instance can be shared across concurrent
/// calls. Never retries; retry policy belongs to the caller.
#[derive(Clone)]
pub struct PredictionClient {
    client: Client,
    base_url: String,
    timeout_ms: u64,
}

impl PredictionClient {
    pub fn new(base_url: impl Into<String>, timeout_ms: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            timeout_ms,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Posts one frame and suspends until the response or the configured
    /// timeout.
    pub async fn predict(
        &self,
        frame: &[u8],
        user_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<PredictionOutcome, NetworkError> {
        let url = format!("{}/predict", self.base_url);
        let request = PredictRequest {
            frame: BASE64.encode(frame),
            user_id: Some(user_id.to_string()),
            timestamp: timestamp.to_rfc3339(),
        };

        debug!("Sending predict request ({} byte frame)", frame.len());

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|err| self.transport_error(err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NetworkError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let wire: PredictResponse = response
            .json()
            .await
            .map_err(|err| NetworkError::MalformedResponse(err.to_string()))?;

        let outcome = PredictionOutcome::try_from(wire)?;
        debug!(
            "Prediction {} ({:.2}) in {}ms",
            outcome.emotion.as_str(),
            outcome.confidence,
            outcome.processing_time_ms
        );
        Ok(outcome)
    }

    /// Liveness probe; same failure semantics as `predict`.
    pub async fn check_health(&self) -> Result<HealthStatus, NetworkError> {
        let url = format!("{}/health", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| self.transport_error(err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Health check failed with status {status}");
            return Err(NetworkError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|err| NetworkError::MalformedResponse(err.to_string()))
    }

    /// Readiness probe: the service answers 200 when ready, 503 while warming
    /// up. Only transport failures are errors.
    pub async fn check_readiness(&self) -> Result<bool, NetworkError> {
        let url = format!("{}/health/ready", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| self.transport_error(err))?;

        Ok(response.status().is_success())
    }

    fn transport_error(&self, err: reqwest::Error) -> NetworkError {
        if err.is_timeout() {
            NetworkError::Timeout(self.timeout_ms)
        } else {
            NetworkError::Unreachable(err.to_string())
        }
    }
}

impl PredictService for PredictionClient {
    fn predict(
        &self,
        frame: Vec<u8>,
        user_id: String,
        timestamp: DateTime<Utc>,
    ) -> ServiceFuture<PredictionOutcome> {
        let client = self.clone();
        Box::pin(async move { client.predict(&frame, &user_id, timestamp).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_keeps_configured_base_url() {
        let client = PredictionClient::new("http://localhost:8000", 10_000).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
    }

    #[tokio::test]
    async fn unreachable_endpoint_maps_to_transport_error() {
        // Port 9 (discard) is not listening; the connect error must classify
        // as unreachable, not as a protocol failure.
        let client = PredictionClient::new("http://127.0.0.1:9", 1_000).unwrap();
        let err = client
            .predict(b"frame", "u1", Utc::now())
            .await
            .unwrap_err();
        assert!(err.is_unreachable());
    }
}
