use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::NetworkError;
use crate::models::Emotion;

/// Body for `POST /predict`. The frame travels base64-encoded.
#[derive(Debug, Clone, Serialize)]
pub struct PredictRequest {
    pub frame: String,
    pub user_id: Option<String>,
    pub timestamp: String,
}

/// Raw wire response from `POST /predict`.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictResponse {
    pub emotion: String,
    pub confidence: f64,
    #[serde(default)]
    pub all_emotions: HashMap<String, f64>,
    pub processing_time_ms: f64,
}

/// Validated inference result handed to the pipeline.
#[derive(Debug, Clone)]
pub struct PredictionOutcome {
    pub emotion: Emotion,
    pub confidence: f64,
    pub all_emotions: HashMap<String, f64>,
    pub processing_time_ms: f64,
}

impl TryFrom<PredictResponse> for PredictionOutcome {
    type Error = NetworkError;

    fn try_from(response: PredictResponse) -> Result<Self, Self::Error> {
        let emotion = Emotion::parse(&response.emotion)
            .map_err(|err| NetworkError::MalformedResponse(err.to_string()))?;

        if !(0.0..=1.0).contains(&response.confidence) {
            return Err(NetworkError::MalformedResponse(format!(
                "confidence {} outside [0, 1]",
                response.confidence
            )));
        }
        if response.processing_time_ms < 0.0 {
            return Err(NetworkError::MalformedResponse(format!(
                "negative processing_time_ms {}",
                response.processing_time_ms
            )));
        }

        Ok(Self {
            emotion,
            confidence: response.confidence,
            all_emotions: response.all_emotions,
            processing_time_ms: response.processing_time_ms,
        })
    }
}

/// Payload of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub model_loaded: bool,
    pub version: String,
    pub device: String,
}
