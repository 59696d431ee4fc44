use std::collections::HashMap;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed label set produced by the inference service, plus the sentinel
/// placeholder used for privacy-mode records that never left the device.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Emotion {
    Happy,
    Sad,
    Angry,
    Disgust,
    Fear,
    Surprise,
    Neutral,
    #[serde(rename = "Processing...")]
    Processing,
}

impl Emotion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Happy => "Happy",
            Emotion::Sad => "Sad",
            Emotion::Angry => "Angry",
            Emotion::Disgust => "Disgust",
            Emotion::Fear => "Fear",
            Emotion::Surprise => "Surprise",
            Emotion::Neutral => "Neutral",
            Emotion::Processing => "Processing...",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "Happy" => Ok(Emotion::Happy),
            "Sad" => Ok(Emotion::Sad),
            "Angry" => Ok(Emotion::Angry),
            "Disgust" => Ok(Emotion::Disgust),
            "Fear" => Ok(Emotion::Fear),
            "Surprise" => Ok(Emotion::Surprise),
            "Neutral" => Ok(Emotion::Neutral),
            "Processing..." => Ok(Emotion::Processing),
            other => Err(anyhow!("unknown emotion label '{other}'")),
        }
    }
}

/// One completed capture cycle, as persisted. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub user_id: String,
    pub emotion: Emotion,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    pub all_emotions: HashMap<String, f64>,
    pub processing_time_ms: f64,
    pub created_at: DateTime<Utc>,
}

impl PredictionRecord {
    /// Locally-synthesized record appended in privacy mode: carries no inferred
    /// content but still consumes a history slot.
    pub fn placeholder(user_id: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: None,
            user_id: user_id.to_string(),
            emotion: Emotion::Processing,
            confidence: 0.0,
            timestamp,
            all_emotions: HashMap::new(),
            processing_time_ms: 0.0,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmotionCount {
    pub emotion: Emotion,
    pub count: u64,
}

/// Aggregate over a lookback window. Derived, never stored.
///
/// `average_confidence` is the mean over emotions of each emotion's average
/// confidence (a mean of means, not a global mean over records), rounded to
/// two decimals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionStats {
    pub total: u64,
    pub by_emotion: Vec<EmotionCount>,
    pub dominant_emotion: Option<Emotion>,
    pub average_confidence: f64,
}

impl EmotionStats {
    pub fn empty() -> Self {
        Self {
            total: 0,
            by_emotion: Vec::new(),
            dominant_emotion: None,
            average_confidence: 0.0,
        }
    }
}

/// Self-describing export document; also the accepted import format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub user_id: String,
    pub export_date: DateTime<Utc>,
    pub total_predictions: u64,
    pub predictions: Vec<PredictionRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emotion_labels_round_trip() {
        for emotion in [
            Emotion::Happy,
            Emotion::Sad,
            Emotion::Angry,
            Emotion::Disgust,
            Emotion::Fear,
            Emotion::Surprise,
            Emotion::Neutral,
            Emotion::Processing,
        ] {
            assert_eq!(Emotion::parse(emotion.as_str()).unwrap(), emotion);
        }
        assert!(Emotion::parse("Bored").is_err());
    }

    #[test]
    fn placeholder_carries_no_inferred_content() {
        let record = PredictionRecord::placeholder("user-1", Utc::now());
        assert_eq!(record.emotion, Emotion::Processing);
        assert_eq!(record.confidence, 0.0);
        assert!(record.all_emotions.is_empty());
        assert_eq!(record.processing_time_ms, 0.0);
    }

    #[test]
    fn sentinel_serializes_with_ellipsis() {
        let json = serde_json::to_string(&Emotion::Processing).unwrap();
        assert_eq!(json, "\"Processing...\"");
    }
}
