use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const FRAME_RATE_MIN: u32 = 5;
pub const FRAME_RATE_MAX: u32 = 30;
pub const UPLOAD_FREQUENCY_MIN_MS: u32 = 500;
pub const UPLOAD_FREQUENCY_MAX_MS: u32 = 5000;

/// Per-user preferences, one row per user id, upsert on write.
///
/// `upload_frequency_ms` is persisted and exposed but the capture cadence is
/// driven solely by `frame_rate`; it stays a reserved setting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub frame_rate: u32,
    pub dark_mode: bool,
    pub privacy_mode: bool,
    pub upload_frequency_ms: u32,
    pub updated_at: DateTime<Utc>,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            frame_rate: 15,
            dark_mode: false,
            privacy_mode: false,
            upload_frequency_ms: 1000,
            updated_at: Utc::now(),
        }
    }
}

impl UserSettings {
    /// Returns a copy with out-of-range values pulled back into their
    /// documented bounds. Applied on every write.
    pub fn clamped(mut self) -> Self {
        self.frame_rate = self.frame_rate.clamp(FRAME_RATE_MIN, FRAME_RATE_MAX);
        self.upload_frequency_ms = self
            .upload_frequency_ms
            .clamp(UPLOAD_FREQUENCY_MIN_MS, UPLOAD_FREQUENCY_MAX_MS);
        self
    }
}
