mod prediction;
mod settings;

pub use prediction::{Emotion, EmotionCount, EmotionStats, ExportDocument, PredictionRecord};
pub use settings::{UserSettings, FRAME_RATE_MAX, FRAME_RATE_MIN};
