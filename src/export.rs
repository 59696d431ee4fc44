use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use log::info;

use crate::db::Database;
use crate::models::ExportDocument;

/// Serializes the user's entire history into a self-describing, pretty-printed
/// JSON file named with the owning user id and the export instant. No record
/// cap — distinct from the interactive 100-entry `recent` view.
pub async fn write_export(db: &Database, user_id: &str, dir: &Path) -> Result<PathBuf> {
    let predictions = db.export_predictions(user_id).await?;
    let export_date = Utc::now();

    let document = ExportDocument {
        user_id: user_id.to_string(),
        export_date,
        total_predictions: predictions.len() as u64,
        predictions,
    };

    let file_name = format!(
        "emotionsense_export_{}_{}.json",
        user_id,
        export_date.format("%Y%m%dT%H%M%S")
    );
    let path = dir.join(file_name);

    let serialized = serde_json::to_string_pretty(&document)?;
    std::fs::write(&path, serialized)
        .with_context(|| format!("Failed to write export to {}", path.display()))?;

    info!(
        "Exported {} predictions for user {} to {}",
        document.total_predictions,
        user_id,
        path.display()
    );
    Ok(path)
}

/// Parses an export document and appends its records for the user. Returns the
/// number of records imported.
pub async fn import_document(db: &Database, user_id: &str, data_json: &str) -> Result<u64> {
    let document: ExportDocument =
        serde_json::from_str(data_json).context("invalid export document")?;
    db.import_predictions(user_id, document.predictions).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Emotion, PredictionRecord};
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn record(user_id: &str, emotion: Emotion, confidence: f64) -> PredictionRecord {
        PredictionRecord {
            id: None,
            user_id: user_id.to_string(),
            emotion,
            confidence,
            timestamp: Utc::now(),
            all_emotions: HashMap::new(),
            processing_time_ms: 33.0,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn export_file_round_trips_through_import() {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path().join("test.sqlite3")).unwrap();

        for _ in 0..3 {
            db.insert_prediction(&record("u1", Emotion::Neutral, 0.6))
                .await
                .unwrap();
        }

        let path = write_export(&db, "u1", dir.path()).await.unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("emotionsense_export_u1_"));
        assert!(name.ends_with(".json"));

        let contents = std::fs::read_to_string(&path).unwrap();
        let imported = import_document(&db, "u2", &contents).await.unwrap();
        assert_eq!(imported, 3);
        assert_eq!(db.total_count("u2").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn import_rejects_invalid_json() {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path().join("test.sqlite3")).unwrap();
        assert!(import_document(&db, "u1", "not json").await.is_err());
    }
}
