use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use rusqlite::{params, Row};
use serde_json::{from_str, to_string};

use crate::db::{
    connection::Database,
    helpers::{invalid_data, parse_datetime, to_u64},
};
use crate::models::{Emotion, EmotionCount, EmotionStats, PredictionRecord};

fn row_to_record(row: &Row) -> Result<PredictionRecord, rusqlite::Error> {
    let id: Option<i64> = row.get(0)?;
    let user_id: String = row.get(1)?;
    let emotion_str: String = row.get(2)?;
    let confidence: f64 = row.get(3)?;
    let timestamp_str: String = row.get(4)?;
    let all_emotions_json: String = row.get(5)?;
    let processing_time_ms: f64 = row.get(6)?;
    let created_at_str: String = row.get(7)?;

    let emotion = Emotion::parse(&emotion_str).map_err(invalid_data)?;
    let timestamp = parse_datetime(&timestamp_str, "timestamp").map_err(invalid_data)?;
    let created_at = parse_datetime(&created_at_str, "created_at").map_err(invalid_data)?;
    let all_emotions: HashMap<String, f64> = from_str(&all_emotions_json)
        .map_err(|err| invalid_data(anyhow::Error::new(err).context("all_emotions_json")))?;

    Ok(PredictionRecord {
        id,
        user_id,
        emotion,
        confidence,
        timestamp,
        all_emotions,
        processing_time_ms,
        created_at,
    })
}

const SELECT_COLUMNS: &str = "id, user_id, emotion, confidence, timestamp, \
     all_emotions_json, processing_time_ms, created_at";

impl Database {
    /// Appends one prediction record. Append-only: persisted rows are never
    /// updated. Rejects out-of-range values before touching the store.
    pub async fn insert_prediction(&self, record: &PredictionRecord) -> Result<()> {
        if !(0.0..=1.0).contains(&record.confidence) {
            bail!(
                "confidence {} outside [0, 1] for user {}",
                record.confidence,
                record.user_id
            );
        }
        if record.processing_time_ms < 0.0 {
            bail!("negative processing_time_ms {}", record.processing_time_ms);
        }

        let record = record.clone();
        self.execute(move |conn| {
            let all_emotions_json =
                to_string(&record.all_emotions).context("failed to serialize all_emotions")?;

            conn.execute(
                "INSERT INTO predictions (
                    user_id,
                    emotion,
                    confidence,
                    timestamp,
                    all_emotions_json,
                    processing_time_ms,
                    created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.user_id,
                    record.emotion.as_str(),
                    record.confidence,
                    record.timestamp.to_rfc3339(),
                    all_emotions_json,
                    record.processing_time_ms,
                    record.created_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to insert prediction record")?;
            Ok(())
        })
        .await
    }

    /// Up to `limit` records, newest first. An empty result is `Ok(vec![])`,
    /// distinct from an I/O error.
    pub async fn recent_predictions(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<PredictionRecord>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS}
                 FROM predictions
                 WHERE user_id = ?1
                 ORDER BY timestamp DESC, id DESC
                 LIMIT ?2",
            ))?;

            let records = stmt
                .query_map(params![user_id, limit], row_to_record)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(records)
        })
        .await
    }

    /// Aggregates records with `timestamp > now - window_hours`.
    ///
    /// Grouping walks records in chronological order, so equal counts keep
    /// first-observed order after the stable count sort.
    pub async fn emotion_stats(&self, user_id: &str, window_hours: u32) -> Result<EmotionStats> {
        let user_id = user_id.to_string();
        let cutoff = Utc::now() - Duration::hours(i64::from(window_hours));

        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT emotion, confidence
                 FROM predictions
                 WHERE user_id = ?1 AND timestamp > ?2
                 ORDER BY timestamp ASC, id ASC",
            )?;

            struct Group {
                emotion: Emotion,
                count: u64,
                confidence_sum: f64,
            }

            let mut groups: Vec<Group> = Vec::new();
            let mut total: u64 = 0;

            let mut rows = stmt.query(params![user_id, cutoff.to_rfc3339()])?;
            while let Some(row) = rows.next()? {
                let emotion = Emotion::parse(&row.get::<_, String>(0)?).map_err(invalid_data)?;
                let confidence: f64 = row.get(1)?;

                match groups.iter_mut().find(|group| group.emotion == emotion) {
                    Some(group) => {
                        group.count += 1;
                        group.confidence_sum += confidence;
                    }
                    None => groups.push(Group {
                        emotion,
                        count: 1,
                        confidence_sum: confidence,
                    }),
                }
                total += 1;
            }

            if total == 0 {
                return Ok(EmotionStats::empty());
            }

            // Mean of per-emotion averages, not a global mean over records.
            let average_confidence = groups
                .iter()
                .map(|group| group.confidence_sum / group.count as f64)
                .sum::<f64>()
                / groups.len() as f64;
            let average_confidence = (average_confidence * 100.0).round() / 100.0;

            groups.sort_by(|a, b| b.count.cmp(&a.count));

            let by_emotion: Vec<EmotionCount> = groups
                .iter()
                .map(|group| EmotionCount {
                    emotion: group.emotion,
                    count: group.count,
                })
                .collect();

            Ok(EmotionStats {
                total,
                dominant_emotion: by_emotion.first().map(|entry| entry.emotion),
                by_emotion,
                average_confidence,
            })
        })
        .await
    }

    /// Deletes every record for the user. Idempotent.
    pub async fn clear_predictions(&self, user_id: &str) -> Result<()> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            conn.execute("DELETE FROM predictions WHERE user_id = ?1", params![user_id])
                .with_context(|| "failed to clear prediction history")?;
            Ok(())
        })
        .await
    }

    pub async fn total_count(&self, user_id: &str) -> Result<u64> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(1) FROM predictions WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )?;
            to_u64(count, "COUNT(1)")
        })
        .await
    }

    /// Every record for the user in chronological order, no cap (unlike the
    /// interactive `recent_predictions` limit).
    pub async fn export_predictions(&self, user_id: &str) -> Result<Vec<PredictionRecord>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS}
                 FROM predictions
                 WHERE user_id = ?1
                 ORDER BY timestamp ASC, id ASC",
            ))?;

            let records = stmt
                .query_map(params![user_id], row_to_record)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(records)
        })
        .await
    }

    /// Appends previously exported records inside one transaction: either all
    /// rows land or none do. Returns the number imported.
    pub async fn import_predictions(
        &self,
        user_id: &str,
        records: Vec<PredictionRecord>,
    ) -> Result<u64> {
        for record in &records {
            if !(0.0..=1.0).contains(&record.confidence) {
                bail!("import contains confidence {} outside [0, 1]", record.confidence);
            }
            if record.processing_time_ms < 0.0 {
                bail!(
                    "import contains negative processing_time_ms {}",
                    record.processing_time_ms
                );
            }
        }

        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let tx = conn
                .transaction()
                .context("failed to open import transaction")?;

            for record in &records {
                let all_emotions_json = to_string(&record.all_emotions)
                    .context("failed to serialize all_emotions")?;
                tx.execute(
                    "INSERT INTO predictions (
                        user_id,
                        emotion,
                        confidence,
                        timestamp,
                        all_emotions_json,
                        processing_time_ms,
                        created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        user_id,
                        record.emotion.as_str(),
                        record.confidence,
                        record.timestamp.to_rfc3339(),
                        all_emotions_json,
                        record.processing_time_ms,
                        record.created_at.to_rfc3339(),
                    ],
                )?;
            }

            tx.commit().context("failed to commit import")?;
            Ok(records.len() as u64)
        })
        .await
    }
}
