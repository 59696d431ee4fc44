use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{invalid_data, parse_datetime},
};
use crate::models::UserSettings;

fn row_to_settings(row: &Row) -> Result<UserSettings, rusqlite::Error> {
    let updated_at_str: String = row.get(4)?;

    Ok(UserSettings {
        frame_rate: row.get(0)?,
        dark_mode: row.get(1)?,
        privacy_mode: row.get(2)?,
        upload_frequency_ms: row.get(3)?,
        updated_at: parse_datetime(&updated_at_str, "updated_at").map_err(invalid_data)?,
    })
}

impl Database {
    /// Settings for the user, or the documented defaults when no row exists.
    /// A missing row is not an error.
    pub async fn get_settings(&self, user_id: &str) -> Result<UserSettings> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT frame_rate, dark_mode, privacy_mode, upload_frequency_ms, updated_at
                 FROM user_settings
                 WHERE user_id = ?1",
            )?;

            let settings = stmt
                .query_row(params![user_id], row_to_settings)
                .optional()?;

            Ok(settings.unwrap_or_default())
        })
        .await
    }

    /// Latest write wins; values are clamped into their documented ranges and
    /// `updated_at` is bumped to now. Returns the stored settings.
    pub async fn upsert_settings(
        &self,
        user_id: &str,
        settings: UserSettings,
    ) -> Result<UserSettings> {
        let mut settings = settings.clamped();
        settings.updated_at = Utc::now();

        let user_id = user_id.to_string();
        let stored = settings.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO user_settings (
                    user_id, frame_rate, dark_mode, privacy_mode, upload_frequency_ms, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(user_id) DO UPDATE SET
                    frame_rate = excluded.frame_rate,
                    dark_mode = excluded.dark_mode,
                    privacy_mode = excluded.privacy_mode,
                    upload_frequency_ms = excluded.upload_frequency_ms,
                    updated_at = excluded.updated_at",
                params![
                    user_id,
                    settings.frame_rate,
                    settings.dark_mode,
                    settings.privacy_mode,
                    settings.upload_frequency_ms,
                    settings.updated_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to upsert user settings")?;
            Ok(())
        })
        .await?;

        Ok(stored)
    }
}
