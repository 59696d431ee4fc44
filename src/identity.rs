use std::{fs, path::Path};

use anyhow::{Context, Result};
use log::info;
use uuid::Uuid;

/// Loads the per-installation user id, generating and persisting one on first
/// run. The id stays stable for the lifetime of the installation unless
/// explicitly reset.
pub fn load_or_create_user_id(path: &Path) -> Result<String> {
    if path.exists() {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read user id from {}", path.display()))?;
        let trimmed = contents.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }

    let user_id = Uuid::new_v4().to_string();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(path, &user_id)
        .with_context(|| format!("Failed to write user id to {}", path.display()))?;

    info!("Generated new installation user id");
    Ok(user_id)
}

/// Explicit reset: discards the stored id so the next load generates a fresh
/// one.
pub fn reset_user_id(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path)
            .with_context(|| format!("Failed to remove user id at {}", path.display()))?;
    }
    Ok(())
}
