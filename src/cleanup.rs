//! Background cleanup job.
//!
//! Expired rows are never read back as valid (the denylist only has to
//! outlive the token, reset tokens are checked against their expiry), so
//! this job only keeps the tables small. It also removes picture files that
//! no account references any more, e.g. after a failed request.

use crate::storage::{self, blob, Db};
use chrono::Utc;
use std::collections::HashSet;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tokio::fs;

/// Files younger than this are left alone so an upload whose database
/// write is still in flight is not mistaken for an orphan.
const ORPHAN_GRACE: Duration = Duration::from_secs(3600);

/// Run the cleanup loop.
///
/// Runs one pass every `interval`. Failures are logged and the loop goes on.
pub async fn run_cleanup_loop(db: Db, upload_dir: &Path, interval: Duration) {
    let upload_dir = upload_dir.to_path_buf();

    loop {
        tokio::time::sleep(interval).await;

        if let Err(e) = purge_expired_rows(&db).await {
            tracing::error!(error = %e, "Cleanup job failed");
        }
        if let Err(e) = cleanup_orphaned_photos(&db, &upload_dir, ORPHAN_GRACE).await {
            tracing::error!(error = %e, "Photo cleanup failed");
        }
    }
}

/// Delete expired denylist entries and reset tokens.
pub async fn purge_expired_rows(db: &Db) -> Result<(), CleanupError> {
    let now = Utc::now().timestamp();
    let revoked = storage::revocation::purge_expired(db, now).await?;
    let resets = storage::reset::purge_expired(db, now).await?;

    if revoked + resets > 0 {
        tracing::info!(
            revoked_tokens = revoked,
            reset_tokens = resets,
            "Cleanup job completed"
        );
    }

    Ok(())
}

/// Delete picture files older than `grace` that no account points to.
async fn cleanup_orphaned_photos(
    db: &Db,
    upload_dir: &Path,
    grace: Duration,
) -> Result<(), CleanupError> {
    let referenced: HashSet<String> = storage::account::photo_urls(db)
        .await?
        .into_iter()
        .collect();

    let dir = blob::pictures_dir(upload_dir);
    let mut entries = match fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    let mut deleted_count = 0;
    let mut checked_count = 0;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }

        let file_name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };

        checked_count += 1;

        let age = metadata
            .modified()
            .ok()
            .and_then(|m| SystemTime::now().duration_since(m).ok())
            .unwrap_or_default();
        if age < grace {
            continue;
        }

        // Leftover temp files from an interrupted write are orphans too
        let url = format!("{}{}", blob::PHOTO_URL_PREFIX, file_name);
        if referenced.contains(&url) {
            continue;
        }

        if let Err(e) = fs::remove_file(&path).await {
            tracing::warn!(file = %file_name, error = %e, "Failed to delete orphaned photo");
        } else {
            deleted_count += 1;
        }
    }

    if deleted_count > 0 {
        tracing::info!(
            deleted = deleted_count,
            checked = checked_count,
            "Photo cleanup completed"
        );
    }

    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum CleanupError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
