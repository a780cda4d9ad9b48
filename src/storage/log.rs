//! Append-only audit log.

use super::Db;
use crate::models::{AuditAction, StoredLogEntry};
use chrono::Utc;

/// Append one entry. `account_id` is `None` for anonymous events.
pub async fn append(
    db: &Db,
    account_id: Option<&str>,
    action: AuditAction,
    details: &str,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO audit_logs (account_id, action, details, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(account_id)
    .bind(action.as_str())
    .bind(details)
    .bind(Utc::now())
    .execute(db)
    .await?;

    Ok(result.last_insert_rowid())
}

/// All entries, newest first.
pub async fn list(db: &Db) -> Result<Vec<StoredLogEntry>, sqlx::Error> {
    sqlx::query_as::<_, StoredLogEntry>(
        "SELECT l.id, l.account_id, a.name AS account_name, a.surname AS account_surname, \
         l.action, l.details, l.created_at \
         FROM audit_logs l LEFT JOIN accounts a ON a.id = l.account_id \
         ORDER BY l.id DESC",
    )
    .fetch_all(db)
    .await
}
