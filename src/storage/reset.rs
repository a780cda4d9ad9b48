//! Password reset tokens, stored as SHA-256 digests.

use super::Db;

/// Store a reset token digest, replacing any earlier one for the account.
pub async fn store(
    db: &Db,
    token_hash: &str,
    account_id: &str,
    expires_at: i64,
) -> Result<(), sqlx::Error> {
    let mut tx = db.begin().await?;

    sqlx::query("DELETE FROM password_resets WHERE account_id = ?")
        .bind(account_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("INSERT INTO password_resets (token_hash, account_id, expires_at) VALUES (?, ?, ?)")
        .bind(token_hash)
        .bind(account_id)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

    tx.commit().await
}

/// Atomically remove a token and return its account if it was still valid.
///
/// The row is deleted even when expired, so a token can be presented once.
pub async fn consume(db: &Db, token_hash: &str, now: i64) -> Result<Option<String>, sqlx::Error> {
    let row: Option<(String, i64)> = sqlx::query_as(
        "DELETE FROM password_resets WHERE token_hash = ? RETURNING account_id, expires_at",
    )
    .bind(token_hash)
    .fetch_optional(db)
    .await?;

    Ok(row.and_then(|(account_id, expires_at)| (expires_at > now).then_some(account_id)))
}

/// Delete expired tokens. Returns the number removed.
pub async fn purge_expired(db: &Db, now: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM password_resets WHERE expires_at <= ?")
        .bind(now)
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{account, test_db};

    async fn admin_id(db: &Db) -> String {
        account::seed_admin(db, "admin@example.com", "h", "Admin", "User")
            .await
            .unwrap();
        account::id_for_email(db, "admin@example.com").await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_single_use() {
        let db = test_db().await;
        let id = admin_id(&db).await;

        store(&db, "digest", &id, 2_000).await.unwrap();
        assert_eq!(consume(&db, "digest", 1_000).await.unwrap(), Some(id));
        assert_eq!(consume(&db, "digest", 1_000).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_token_rejected_and_removed() {
        let db = test_db().await;
        let id = admin_id(&db).await;

        store(&db, "digest", &id, 1_000).await.unwrap();
        assert_eq!(consume(&db, "digest", 1_000).await.unwrap(), None);

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM password_resets")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn test_new_request_replaces_old_token() {
        let db = test_db().await;
        let id = admin_id(&db).await;

        store(&db, "first", &id, 2_000).await.unwrap();
        store(&db, "second", &id, 2_000).await.unwrap();
        assert_eq!(consume(&db, "first", 1_000).await.unwrap(), None);
        assert_eq!(consume(&db, "second", 1_000).await.unwrap(), Some(id));
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let db = test_db().await;
        let id = admin_id(&db).await;

        store(&db, "old", &id, 500).await.unwrap();
        assert_eq!(purge_expired(&db, 1_000).await.unwrap(), 1);
        assert_eq!(purge_expired(&db, 1_000).await.unwrap(), 0);
    }
}
