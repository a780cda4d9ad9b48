//! Denylist of session tokens revoked at logout, keyed by `jti`.
//!
//! Rows only need to outlive the token itself; the cleanup task purges
//! them after `expires_at`.

use super::Db;

pub async fn revoke(db: &Db, jti: &str, expires_at: i64) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO revoked_tokens (jti, expires_at) VALUES (?, ?)")
        .bind(jti)
        .bind(expires_at)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn is_revoked(db: &Db, jti: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM revoked_tokens WHERE jti = ?)")
        .bind(jti)
        .fetch_one(db)
        .await
}

/// Delete entries whose token has expired anyway. Returns the number removed.
pub async fn purge_expired(db: &Db, now: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at <= ?")
        .bind(now)
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_db;

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let db = test_db().await;
        assert!(!is_revoked(&db, "jti-1").await.unwrap());

        revoke(&db, "jti-1", 2_000).await.unwrap();
        revoke(&db, "jti-1", 2_000).await.unwrap();

        assert!(is_revoked(&db, "jti-1").await.unwrap());
        assert!(!is_revoked(&db, "jti-2").await.unwrap());
    }

    #[tokio::test]
    async fn test_purge() {
        let db = test_db().await;
        revoke(&db, "old", 500).await.unwrap();
        revoke(&db, "live", 5_000).await.unwrap();

        assert_eq!(purge_expired(&db, 1_000).await.unwrap(), 1);
        assert!(!is_revoked(&db, "old").await.unwrap());
        assert!(is_revoked(&db, "live").await.unwrap());
    }
}
