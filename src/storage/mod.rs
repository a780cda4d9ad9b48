//! Relational storage layer (sqlx over SQLite).
//!
//! Accounts, professors, subjects, the audit log, reset tokens and the
//! token denylist all live in one database. The schema is bootstrapped
//! with `CREATE TABLE IF NOT EXISTS` on startup.

pub mod account;
pub mod blob;
pub mod log;
pub mod professor;
pub mod reset;
pub mod revocation;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

pub type Db = sqlx::SqlitePool;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS accounts (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        surname TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        phone TEXT,
        photo TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS admins (
        account_id TEXT PRIMARY KEY REFERENCES accounts(id) ON DELETE CASCADE
    )",
    "CREATE TABLE IF NOT EXISTS professors (
        account_id TEXT PRIMARY KEY REFERENCES accounts(id) ON DELETE CASCADE,
        kind TEXT NOT NULL CHECK (kind IN ('permanent', 'vacataire'))
    )",
    "CREATE TABLE IF NOT EXISTS subjects (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS professor_subjects (
        professor_id TEXT NOT NULL REFERENCES professors(account_id) ON DELETE CASCADE,
        subject_id INTEGER NOT NULL REFERENCES subjects(id) ON DELETE CASCADE,
        PRIMARY KEY (professor_id, subject_id)
    )",
    "CREATE TABLE IF NOT EXISTS audit_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        account_id TEXT REFERENCES accounts(id) ON DELETE SET NULL,
        action TEXT NOT NULL,
        details TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_audit_logs_created_at ON audit_logs (created_at)",
    "CREATE TABLE IF NOT EXISTS password_resets (
        token_hash TEXT PRIMARY KEY,
        account_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
        expires_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS revoked_tokens (
        jti TEXT PRIMARY KEY,
        expires_at INTEGER NOT NULL
    )",
];

/// Open a connection pool.
///
/// In-memory databases exist per connection, so they get a single
/// connection that is never recycled.
pub async fn connect(url: &str) -> Result<Db, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let in_memory = url.contains(":memory:") || url.contains("mode=memory");
    let pool = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(5)
    };

    pool.connect_with(options).await
}

/// Create tables and indexes that do not exist yet.
pub async fn init_schema(db: &Db) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(db).await?;
    }
    Ok(())
}

/// Whether an error is a UNIQUE constraint violation (duplicate e-mail).
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|e| e.is_unique_violation())
        .unwrap_or(false)
}

#[cfg(test)]
pub(crate) async fn test_db() -> Db {
    let db = connect("sqlite::memory:").await.unwrap();
    init_schema(&db).await.unwrap();
    db
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let db = test_db().await;
        init_schema(&db).await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&db)
        .await
        .unwrap();
        assert_eq!(
            tables,
            vec![
                "accounts",
                "admins",
                "audit_logs",
                "password_resets",
                "professor_subjects",
                "professors",
                "revoked_tokens",
                "subjects"
            ]
        );
    }

    #[tokio::test]
    async fn test_unique_violation_detected() {
        let db = test_db().await;
        let insert = "INSERT INTO subjects (name) VALUES ('Maths')";
        sqlx::query(insert).execute(&db).await.unwrap();
        let err = sqlx::query(insert).execute(&db).await.unwrap_err();
        assert!(is_unique_violation(&err));
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }
}
