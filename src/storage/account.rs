//! Credential store: account lookups and updates.

use super::Db;
use crate::models::{Account, AccountKind, ProfessorKind, ProfessorProfile};
use chrono::{DateTime, Utc};

/// Raw account row with its role columns.
#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: String,
    name: String,
    surname: String,
    email: String,
    password_hash: String,
    phone: Option<String>,
    photo: Option<String>,
    created_at: DateTime<Utc>,
    is_admin: bool,
    professor_kind: Option<String>,
}

const SELECT_ACCOUNT: &str = "SELECT a.id, a.name, a.surname, a.email, a.password_hash, \
     a.phone, a.photo, a.created_at, \
     EXISTS (SELECT 1 FROM admins ad WHERE ad.account_id = a.id) AS is_admin, \
     p.kind AS professor_kind \
     FROM accounts a LEFT JOIN professors p ON p.account_id = a.id";

/// Profile fields editable from the settings page.
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub name: String,
    pub surname: String,
    pub email: String,
    pub phone: String,
    pub photo: Option<String>,
}

async fn load(db: &Db, row: AccountRow) -> Result<Account, sqlx::Error> {
    let kind = match (row.is_admin, row.professor_kind) {
        (true, None) => AccountKind::Admin,
        (false, Some(kind)) => {
            let kind = kind
                .parse::<ProfessorKind>()
                .map_err(|e| sqlx::Error::Decode(e.into()))?;
            let subjects = super::professor::subjects_of(db, &row.id).await?;
            AccountKind::Professor(ProfessorProfile { kind, subjects })
        }
        (true, Some(_)) => {
            return Err(sqlx::Error::Decode(
                format!("account {} is both admin and professor", row.id).into(),
            ))
        }
        (false, None) => {
            return Err(sqlx::Error::Decode(
                format!("account {} has no role", row.id).into(),
            ))
        }
    };

    Ok(Account {
        id: row.id,
        name: row.name,
        surname: row.surname,
        email: row.email,
        password_hash: row.password_hash,
        phone: row.phone,
        photo: row.photo,
        kind,
        created_at: row.created_at,
    })
}

/// Look up an account by e-mail.
pub async fn find_by_email(db: &Db, email: &str) -> Result<Option<Account>, sqlx::Error> {
    let row = sqlx::query_as::<_, AccountRow>(&format!("{} WHERE a.email = ?", SELECT_ACCOUNT))
        .bind(email)
        .fetch_optional(db)
        .await?;

    match row {
        Some(row) => Ok(Some(load(db, row).await?)),
        None => Ok(None),
    }
}

/// Look up an account by id.
pub async fn find_by_id(db: &Db, id: &str) -> Result<Option<Account>, sqlx::Error> {
    let row = sqlx::query_as::<_, AccountRow>(&format!("{} WHERE a.id = ?", SELECT_ACCOUNT))
        .bind(id)
        .fetch_optional(db)
        .await?;

    match row {
        Some(row) => Ok(Some(load(db, row).await?)),
        None => Ok(None),
    }
}

/// Id of the account owning `email`, if any.
pub async fn id_for_email(db: &Db, email: &str) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT id FROM accounts WHERE email = ?")
        .bind(email)
        .fetch_optional(db)
        .await
}

/// Replace the password hash. Returns false if the account doesn't exist.
pub async fn update_password(db: &Db, id: &str, password_hash: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE accounts SET password_hash = ? WHERE id = ?")
        .bind(password_hash)
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Update profile fields. Returns false if the account doesn't exist.
pub async fn update_profile(db: &Db, id: &str, update: &ProfileUpdate) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE accounts SET name = ?, surname = ?, email = ?, phone = ?, photo = ? WHERE id = ?",
    )
    .bind(&update.name)
    .bind(&update.surname)
    .bind(&update.email)
    .bind(&update.phone)
    .bind(&update.photo)
    .bind(id)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Every photo URL still referenced by an account.
pub async fn photo_urls(db: &Db) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT photo FROM accounts WHERE photo IS NOT NULL")
        .fetch_all(db)
        .await
}

/// Delete an account and, by cascade, its role rows.
///
/// Returns true if the account was deleted, false if it didn't exist.
pub async fn delete(db: &Db, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM accounts WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Insert the administrator account unless the e-mail is already registered.
///
/// An existing account keeps its current password so a changed admin
/// password survives restarts. Returns true if an account was created.
pub async fn seed_admin(
    db: &Db,
    email: &str,
    password_hash: &str,
    name: &str,
    surname: &str,
) -> Result<bool, sqlx::Error> {
    if let Some(existing) = find_by_email(db, email).await? {
        if existing.kind != AccountKind::Admin {
            tracing::warn!(
                email = %email,
                "Configured admin e-mail belongs to a professor account; not seeding"
            );
        }
        return Ok(false);
    }

    let id = nanoid::nanoid!(12);
    let mut tx = db.begin().await?;

    sqlx::query(
        "INSERT INTO accounts (id, name, surname, email, password_hash, phone, photo, created_at) \
         VALUES (?, ?, ?, ?, ?, NULL, NULL, ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(surname)
    .bind(email)
    .bind(password_hash)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO admins (account_id) VALUES (?)")
        .bind(&id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(true)
}
