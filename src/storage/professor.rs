//! Professor records, their subjects and dashboard statistics.

use super::Db;
use crate::models::{MonthCount, ProfessorInfo, ProfessorInput, ProfessorKind, ProfessorStats};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use sqlx::{Sqlite, Transaction};
use std::collections::HashMap;

/// Number of months covered by the creation trend.
pub const TREND_MONTHS: u32 = 6;

#[derive(Debug, sqlx::FromRow)]
struct ProfessorRow {
    id: String,
    name: String,
    surname: String,
    email: String,
    phone: Option<String>,
    photo: Option<String>,
    kind: String,
}

const SELECT_PROFESSOR: &str = "SELECT a.id, a.name, a.surname, a.email, a.phone, a.photo, p.kind \
     FROM professors p JOIN accounts a ON a.id = p.account_id";

fn into_info(row: ProfessorRow, subjects: Vec<String>) -> Result<ProfessorInfo, sqlx::Error> {
    let kind = row
        .kind
        .parse::<ProfessorKind>()
        .map_err(|e| sqlx::Error::Decode(e.into()))?;
    Ok(ProfessorInfo {
        id: row.id,
        name: row.name,
        surname: row.surname,
        email: row.email,
        phone: row.phone,
        kind,
        subjects,
        photo: row.photo,
    })
}

/// Subject names taught by one professor, alphabetical.
pub async fn subjects_of(db: &Db, professor_id: &str) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT s.name FROM professor_subjects ps JOIN subjects s ON s.id = ps.subject_id \
         WHERE ps.professor_id = ? ORDER BY s.name",
    )
    .bind(professor_id)
    .fetch_all(db)
    .await
}

/// All professors with their subjects.
pub async fn list(db: &Db) -> Result<Vec<ProfessorInfo>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ProfessorRow>(&format!(
        "{} ORDER BY a.created_at, a.id",
        SELECT_PROFESSOR
    ))
    .fetch_all(db)
    .await?;

    let pairs = sqlx::query_as::<_, (String, String)>(
        "SELECT ps.professor_id, s.name FROM professor_subjects ps \
         JOIN subjects s ON s.id = ps.subject_id ORDER BY s.name",
    )
    .fetch_all(db)
    .await?;

    let mut subjects: HashMap<String, Vec<String>> = HashMap::new();
    for (professor_id, name) in pairs {
        subjects.entry(professor_id).or_default().push(name);
    }

    rows.into_iter()
        .map(|row| {
            let taught = subjects.remove(&row.id).unwrap_or_default();
            into_info(row, taught)
        })
        .collect()
}

/// One professor. `None` if the id is unknown or belongs to an admin.
pub async fn get(db: &Db, id: &str) -> Result<Option<ProfessorInfo>, sqlx::Error> {
    let row = sqlx::query_as::<_, ProfessorRow>(&format!("{} WHERE a.id = ?", SELECT_PROFESSOR))
        .bind(id)
        .fetch_optional(db)
        .await?;

    match row {
        Some(row) => {
            let subjects = subjects_of(db, &row.id).await?;
            Ok(Some(into_info(row, subjects)?))
        }
        None => Ok(None),
    }
}

/// Link subjects to a professor, creating unknown subjects on the way.
async fn attach_subjects(
    tx: &mut Transaction<'_, Sqlite>,
    professor_id: &str,
    subjects: &[String],
) -> Result<(), sqlx::Error> {
    for name in subjects {
        sqlx::query("INSERT INTO subjects (name) VALUES (?) ON CONFLICT (name) DO NOTHING")
            .bind(name)
            .execute(&mut **tx)
            .await?;

        let subject_id: i64 = sqlx::query_scalar("SELECT id FROM subjects WHERE name = ?")
            .bind(name)
            .fetch_one(&mut **tx)
            .await?;

        sqlx::query(
            "INSERT OR IGNORE INTO professor_subjects (professor_id, subject_id) VALUES (?, ?)",
        )
        .bind(professor_id)
        .bind(subject_id)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Create the account, professor row and subject links in one transaction.
///
/// Returns the new account id.
pub async fn create(
    db: &Db,
    input: &ProfessorInput,
    password_hash: &str,
) -> Result<String, sqlx::Error> {
    create_at(db, input, password_hash, Utc::now()).await
}

pub(crate) async fn create_at(
    db: &Db,
    input: &ProfessorInput,
    password_hash: &str,
    created_at: DateTime<Utc>,
) -> Result<String, sqlx::Error> {
    let id = nanoid::nanoid!(12);
    let mut tx = db.begin().await?;

    sqlx::query(
        "INSERT INTO accounts (id, name, surname, email, password_hash, phone, photo, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&input.name)
    .bind(&input.surname)
    .bind(&input.email)
    .bind(password_hash)
    .bind(&input.phone)
    .bind(&input.photo)
    .bind(created_at)
    .execute(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO professors (account_id, kind) VALUES (?, ?)")
        .bind(&id)
        .bind(input.kind.as_str())
        .execute(&mut *tx)
        .await?;

    attach_subjects(&mut tx, &id, &input.subjects).await?;

    tx.commit().await?;
    Ok(id)
}

/// Update a professor and replace its subjects.
///
/// Returns false (and changes nothing) if `id` is not a professor.
pub async fn update(db: &Db, id: &str, input: &ProfessorInput) -> Result<bool, sqlx::Error> {
    let mut tx = db.begin().await?;

    let result = sqlx::query("UPDATE professors SET kind = ? WHERE account_id = ?")
        .bind(input.kind.as_str())
        .bind(id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query(
        "UPDATE accounts SET name = ?, surname = ?, email = ?, phone = ?, photo = ? WHERE id = ?",
    )
    .bind(&input.name)
    .bind(&input.surname)
    .bind(&input.email)
    .bind(&input.phone)
    .bind(&input.photo)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM professor_subjects WHERE professor_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    attach_subjects(&mut tx, id, &input.subjects).await?;

    tx.commit().await?;
    Ok(true)
}

/// Number of distinct subjects.
pub async fn subject_count(db: &Db) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM subjects")
        .fetch_one(db)
        .await
}

/// Totals per professor type and the monthly creation trend.
pub async fn stats(db: &Db, now: DateTime<Utc>) -> Result<ProfessorStats, sqlx::Error> {
    let (total, permanent, vacataire): (i64, i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), \
         COALESCE(SUM(kind = 'permanent'), 0), \
         COALESCE(SUM(kind = 'vacataire'), 0) \
         FROM professors",
    )
    .fetch_one(db)
    .await?;

    let window_start = month_start(now, TREND_MONTHS - 1);
    let created: Vec<DateTime<Utc>> = sqlx::query_scalar(
        "SELECT a.created_at FROM professors p JOIN accounts a ON a.id = p.account_id \
         WHERE a.created_at >= ?",
    )
    .bind(window_start)
    .fetch_all(db)
    .await?;

    Ok(ProfessorStats {
        total,
        permanent,
        vacataire,
        trends: monthly_trend(&created, now),
    })
}

/// First instant of the month `months_back` months before `now`'s month.
fn month_start(now: DateTime<Utc>, months_back: u32) -> DateTime<Utc> {
    let index = now.year() * 12 + now.month0() as i32 - months_back as i32;
    let (year, month0) = (index.div_euclid(12), index.rem_euclid(12) as u32);
    let start = NaiveDate::from_ymd_opt(year, month0 + 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    Utc.from_utc_datetime(&start)
}

/// Counts per month, oldest first, for the months ending with `now`'s.
fn monthly_trend(created: &[DateTime<Utc>], now: DateTime<Utc>) -> Vec<MonthCount> {
    (0..TREND_MONTHS)
        .rev()
        .map(|back| {
            let start = month_start(now, back);
            let count = created
                .iter()
                .filter(|t| t.year() == start.year() && t.month() == start.month())
                .count() as i64;
            MonthCount {
                month: start.format("%b").to_string(),
                count,
            }
        })
        .collect()
}
