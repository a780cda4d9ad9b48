//! Audit log listing.

use crate::auth::middleware::{AdminSession, AppState};
use crate::error::AppError;
use crate::models::LogEntryInfo;
use crate::storage;
use axum::{extract::State, response::IntoResponse, Json};

/// GET /api/logs — All audit entries, newest first
pub async fn list_logs(
    AdminSession(_session): AdminSession,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let entries: Vec<LogEntryInfo> = storage::log::list(&state.db)
        .await?
        .into_iter()
        .map(LogEntryInfo::from)
        .collect();

    Ok(Json(entries))
}
