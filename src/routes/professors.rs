//! Professor management endpoints (all require AdminSession).

use super::{FormFields, ID_LEN};
use crate::auth::middleware::{AdminSession, AppState};
use crate::auth::password;
use crate::error::AppError;
use crate::models::{
    AccountKind, CreatedResponse, ImportResponse, ImportRow, ProfessorInput, ProfessorKind,
    SubjectCount,
};
use crate::storage::{self, blob};
use crate::notify;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;

const NOT_FOUND: &str = "Professeur non trouvé";
const EMAIL_TAKEN: &str = "Email déjà utilisée";

/// Validate raw professor fields. The first failing field wins.
pub fn validate_professor(
    name: &str,
    surname: &str,
    email: &str,
    phone: &str,
    kind: &str,
    subjects: &[String],
) -> Result<ProfessorInput, String> {
    super::validate_contact(name, surname, email, phone)?;

    let kind = kind
        .parse::<ProfessorKind>()
        .map_err(|_| "Type invalide. Doit être 'permanent' ou 'vacataire'".to_string())?;

    let subjects: Vec<String> = subjects
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if subjects.is_empty() {
        return Err("Au moins une matière enseignée est requise".to_string());
    }

    Ok(ProfessorInput {
        name: name.to_string(),
        surname: surname.to_string(),
        email: email.to_string(),
        phone: phone.to_string(),
        kind,
        subjects,
        photo: None,
    })
}

/// Professor fields of a multipart form. `subjects` is a JSON array string.
fn input_from_form(form: &FormFields) -> Result<ProfessorInput, AppError> {
    let raw_subjects = form.text("subjects");
    let subjects: Vec<String> = if raw_subjects.is_empty() {
        Vec::new()
    } else {
        serde_json::from_str(&raw_subjects)
            .map_err(|_| AppError::BadRequest("Liste de matières invalide".to_string()))?
    };

    validate_professor(
        &form.text("name"),
        &form.text("surname"),
        &form.text("email"),
        &form.text("phone"),
        &form.text("type"),
        &subjects,
    )
    .map_err(AppError::BadRequest)
}

/// Remove a photo written for a request that then failed.
async fn discard_photo(state: &AppState, url: Option<&str>) {
    if let Some(url) = url {
        if let Err(e) = blob::delete_photo(&state.config.upload_dir, url).await {
            tracing::warn!(photo = %url, error = %e, "Failed to delete photo");
        }
    }
}

/// Create one professor with a fresh temporary password and mail it.
async fn create_with_temporary_password(
    state: &AppState,
    input: &ProfessorInput,
) -> Result<String, AppError> {
    let temporary = password::generate_temporary_password();
    let hashed = password::hash(&temporary)?;

    let id = storage::professor::create(&state.db, input, &hashed)
        .await
        .map_err(|e| {
            if storage::is_unique_violation(&e) {
                AppError::Conflict(EMAIL_TAKEN.to_string())
            } else {
                e.into()
            }
        })?;

    notify::deliver(&notify::welcome_mail(
        &input.name,
        &input.surname,
        &input.email,
        &temporary,
    ));
    Ok(id)
}

/// GET /api/prof — List professors
pub async fn list_professors(
    AdminSession(_session): AdminSession,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let professors = storage::professor::list(&state.db).await?;
    Ok(Json(professors))
}

/// GET /api/prof/:id — One professor
pub async fn get_professor(
    AdminSession(_session): AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    super::validate_id(&id, "professeur", ID_LEN)?;

    let professor = storage::professor::get(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.to_string()))?;

    Ok(Json(professor))
}

/// POST /api/prof — Create a professor
pub async fn create_professor(
    AdminSession(session): AdminSession,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let form = super::read_form(multipart).await?;
    let mut input = input_from_form(&form)?;

    if storage::account::id_for_email(&state.db, &input.email)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(EMAIL_TAKEN.to_string()));
    }

    if let Some(file) = &form.photo {
        input.photo =
            Some(blob::save_photo(&state.config.upload_dir, &file.file_name, &file.content).await?);
    }

    let id = match create_with_temporary_password(&state, &input).await {
        Ok(id) => id,
        Err(e) => {
            discard_photo(&state, input.photo.as_deref()).await;
            return Err(e);
        }
    };

    tracing::info!(
        action = "professor_created",
        professor_id = %id,
        admin_id = %session.account_id(),
        "Admin created professor"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            message: "Professeur créé avec succès".to_string(),
            id,
        }),
    ))
}

/// PUT /api/prof/:id — Update a professor
pub async fn update_professor(
    AdminSession(session): AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    super::validate_id(&id, "professeur", ID_LEN)?;

    let form = super::read_form(multipart).await?;
    let mut input = input_from_form(&form)?;

    let current = storage::professor::get(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.to_string()))?;

    if let Some(owner) = storage::account::id_for_email(&state.db, &input.email).await? {
        if owner != id {
            return Err(AppError::Conflict(EMAIL_TAKEN.to_string()));
        }
    }

    input.photo = match &form.photo {
        Some(file) => {
            Some(blob::save_photo(&state.config.upload_dir, &file.file_name, &file.content).await?)
        }
        None => current.photo.clone(),
    };

    let updated = match storage::professor::update(&state.db, &id, &input).await {
        Ok(updated) => updated,
        Err(e) => {
            if form.photo.is_some() {
                discard_photo(&state, input.photo.as_deref()).await;
            }
            if storage::is_unique_violation(&e) {
                return Err(AppError::Conflict(EMAIL_TAKEN.to_string()));
            }
            return Err(e.into());
        }
    };
    if !updated {
        return Err(AppError::NotFound(NOT_FOUND.to_string()));
    }

    if form.photo.is_some() {
        discard_photo(&state, current.photo.as_deref()).await;
    }

    tracing::info!(
        action = "professor_updated",
        professor_id = %id,
        admin_id = %session.account_id(),
        "Admin updated professor"
    );

    Ok(Json(crate::models::MessageResponse::new(
        "Professeur mis à jour avec succès",
    )))
}

/// DELETE /api/prof/:id — Delete a professor
pub async fn delete_professor(
    AdminSession(session): AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    super::validate_id(&id, "professeur", ID_LEN)?;

    let account = storage::account::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.to_string()))?;

    if account.kind == AccountKind::Admin {
        return Err(AppError::Forbidden(
            "Les comptes administrateurs ne peuvent pas être supprimés.".to_string(),
        ));
    }

    if !storage::account::delete(&state.db, &id).await? {
        return Err(AppError::NotFound(NOT_FOUND.to_string()));
    }
    discard_photo(&state, account.photo.as_deref()).await;

    tracing::info!(
        action = "professor_deleted",
        professor_id = %id,
        admin_id = %session.account_id(),
        "Admin deleted professor"
    );

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/prof/import — Bulk create professors
///
/// The whole batch is validated before anything is written. Rows are then
/// created one by one; a row that fails is reported and the others proceed.
pub async fn import_professors(
    AdminSession(session): AdminSession,
    State(state): State<AppState>,
    Json(rows): Json<Vec<ImportRow>>,
) -> Result<impl IntoResponse, AppError> {
    let inputs = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            validate_professor(
                row.name.trim(),
                row.surname.trim(),
                row.email.trim(),
                row.phone.trim(),
                row.kind.trim(),
                &row.subjects,
            )
            .map_err(|msg| AppError::BadRequest(format!("Ligne {}: {}", i + 1, msg)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut imported_count = 0;
    let mut errors = Vec::new();

    for input in &inputs {
        if storage::account::id_for_email(&state.db, &input.email)
            .await?
            .is_some()
        {
            errors.push(format!("L'email {} est déjà utilisé.", input.email));
            continue;
        }

        match create_with_temporary_password(&state, input).await {
            Ok(_) => imported_count += 1,
            Err(AppError::Conflict(_)) => {
                errors.push(format!("L'email {} est déjà utilisé.", input.email));
            }
            Err(e) => {
                tracing::warn!(email = %input.email, error = %e, "Import row failed");
                errors.push(format!(
                    "Erreur lors de la création du professeur {}.",
                    input.email
                ));
            }
        }
    }

    tracing::info!(
        action = "professors_imported",
        admin_id = %session.account_id(),
        imported = imported_count,
        failed = errors.len(),
        "Admin imported professors"
    );

    Ok((
        StatusCode::CREATED,
        Json(ImportResponse {
            imported_count,
            errors,
        }),
    ))
}

/// GET /api/prof/stats — Totals and monthly creation trend
pub async fn professor_stats(
    AdminSession(_session): AdminSession,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let stats = storage::professor::stats(&state.db, Utc::now()).await?;
    Ok(Json(stats))
}

/// GET /api/matiere — Number of subjects
pub async fn subject_count(
    AdminSession(_session): AdminSession,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let total = storage::professor::subject_count(&state.db).await?;
    Ok(Json(SubjectCount { total }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subjects(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_validate_professor_ok() {
        let input = validate_professor(
            "Durand",
            "Claire",
            "claire@example.com",
            "0612345678",
            "vacataire",
            &subjects(&[" Maths ", "", "Physique"]),
        )
        .unwrap();
        assert_eq!(input.kind, ProfessorKind::Vacataire);
        assert_eq!(input.subjects, vec!["Maths", "Physique"]);
        assert!(input.photo.is_none());
    }

    #[test]
    fn test_validate_professor_type() {
        let err = validate_professor(
            "Durand",
            "Claire",
            "claire@example.com",
            "0612345678",
            "stagiaire",
            &subjects(&["Maths"]),
        )
        .unwrap_err();
        assert!(err.starts_with("Type invalide"));
    }

    #[test]
    fn test_validate_professor_needs_subject() {
        let err = validate_professor(
            "Durand",
            "Claire",
            "claire@example.com",
            "0612345678",
            "permanent",
            &subjects(&["  "]),
        )
        .unwrap_err();
        assert_eq!(err, "Au moins une matière enseignée est requise");
    }

    #[test]
    fn test_contact_checked_before_type() {
        let err = validate_professor("", "Claire", "x", "1", "nope", &[]).unwrap_err();
        assert_eq!(err, "Le nom est requis");
    }
}
