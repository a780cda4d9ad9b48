//! Settings endpoints: the signed-in user's own profile and password.
//!
//! Neither endpoint writes an audit entry.

use crate::auth::cookie::session_cookie;
use crate::auth::middleware::AppState;
use crate::auth::password;
use crate::auth::session::Session;
use crate::auth::token::Identity;
use crate::error::AppError;
use crate::models::{MessageResponse, PasswordUpdateRequest};
use crate::storage::{self, account::ProfileUpdate, blob};
use axum::{
    extract::{Multipart, Path, State},
    http::header::SET_COOKIE,
    response::IntoResponse,
    Json,
};
use zeroize::Zeroize;

fn ensure_owner(session: &Session, id: &str) -> Result<(), AppError> {
    if session.account_id() != id {
        return Err(AppError::Forbidden(
            "Vous ne pouvez modifier que votre propre compte.".to_string(),
        ));
    }
    Ok(())
}

/// PUT /api/settings/password/:id — Change the password
///
/// Input is validated before the account is loaded.
pub async fn update_password(
    session: Session,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut req): Json<PasswordUpdateRequest>,
) -> Result<impl IntoResponse, AppError> {
    ensure_owner(&session, &id)?;

    let result = change_password(&state, &id, &req).await;
    req.old_password.zeroize();
    req.password.zeroize();
    req.confirm_password.zeroize();
    result?;

    tracing::info!(action = "password_changed", account_id = %id, "Password updated");

    Ok(Json(MessageResponse::new(
        "Mot de passe mis à jour avec succès.",
    )))
}

async fn change_password(
    state: &AppState,
    id: &str,
    req: &PasswordUpdateRequest,
) -> Result<(), AppError> {
    if req.old_password.is_empty() {
        return Err(AppError::BadRequest(
            "L'ancien mot de passe est requis".to_string(),
        ));
    }
    password::validate_policy(&req.password).map_err(AppError::BadRequest)?;
    if req.password != req.confirm_password {
        return Err(AppError::BadRequest(
            "Les mots de passe ne correspondent pas.".to_string(),
        ));
    }

    let account = storage::account::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Utilisateur non trouvé".to_string()))?;

    if !password::verify(&req.old_password, &account.password_hash) {
        return Err(AppError::Unauthorized("Mot de passe incorrect.".to_string()));
    }
    if password::verify(&req.password, &account.password_hash) {
        return Err(AppError::Unauthorized(
            "Le nouveau mot de passe ne peut pas être le même que l'ancien.".to_string(),
        ));
    }

    let hashed = password::hash(&req.password)?;
    if !storage::account::update_password(&state.db, id, &hashed).await? {
        return Err(AppError::NotFound("Utilisateur non trouvé".to_string()));
    }
    Ok(())
}

/// PUT /api/settings/:id — Update profile fields and photo
///
/// Re-issues the session cookie so the token carries the new profile, with
/// the role of the current session. The previous token is revoked.
pub async fn update_profile(
    session: Session,
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    ensure_owner(&session, &id)?;

    let form = super::read_form(multipart).await?;
    let name = form.text("name");
    let surname = form.text("surname");
    let email = form.text("email");
    let phone = form.text("phone");
    super::validate_contact(&name, &surname, &email, &phone).map_err(AppError::BadRequest)?;

    let account = storage::account::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Utilisateur non trouvé".to_string()))?;

    if let Some(owner) = storage::account::id_for_email(&state.db, &email).await? {
        if owner != id {
            return Err(AppError::Conflict(
                "L'email est déjà utilisé par un autre utilisateur.".to_string(),
            ));
        }
    }

    let photo = match &form.photo {
        Some(file) => {
            Some(blob::save_photo(&state.config.upload_dir, &file.file_name, &file.content).await?)
        }
        // The stored photo stays, whatever `existingPhoto` the client echoes
        None => account.photo.clone(),
    };

    let update = ProfileUpdate {
        name,
        surname,
        email,
        phone,
        photo,
    };
    match storage::account::update_profile(&state.db, &id, &update).await {
        Ok(true) => {}
        Ok(false) => return Err(AppError::NotFound("Utilisateur non trouvé".to_string())),
        Err(e) if storage::is_unique_violation(&e) => {
            return Err(AppError::Conflict(
                "L'email est déjà utilisé par un autre utilisateur.".to_string(),
            ))
        }
        Err(e) => return Err(e.into()),
    }

    if form.photo.is_some() {
        if let Some(old) = account.photo.as_deref() {
            if let Err(e) = blob::delete_photo(&state.config.upload_dir, old).await {
                tracing::warn!(account_id = %id, error = %e, "Failed to delete replaced photo");
            }
        }
    }

    let identity = Identity {
        id: id.clone(),
        name: update.name,
        surname: update.surname,
        email: update.email,
        photo: update.photo,
        phone: Some(update.phone),
        role: session.role(),
    };
    let token = state.tokens.issue(&identity)?;
    let cookie = session_cookie(&token, state.tokens.ttl_secs(), state.config.secure_cookies())?;
    storage::revocation::revoke(&state.db, session.jti(), session.expires_at()).await?;

    tracing::info!(action = "profile_updated", account_id = %id, "Profile updated");

    Ok((
        [(SET_COOKIE, cookie)],
        Json(MessageResponse::new("Profil mis à jour avec succès.")),
    ))
}
