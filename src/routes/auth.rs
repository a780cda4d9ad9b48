//! Auth API endpoints: login, logout, current session, password reset.

use crate::auth::cookie::{expired_cookie, session_cookie, token_from_headers};
use crate::auth::middleware::{enforce_auth_rate_limit, AppState};
use crate::auth::password::{self, MIN_RESET_PASSWORD_LEN};
use crate::auth::session::{digest_token, generate_reset_token, Session};
use crate::auth::token::{decode_unverified, Identity};
use crate::error::AppError;
use crate::models::{
    AccountSummary, AuditAction, LoginRequest, LoginResponse, MessageResponse, RecoverRequest,
    ResetRequest,
};
use crate::{notify, storage};
use axum::{
    extract::{ConnectInfo, State},
    http::{header::SET_COOKIE, HeaderMap},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use std::net::SocketAddr;
use zeroize::Zeroize;

const INVALID_RESET_LINK: &str = "Lien de réinitialisation invalide ou expiré.";

/// POST /api/login — Check credentials and open a session
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(mut req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    enforce_auth_rate_limit(&state, "login", addr.ip()).await?;

    let email = req.email.trim().to_string();
    if email.is_empty() || req.password.is_empty() {
        return Err(AppError::BadRequest(
            "Email et mot de passe sont requis.".to_string(),
        ));
    }

    let account = storage::account::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| AppError::NotFound("Utilisateur introuvable.".to_string()))?;

    let matches = password::verify(&req.password, &account.password_hash);
    req.password.zeroize();
    if !matches {
        tracing::info!(action = "login_failed", account_id = %account.id, "Wrong password");
        return Err(AppError::Unauthorized("Mot de passe incorrect.".to_string()));
    }

    let token = state.tokens.issue(&Identity::from_account(&account))?;
    let cookie = session_cookie(&token, state.tokens.ttl_secs(), state.config.secure_cookies())?;

    storage::log::append(
        &state.db,
        Some(&account.id),
        AuditAction::Login,
        &format!("{} s'est connecté.", account.display_name()),
    )
    .await?;

    tracing::info!(
        action = "login",
        account_id = %account.id,
        role = %account.kind.role(),
        "Session opened"
    );

    Ok((
        [(SET_COOKIE, cookie)],
        Json(LoginResponse {
            message: "Authentification réussie".to_string(),
            user: AccountSummary::from(&account),
        }),
    ))
}

/// GET /api/logout — Close the session
///
/// A token that verifies is put on the denylist until it expires. Then one
/// audit entry is written, attributed from the token's decoded (not
/// verified) subject. A failed audit write is logged and does not stop the
/// logout.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let token = token_from_headers(&headers);

    if let Some(claims) = token.as_deref().and_then(|t| state.tokens.verify(t).ok()) {
        storage::revocation::revoke(&state.db, claims.jti(), claims.expires_at()).await?;
        tracing::info!(action = "logout", account_id = %claims.account_id(), "Session revoked");
    } else {
        tracing::info!(action = "logout", "Logout without a valid session");
    }

    if let Err(e) = record_logout(&state, token.as_deref()).await {
        tracing::error!(action = "logout", error = %e, "Failed to write logout audit entry");
    }

    let cookie = expired_cookie(state.config.secure_cookies())?;
    Ok((
        [(SET_COOKIE, cookie)],
        Json(MessageResponse::new("Déconnexion réussie.")),
    ))
}

async fn record_logout(state: &AppState, token: Option<&str>) -> Result<i64, sqlx::Error> {
    let claimed_id = token.and_then(decode_unverified).and_then(|claims| claims.sub);

    let account = match claimed_id {
        Some(id) => storage::account::find_by_id(&state.db, &id).await?,
        None => None,
    };

    match &account {
        Some(account) => {
            storage::log::append(
                &state.db,
                Some(&account.id),
                AuditAction::Logout,
                &format!("{} s'est déconnecté.", account.display_name()),
            )
            .await
        }
        None => {
            storage::log::append(
                &state.db,
                None,
                AuditAction::Logout,
                "Un utilisateur s'est déconnecté.",
            )
            .await
        }
    }
}

/// GET /api/me — Identity of the current session
pub async fn me(session: Session) -> impl IntoResponse {
    Json(session.info())
}

/// POST /api/recover — Request a password reset link
///
/// Always answers with the same message so the endpoint cannot be used to
/// tell which e-mails are registered.
pub async fn recover(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<RecoverRequest>,
) -> Result<impl IntoResponse, AppError> {
    enforce_auth_rate_limit(&state, "recover", addr.ip()).await?;

    let email = req.email.trim();
    if !super::is_valid_email(email) {
        return Err(AppError::BadRequest("Email invalide".to_string()));
    }

    if let Some(account_id) = storage::account::id_for_email(&state.db, email).await? {
        let token = generate_reset_token();
        let expires_at = Utc::now().timestamp() + state.config.reset_ttl_secs as i64;
        storage::reset::store(&state.db, &digest_token(&token), &account_id, expires_at).await?;

        let link = format!(
            "{}/reset-password?token={}",
            state.config.public_base_url, token
        );
        notify::deliver(&notify::reset_mail(
            email,
            &link,
            state.config.reset_ttl_secs / 60,
        ));

        tracing::info!(action = "reset_requested", account_id = %account_id, "Password reset requested");
    }

    Ok(Json(MessageResponse::new(
        "Si un compte correspond à cette adresse, un e-mail de réinitialisation a été envoyé.",
    )))
}

/// POST /api/reset — Set a new password with a reset token
pub async fn reset(
    State(state): State<AppState>,
    Json(mut req): Json<ResetRequest>,
) -> Result<impl IntoResponse, AppError> {
    let token = req.token.trim().to_string();
    if token.is_empty() {
        return Err(AppError::BadRequest(INVALID_RESET_LINK.to_string()));
    }

    // Checked before the token is consumed so a rejected password doesn't burn it
    if req.password.chars().count() < MIN_RESET_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Le mot de passe doit contenir au moins {} caractères.",
            MIN_RESET_PASSWORD_LEN
        )));
    }

    let account_id =
        storage::reset::consume(&state.db, &digest_token(&token), Utc::now().timestamp())
            .await?
            .ok_or_else(|| AppError::BadRequest(INVALID_RESET_LINK.to_string()))?;

    let hashed = password::hash(&req.password)?;
    req.password.zeroize();

    if !storage::account::update_password(&state.db, &account_id, &hashed).await? {
        return Err(AppError::BadRequest(INVALID_RESET_LINK.to_string()));
    }

    tracing::info!(action = "password_reset", account_id = %account_id, "Password reset");

    Ok(Json(MessageResponse::new(
        "Mot de passe réinitialisé avec succès.",
    )))
}
