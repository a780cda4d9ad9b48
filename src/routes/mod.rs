//! API route handlers.

pub mod auth;
pub mod logs;
pub mod professors;
pub mod settings;

use crate::auth::middleware::AppState;
use crate::auth::session_gate;
use crate::error::AppError;
use crate::middleware::security_headers;
use crate::storage::blob;
use axum::{
    extract::{DefaultBodyLimit, Multipart},
    routing::{get, post, put},
    Router,
};
use axum::body::Bytes;
use std::collections::HashMap;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

/// Length of generated account ids.
pub const ID_LEN: usize = 12;

/// Validate that a string is a valid nanoid (alphanumeric, hyphens, underscores).
pub fn validate_id(id: &str, label: &str, expected_len: usize) -> Result<(), AppError> {
    if id.len() != expected_len
        || !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AppError::BadRequest(format!("Identifiant {} invalide", label)));
    }
    Ok(())
}

/// Loose structural e-mail check: one `@`, a dotted domain, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

/// Exactly ten ASCII digits.
pub fn is_valid_phone(phone: &str) -> bool {
    phone.len() == 10 && phone.chars().all(|c| c.is_ascii_digit())
}

/// Contact fields shared by profiles and professors. First failing field wins.
pub fn validate_contact(name: &str, surname: &str, email: &str, phone: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Le nom est requis".to_string());
    }
    if surname.is_empty() {
        return Err("Le prénom est requis".to_string());
    }
    if !is_valid_email(email) {
        return Err("Email invalide".to_string());
    }
    if !is_valid_phone(phone) {
        return Err("Le numéro de téléphone doit contenir 10 chiffres".to_string());
    }
    Ok(())
}

/// An uploaded file part.
pub struct UploadedFile {
    pub file_name: String,
    pub content: Bytes,
}

/// Text fields and the optional `photo` file of a multipart form.
#[derive(Default)]
pub struct FormFields {
    text: HashMap<String, String>,
    pub photo: Option<UploadedFile>,
}

impl FormFields {
    /// Trimmed text value, empty if absent.
    pub fn text(&self, name: &str) -> String {
        self.text
            .get(name)
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    }
}

/// Read every part of a multipart form. An empty `photo` part counts as absent.
pub async fn read_form(mut multipart: Multipart) -> Result<FormFields, AppError> {
    let mut form = FormFields::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Formulaire invalide: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "photo" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Formulaire invalide: {}", e)))?;
            if !content.is_empty() {
                form.photo = Some(UploadedFile { file_name, content });
            }
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(format!("Formulaire invalide: {}", e)))?;
            form.text.insert(name, value);
        }
    }

    Ok(form)
}

/// Build the API router with all endpoints.
pub fn api_router() -> Router<AppState> {
    Router::new()
        // Auth endpoints
        .route("/api/login", post(auth::login))
        .route("/api/logout", get(auth::logout))
        .route("/api/me", get(auth::me))
        .route("/api/recover", post(auth::recover))
        .route("/api/reset", post(auth::reset))
        // Settings endpoints
        .route("/api/settings/{id}", put(settings::update_profile))
        .route("/api/settings/password/{id}", put(settings::update_password))
        // Admin endpoints
        .route(
            "/api/prof",
            get(professors::list_professors).post(professors::create_professor),
        )
        .route("/api/prof/import", post(professors::import_professors))
        .route("/api/prof/stats", get(professors::professor_stats))
        .route(
            "/api/prof/{id}",
            get(professors::get_professor)
                .put(professors::update_professor)
                .delete(professors::delete_professor),
        )
        .route("/api/matiere", get(professors::subject_count))
        .route("/api/logs", get(logs::list_logs))
}

/// The full application: API, uploaded photos, static pages, page gate,
/// CORS and security headers.
pub fn app(state: AppState) -> Router {
    let pictures = ServeDir::new(blob::pictures_dir(&state.config.upload_dir));

    // Explicit CORS: deny all cross-origin requests (single-origin deployment).
    let cors = CorsLayer::new();

    api_router()
        .nest_service("/uploads/pictures", pictures)
        .fallback_service(ServeDir::new("static"))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            session_gate,
        ))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(cors)
        .layer(axum::middleware::from_fn(security_headers))
        .with_state(state)
}
