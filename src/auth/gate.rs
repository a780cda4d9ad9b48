//! Page gate: authorizes or redirects requests for the dashboard pages.
//!
//! Only `/login`, `/recover`, `/dashboard` and `/dashboard/...` are gated;
//! every other path passes through. Each request is decided from scratch
//! in the following order:
//!
//! 1. no `token` cookie: public pages are served, everything else goes to `/login`
//! 2. token rejected (signature, expiry, denylist): the cookie is cleared and
//!    the request is handled as in step 1
//! 3. valid token on a public page: redirect to `/dashboard`
//! 4. valid token on a dashboard page: role restrictions apply, and a
//!    mismatch redirects to `/dashboard`

use super::cookie::{cookie_token, expired_cookie};
use super::middleware::{resolve_session, AppState};
use crate::error::AppError;
use crate::models::Role;
use axum::{
    extract::{Request, State},
    http::header::SET_COOKIE,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

pub const LOGIN_PATH: &str = "/login";
pub const DASHBOARD_PATH: &str = "/dashboard";

const PUBLIC_PATHS: &[&str] = &["/login", "/recover"];
const ADMIN_ONLY_PREFIXES: &[&str] = &["/dashboard/professeurs", "/dashboard/logs"];
const PROFESSOR_ONLY_PREFIXES: &[&str] = &["/dashboard/profile"];

/// What the gate learned from the request's cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Missing,
    Rejected,
    Valid(Role),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow { clear_cookie: bool },
    RedirectLogin { clear_cookie: bool },
    RedirectDashboard,
}

/// `path` equals `prefix` or continues it with a new segment.
fn matches_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Percent-decoded path with empty, `.` and `..` segments resolved, as the
/// static file service will see it. `None` if it doesn't decode to UTF-8.
pub fn canonical_path(raw: &str) -> Option<String> {
    let decoded = urlencoding::decode(raw).ok()?;

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    Some(format!("/{}", segments.join("/")))
}

fn normalize(path: &str) -> &str {
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}

pub fn is_public(path: &str) -> bool {
    PUBLIC_PATHS.contains(&normalize(path))
}

/// Whether the gate looks at this path at all.
pub fn is_gated(path: &str) -> bool {
    is_public(path) || matches_prefix(path, DASHBOARD_PATH)
}

/// Decide what happens to a gated request.
pub fn decide(path: &str, status: SessionStatus) -> GateDecision {
    let public = is_public(path);

    match status {
        SessionStatus::Missing if public => GateDecision::Allow { clear_cookie: false },
        SessionStatus::Missing => GateDecision::RedirectLogin { clear_cookie: false },
        SessionStatus::Rejected if public => GateDecision::Allow { clear_cookie: true },
        SessionStatus::Rejected => GateDecision::RedirectLogin { clear_cookie: true },
        SessionStatus::Valid(_) if public => GateDecision::RedirectDashboard,
        SessionStatus::Valid(role) => {
            let admin_only = ADMIN_ONLY_PREFIXES.iter().any(|p| matches_prefix(path, p));
            let professor_only = PROFESSOR_ONLY_PREFIXES
                .iter()
                .any(|p| matches_prefix(path, p));

            if (admin_only && role != Role::Admin) || (professor_only && role == Role::Admin) {
                GateDecision::RedirectDashboard
            } else {
                GateDecision::Allow { clear_cookie: false }
            }
        }
    }
}

fn with_cleared_cookie(mut response: Response, secure: bool) -> Response {
    match expired_cookie(secure) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
            response
        }
        Err(e) => e.into_response(),
    }
}

/// Middleware applying [`decide`] to gated page requests.
///
/// An allowed request carries its [`Session`](super::session::Session) in
/// the request extensions.
pub async fn session_gate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    // Decided on the path the file service resolves, not the raw one
    let Some(path) = canonical_path(request.uri().path()) else {
        return AppError::BadRequest("Chemin invalide".to_string()).into_response();
    };
    if !is_gated(&path) {
        return next.run(request).await;
    }

    let mut session = None;
    let status = match cookie_token(request.headers()) {
        None => SessionStatus::Missing,
        Some(token) => match resolve_session(&state, &token).await {
            Ok(Some(resolved)) => {
                let role = resolved.role;
                session = Some(resolved);
                SessionStatus::Valid(role)
            }
            Ok(None) => SessionStatus::Rejected,
            Err(e) => return e.into_response(),
        },
    };

    let decision = decide(&path, status);
    tracing::debug!(path = %path, ?status, ?decision, "Page gate");

    let secure = state.config.secure_cookies();
    match decision {
        GateDecision::Allow { clear_cookie } => {
            if let Some(session) = session {
                request.extensions_mut().insert(session);
            }
            let response = next.run(request).await;
            if clear_cookie {
                with_cleared_cookie(response, secure)
            } else {
                response
            }
        }
        GateDecision::RedirectLogin { clear_cookie } => {
            let response = Redirect::temporary(LOGIN_PATH).into_response();
            if clear_cookie {
                with_cleared_cookie(response, secure)
            } else {
                response
            }
        }
        GateDecision::RedirectDashboard => Redirect::temporary(DASHBOARD_PATH).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::middleware::test_state;
    use crate::auth::session::Session;
    use crate::auth::token::Identity;
    use crate::storage;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        routing::get,
        Extension, Router,
    };
    use chrono::TimeDelta;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tower::ServiceExt;

    #[test]
    fn test_no_token() {
        assert_eq!(
            decide("/login", SessionStatus::Missing),
            GateDecision::Allow { clear_cookie: false }
        );
        assert_eq!(
            decide("/recover", SessionStatus::Missing),
            GateDecision::Allow { clear_cookie: false }
        );
        assert_eq!(
            decide("/dashboard", SessionStatus::Missing),
            GateDecision::RedirectLogin { clear_cookie: false }
        );
        assert_eq!(
            decide("/dashboard/logs", SessionStatus::Missing),
            GateDecision::RedirectLogin { clear_cookie: false }
        );
    }

    #[test]
    fn test_rejected_token_clears_cookie() {
        assert_eq!(
            decide("/dashboard", SessionStatus::Rejected),
            GateDecision::RedirectLogin { clear_cookie: true }
        );
        // Public pages stay reachable so the user can log in again
        assert_eq!(
            decide("/login", SessionStatus::Rejected),
            GateDecision::Allow { clear_cookie: true }
        );
    }

    #[test]
    fn test_logged_in_users_leave_auth_pages() {
        for role in [Role::Admin, Role::Professor] {
            assert_eq!(
                decide("/login", SessionStatus::Valid(role)),
                GateDecision::RedirectDashboard
            );
            assert_eq!(
                decide("/recover/", SessionStatus::Valid(role)),
                GateDecision::RedirectDashboard
            );
        }
    }

    #[test]
    fn test_role_restrictions() {
        let prof = SessionStatus::Valid(Role::Professor);
        let admin = SessionStatus::Valid(Role::Admin);
        let allow = GateDecision::Allow { clear_cookie: false };

        assert_eq!(decide("/dashboard/professeurs", prof), GateDecision::RedirectDashboard);
        assert_eq!(decide("/dashboard/professeurs/edit/abc", prof), GateDecision::RedirectDashboard);
        assert_eq!(decide("/dashboard/logs", prof), GateDecision::RedirectDashboard);
        assert_eq!(decide("/dashboard/profile", prof), allow);
        assert_eq!(decide("/dashboard", prof), allow);
        assert_eq!(decide("/dashboard/settings", prof), allow);

        assert_eq!(decide("/dashboard/professeurs/add", admin), allow);
        assert_eq!(decide("/dashboard/logs", admin), allow);
        assert_eq!(decide("/dashboard/profile", admin), GateDecision::RedirectDashboard);
        assert_eq!(decide("/dashboard", admin), allow);
    }

    #[test]
    fn test_prefixes_are_segment_aware() {
        let prof = SessionStatus::Valid(Role::Professor);
        assert_eq!(decide("/dashboard/logsx", prof), GateDecision::Allow { clear_cookie: false });
        assert!(!is_gated("/dashboardx"));
        assert!(!is_gated("/api/login"));
        assert!(!is_gated("/loginx"));
        assert!(is_gated("/dashboard/"));
    }

    #[test]
    fn test_canonical_path() {
        assert_eq!(canonical_path("/dashboard/%70rofesseurs/").unwrap(), "/dashboard/professeurs");
        assert_eq!(canonical_path("//dashboard//logs").unwrap(), "/dashboard/logs");
        assert_eq!(canonical_path("/dashboard/./x/../profile").unwrap(), "/dashboard/profile");
        assert_eq!(canonical_path("/api/../dashboard/logs").unwrap(), "/dashboard/logs");
        assert_eq!(canonical_path("/dashboard%2Flogs").unwrap(), "/dashboard/logs");
        assert_eq!(canonical_path("/").unwrap(), "/");
        assert!(canonical_path("/dashboard/%FF").is_none());
    }

    fn identity(role: Role) -> Identity {
        Identity {
            id: "abcdefghijkl".to_string(),
            name: "Claire".to_string(),
            surname: "Durand".to_string(),
            email: "claire@example.com".to_string(),
            photo: None,
            phone: None,
            role,
        }
    }

    async fn page(Extension(session): Extension<Session>) -> String {
        session.account_id
    }

    fn gated_app(state: AppState, hits: Arc<AtomicUsize>) -> Router {
        let counter = hits.clone();
        let professors = get(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                "professeurs"
            }
        });
        Router::new()
            .route("/dashboard", get(page))
            .route("/dashboard/professeurs", professors)
            .route("/login", get(|| async { "login" }))
            .route("/api/ping", get(|| async { "pong" }))
            .layer(axum::middleware::from_fn_with_state(state.clone(), session_gate))
            .with_state(state)
    }

    async fn send(app: Router, uri: &str, token: Option<&str>) -> axum::response::Response {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::COOKIE, format!("token={}", token));
        }
        app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap()
    }

    fn location(response: &axum::response::Response) -> &str {
        response.headers().get(header::LOCATION).unwrap().to_str().unwrap()
    }

    fn clears_cookie(response: &axum::response::Response) -> bool {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .any(|v| v.to_str().unwrap().starts_with("token=;"))
    }

    #[tokio::test]
    async fn test_professor_never_reaches_admin_page() {
        let state = test_state().await;
        let hits = Arc::new(AtomicUsize::new(0));
        let token = state.tokens.issue(&identity(Role::Professor)).unwrap();

        let response = send(gated_app(state, hits.clone()), "/dashboard/professeurs", Some(&token)).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&response), "/dashboard");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_encoded_admin_path_is_still_gated() {
        let state = test_state().await;
        let hits = Arc::new(AtomicUsize::new(0));
        let prof = state.tokens.issue(&identity(Role::Professor)).unwrap();
        let admin = state.tokens.issue(&identity(Role::Admin)).unwrap();

        for uri in [
            "/dashboard/%70rofesseurs/",
            "/dashboard//professeurs",
            "/dashboard/x/../logs",
            "/dashboard%2Flogs",
        ] {
            let response = send(gated_app(state.clone(), hits.clone()), uri, Some(&prof)).await;
            assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT, "{}", uri);
            assert_eq!(location(&response), "/dashboard");
        }
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        let response = send(gated_app(state.clone(), hits.clone()), "/dashboard/%70rofile", Some(&admin)).await;
        assert_eq!(location(&response), "/dashboard");

        let response = send(gated_app(state, hits), "/dashboard/%70rofesseurs", None).await;
        assert_eq!(location(&response), "/login");
    }

    #[tokio::test]
    async fn test_admin_reaches_admin_page() {
        let state = test_state().await;
        let hits = Arc::new(AtomicUsize::new(0));
        let token = state.tokens.issue(&identity(Role::Admin)).unwrap();

        let response = send(gated_app(state, hits.clone()), "/dashboard/professeurs", Some(&token)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_session_is_passed_to_handler() {
        let state = test_state().await;
        let token = state.tokens.issue(&identity(Role::Professor)).unwrap();

        let response = send(gated_app(state, Arc::default()), "/dashboard", Some(&token)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body, "abcdefghijkl");
    }

    #[tokio::test]
    async fn test_expired_token_redirects_and_clears() {
        let state = test_state().await;
        let token = state
            .tokens
            .issue_with_ttl(&identity(Role::Admin), TimeDelta::seconds(-10))
            .unwrap();

        let response = send(gated_app(state, Arc::default()), "/dashboard", Some(&token)).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&response), "/login");
        assert!(clears_cookie(&response));
    }

    #[tokio::test]
    async fn test_tampered_token_redirects_and_clears() {
        let state = test_state().await;
        let token = state.tokens.issue(&identity(Role::Admin)).unwrap();
        let tampered = format!("{}x", token);

        let response = send(gated_app(state, Arc::default()), "/dashboard", Some(&tampered)).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&response), "/login");
        assert!(clears_cookie(&response));
    }

    #[tokio::test]
    async fn test_revoked_token_redirects() {
        let state = test_state().await;
        let token = state.tokens.issue(&identity(Role::Admin)).unwrap();
        let claims = state.tokens.verify(&token).unwrap();
        storage::revocation::revoke(&state.db, claims.jti(), claims.expires_at())
            .await
            .unwrap();

        let response = send(gated_app(state, Arc::default()), "/dashboard", Some(&token)).await;
        assert_eq!(location(&response), "/login");
        assert!(clears_cookie(&response));
    }

    #[tokio::test]
    async fn test_login_page_with_bad_token_is_served() {
        let state = test_state().await;
        let response = send(gated_app(state, Arc::default()), "/login", Some("garbage")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(clears_cookie(&response));
    }

    #[tokio::test]
    async fn test_ungated_paths_pass_through() {
        let state = test_state().await;
        let response = send(gated_app(state, Arc::default()), "/api/ping", Some("garbage")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!clears_cookie(&response));
    }
}
