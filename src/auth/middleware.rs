//! Axum extractors for authentication and rate limiting.

use super::cookie::token_from_headers;
use super::session::Session;
use super::token::TokenService;
use crate::config::Config;
use crate::error::AppError;
use crate::storage::{self, Db};
use axum::{extract::FromRequestParts, http::request::Parts};
use redis::AsyncCommands;
use std::hash::{Hash, Hasher};
use std::net::IpAddr;
use std::sync::Arc;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    /// Backs the login rate limiter. `None` disables rate limiting.
    pub redis: Option<redis::Client>,
    pub config: Arc<Config>,
    pub tokens: TokenService,
}

impl AppState {
    pub fn new(db: Db, redis: Option<redis::Client>, config: Config) -> Self {
        let tokens = TokenService::new(&config.jwt_secret, config.session_ttl_secs);
        AppState {
            db,
            redis,
            config: Arc::new(config),
            tokens,
        }
    }
}

/// Verify a token and turn it into a session.
///
/// Returns `Ok(None)` when the token is rejected: bad signature, expired,
/// impossible role combination, or revoked at logout. Store failures are
/// errors, not rejections.
pub async fn resolve_session(state: &AppState, token: &str) -> Result<Option<Session>, AppError> {
    let session = match state
        .tokens
        .verify(token)
        .and_then(|claims| claims.into_session())
    {
        Ok(session) => session,
        Err(e) => {
            tracing::debug!(reason = %e, "Session token rejected");
            return Ok(None);
        }
    };

    if storage::revocation::is_revoked(&state.db, &session.jti).await? {
        tracing::debug!(account_id = %session.account_id, "Revoked session token presented");
        return Ok(None);
    }

    Ok(Some(session))
}

/// Authenticated session extractor.
///
/// Reads the `token` cookie, or `Authorization: Bearer {token}`.
/// Returns 401 Unauthorized if missing, invalid, expired or revoked.
impl FromRequestParts<AppState> for Session {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Already resolved by the page gate
        if let Some(session) = parts.extensions.get::<Session>() {
            return Ok(session.clone());
        }

        let token = token_from_headers(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("Non authentifié.".to_string()))?;

        let session = resolve_session(state, &token)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Session invalide ou expirée.".to_string()))?;

        parts.extensions.insert(session.clone());
        Ok(session)
    }
}

/// Admin-only session extractor.
///
/// Returns 403 Forbidden if the session is not an administrator's.
pub struct AdminSession(pub Session);

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;

        if !session.is_admin() {
            return Err(AppError::Forbidden(
                "Accès réservé aux administrateurs.".to_string(),
            ));
        }

        Ok(AdminSession(session))
    }
}

/// Check rate limit using Redis INCR with TTL.
///
/// # Arguments
/// * `con` - Redis connection
/// * `key` - Rate limit key (e.g., "ratelimit:login:127.0.0.1")
/// * `max` - Maximum requests allowed in window
/// * `window_secs` - Time window in seconds
///
/// # Returns
/// * `Ok(true)` if under limit
/// * `Ok(false)` if limit exceeded
pub async fn check_rate_limit<C>(
    con: &mut C,
    key: &str,
    max: u32,
    window_secs: u64,
) -> Result<bool, redis::RedisError>
where
    C: AsyncCommands,
{
    let count: u32 = con.incr(key, 1).await?;

    // Set TTL on first request
    if count == 1 {
        con.expire::<_, ()>(key, window_secs as i64).await?;
    }

    Ok(count <= max)
}

/// Per-IP limit on unauthenticated auth endpoints. No-op without Redis.
pub async fn enforce_auth_rate_limit(
    state: &AppState,
    endpoint: &str,
    ip: IpAddr,
) -> Result<(), AppError> {
    let Some(client) = &state.redis else {
        return Ok(());
    };

    let mut con = client
        .get_multiplexed_async_connection()
        .await
        .map_err(|e| AppError::Internal(format!("Redis connection error: {}", e)))?;

    let key = format!("ratelimit:{}:{}", endpoint, ip);
    let allowed = check_rate_limit(&mut con, &key, state.config.rate_limit_auth_per_min, 60)
        .await
        .map_err(|e| AppError::Internal(format!("Rate limit check failed: {}", e)))?;

    if !allowed {
        let mut hasher = std::hash::DefaultHasher::new();
        ip.hash(&mut hasher);
        let ip_hash = format!("{:x}", hasher.finish());
        tracing::warn!(action = "rate_limited", endpoint = %endpoint, ip_hash = %ip_hash, "Rate limit exceeded");
        return Err(AppError::RateLimited);
    }

    Ok(())
}

#[cfg(test)]
pub(crate) async fn test_state() -> AppState {
    AppState::new(
        storage::test_db().await,
        None,
        crate::config::test_config(),
    )
}
