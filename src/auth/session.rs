//! Request-scoped session identity and reset token generation.

use crate::models::{Role, SessionInfo};
use base64::{engine::general_purpose, Engine as _};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Identity resolved from a verified token for the current request.
///
/// Only [`VerifiedClaims::into_session`](super::token::VerifiedClaims::into_session)
/// constructs one; outside the auth module it is read-only.
#[derive(Debug, Clone)]
pub struct Session {
    pub(super) account_id: String,
    pub(super) name: String,
    pub(super) surname: String,
    pub(super) email: String,
    pub(super) photo: Option<String>,
    pub(super) phone: Option<String>,
    pub(super) role: Role,
    pub(super) jti: String,
    pub(super) expires_at: i64,
}

impl Session {
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Token id, for the denylist.
    pub fn jti(&self) -> &str {
        &self.jti
    }

    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.account_id.clone(),
            name: self.name.clone(),
            surname: self.surname.clone(),
            email: self.email.clone(),
            photo: self.photo.clone(),
            phone: self.phone.clone(),
            role: self.role,
            expires_at: self.expires_at,
        }
    }
}

/// Generate a password reset token.
///
/// Returns a URL-safe base64 string (43 characters) from 32 random bytes.
pub fn generate_reset_token() -> String {
    let mut rng = rand::rng();
    let mut bytes = [0u8; 32];
    rng.fill(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 hex digest of a reset token. Only the digest is stored.
pub fn digest_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
