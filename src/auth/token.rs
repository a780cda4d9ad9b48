//! Signed session tokens (HS256 JWT).
//!
//! Two decoding paths exist and are kept apart by type:
//! - [`TokenService::verify`] checks signature and expiry and yields
//!   [`VerifiedClaims`], the only value a [`Session`] can be built from.
//! - [`decode_unverified`] only base64-decodes the payload and yields
//!   [`UnverifiedClaims`]. It is for best-effort attribution (logout audit
//!   entries) and must never feed an access decision.

use super::session::Session;
use crate::models::{Account, Role};
use chrono::{TimeDelta, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,

    #[error("token expired")]
    Expired,

    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Who a token is issued for.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub photo: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
}

impl Identity {
    pub fn from_account(account: &Account) -> Self {
        Identity {
            id: account.id.clone(),
            name: account.name.clone(),
            surname: account.surname.clone(),
            email: account.email.clone(),
            photo: account.photo.clone(),
            phone: account.phone.clone(),
            role: account.kind.role(),
        }
    }
}

/// Wire format of the token payload. Both role flags travel in the token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionClaims {
    sub: String,
    name: String,
    surname: String,
    email: String,
    #[serde(default)]
    photo: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    is_admin: bool,
    is_professor: bool,
    iat: i64,
    exp: i64,
    jti: String,
}

/// Claims whose signature and expiry have been checked.
#[derive(Debug, Clone)]
pub struct VerifiedClaims(SessionClaims);

impl VerifiedClaims {
    pub fn account_id(&self) -> &str {
        &self.0.sub
    }

    pub fn jti(&self) -> &str {
        &self.0.jti
    }

    pub fn expires_at(&self) -> i64 {
        self.0.exp
    }

    /// Role encoded by the flags. Exactly one flag must be set.
    pub fn role(&self) -> Result<Role, TokenError> {
        match (self.0.is_admin, self.0.is_professor) {
            (true, false) => Ok(Role::Admin),
            (false, true) => Ok(Role::Professor),
            _ => Err(TokenError::Invalid),
        }
    }

    pub fn into_session(self) -> Result<Session, TokenError> {
        let role = self.role()?;
        let c = self.0;
        Ok(Session {
            account_id: c.sub,
            name: c.name,
            surname: c.surname,
            email: c.email,
            photo: c.photo,
            phone: c.phone,
            role,
            jti: c.jti,
            expires_at: c.exp,
        })
    }
}

/// Claims read without any signature check. Display and logging only.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UnverifiedClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub surname: Option<String>,
}

/// Issues and verifies session tokens with a shared HMAC secret.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: TimeDelta,
}

impl TokenService {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        TokenService {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: TimeDelta::seconds(ttl_secs as i64),
        }
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl.num_seconds()
    }

    /// Issue a token valid for the configured lifetime.
    pub fn issue(&self, identity: &Identity) -> Result<String, TokenError> {
        self.issue_with_ttl(identity, self.ttl)
    }

    pub fn issue_with_ttl(&self, identity: &Identity, ttl: TimeDelta) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: identity.id.clone(),
            name: identity.name.clone(),
            surname: identity.surname.clone(),
            email: identity.email.clone(),
            photo: identity.photo.clone(),
            phone: identity.phone.clone(),
            is_admin: identity.role == Role::Admin,
            is_professor: identity.role == Role::Professor,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Check signature and expiry.
    pub fn verify(&self, token: &str) -> Result<VerifiedClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<SessionClaims>(token, &self.decoding, &validation)
            .map(|data| VerifiedClaims(data.claims))
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }
}

/// Read the payload of a token without checking its signature or expiry.
///
/// Returns `None` when the token is not structurally a JWT.
pub fn decode_unverified(token: &str) -> Option<UnverifiedClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<UnverifiedClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .ok()
        .map(|data| data.claims)
}
