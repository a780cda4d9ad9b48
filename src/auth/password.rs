//! Password hashing and policy checks.
//!
//! Hashes are Argon2id PHC strings, so the seeded admin hash from
//! `ADMIN_PASSWORD_HASH` and hashes written at runtime verify the same way.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::Rng;

/// Minimum length for a password chosen in settings.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Minimum length for a password chosen through a reset link.
pub const MIN_RESET_PASSWORD_LEN: usize = 8;

/// Length of generated temporary passwords.
pub const TEMPORARY_PASSWORD_LEN: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// Hash a plaintext password into a PHC string.
pub fn hash(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| PasswordError::Hash(e.to_string()))
}

/// Check a plaintext password against a stored PHC string.
///
/// A malformed stored hash never matches.
pub fn verify(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash is not a PHC string");
            false
        }
    }
}

/// Settings password policy. Returns the first failing rule's message.
pub fn validate_policy(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Le nouveau mot de passe doit contenir au moins {} caractères",
            MIN_PASSWORD_LEN
        ));
    }
    if !password.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err("Le mot de passe doit contenir des lettres".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Le mot de passe doit contenir des chiffres".to_string());
    }
    Ok(())
}

/// Random alphanumeric password handed to newly created professors.
///
/// Always contains at least one letter and one digit so it satisfies
/// [`validate_policy`].
pub fn generate_temporary_password() -> String {
    let mut rng = rand::rng();
    loop {
        let candidate: String = (&mut rng)
            .sample_iter(&rand::distr::Alphanumeric)
            .take(TEMPORARY_PASSWORD_LEN)
            .map(char::from)
            .collect();
        if validate_policy(&candidate).is_ok() {
            return candidate;
        }
    }
}
