//! Argon2id hashing for account passwords and service client secrets

use crate::error::{ApiError, Result};
use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};

/// Hash a secret into a PHC string suitable for storage
pub fn hash_password(password: &str) -> Result<String> {
    if password.is_empty() {
        return Err(ApiError::InvalidRequest("password must not be empty".into()));
    }

    let salt = SaltString::generate(rand::thread_rng());
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| ApiError::Internal("Failed to hash password".to_string()))?
        .to_string();

    Ok(password_hash)
}

/// Check a secret against a stored hash.
///
/// A mismatch is `Ok(false)`; an unparseable stored hash is an internal error.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| ApiError::Internal("Invalid password hash format".to_string()))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
