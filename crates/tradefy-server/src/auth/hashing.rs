use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use tradefy_common::error::{AppError, AppResult};

/// Salted argon2 PHC string for a password or session secret.
pub(crate) fn hash_secret(secret: &[u8]) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret, &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AppError::Internal)
}

/// `Ok(false)` on mismatch. A stored value that is not a PHC string is a
/// server fault and surfaces as `External`, labelled with `what`.
pub(crate) fn verify_secret(stored_hash: &str, candidate: &[u8], what: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| AppError::External(format!("invalid stored {what} hash: {e}")))?;

    Ok(Argon2::default().verify_password(candidate, &parsed).is_ok())
}
