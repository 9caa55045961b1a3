use tradefy_common::api::validate_password;
use tradefy_common::error::AppResult;

use super::hashing::{hash_secret, verify_secret};

pub fn hash_password(password: &str) -> AppResult<String> {
    validate_password(password)?;
    hash_secret(password.as_bytes())
}

pub fn verify_password(stored_hash: &str, candidate: &str) -> AppResult<bool> {
    verify_secret(stored_hash, candidate.as_bytes(), "password")
}
