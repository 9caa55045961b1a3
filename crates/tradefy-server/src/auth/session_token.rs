use tradefy_common::error::{AppError, AppResult};
use uuid::Uuid;

use super::hashing::{hash_secret, verify_secret};

pub const SESSION_TOKEN_PREFIX: &str = "tfs_";
const LOOKUP_KEY_LEN: usize = 12;
const SECRET_LEN: usize = 32;

/// Bearer token of the form `tfs_<user_id>.<lookup_key>.<secret>`.
///
/// The lookup key is stored in clear and finds the session row; only an
/// argon2 hash of the secret is stored. The user id must match the row the
/// key resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub user_id: i64,
    pub lookup_key: String,
    secret: String,
}

impl SessionToken {
    pub fn mint(user_id: i64) -> Self {
        let mut lookup_key = Uuid::new_v4().simple().to_string();
        lookup_key.truncate(LOOKUP_KEY_LEN);
        Self {
            user_id,
            lookup_key,
            secret: Uuid::new_v4().simple().to_string(),
        }
    }

    /// Any malformed token reads as signed out.
    pub fn parse(raw: &str) -> AppResult<Self> {
        let body = raw
            .strip_prefix(SESSION_TOKEN_PREFIX)
            .ok_or(AppError::Unauthorized)?;
        let mut parts = body.splitn(3, '.');
        let (Some(user_id), Some(lookup_key), Some(secret)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(AppError::Unauthorized);
        };

        let user_id = user_id.parse::<i64>().map_err(|_| AppError::Unauthorized)?;
        if user_id <= 0 || !is_hex(lookup_key, LOOKUP_KEY_LEN) || !is_hex(secret, SECRET_LEN) {
            return Err(AppError::Unauthorized);
        }

        Ok(Self {
            user_id,
            lookup_key: lookup_key.to_string(),
            secret: secret.to_string(),
        })
    }

    pub fn encode(&self) -> String {
        format!(
            "{SESSION_TOKEN_PREFIX}{}.{}.{}",
            self.user_id, self.lookup_key, self.secret
        )
    }

    pub fn hash_secret(&self) -> AppResult<String> {
        hash_secret(self.secret.as_bytes())
    }

    pub fn matches(&self, secret_hash: &str) -> AppResult<bool> {
        verify_secret(secret_hash, self.secret.as_bytes(), "session")
    }
}

fn is_hex(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::SessionToken;

    #[test]
    fn minted_token_survives_the_wire_and_matches_its_hash() {
        let minted = SessionToken::mint(42);
        let raw = minted.encode();
        assert!(raw.starts_with("tfs_42."));

        let parsed = SessionToken::parse(&raw).expect("parse");
        assert_eq!(parsed, minted);

        let hash = minted.hash_secret().expect("hash");
        assert!(parsed.matches(&hash).expect("verify"));
        assert!(!SessionToken::mint(42).matches(&hash).expect("verify other"));
    }

    #[test]
    fn malformed_tokens_are_unauthorized() {
        let good = SessionToken::mint(7).encode();
        let cases = [
            good.replacen("tfs_", "ees_", 1),
            good.replacen("tfs_7", "tfs_x", 1),
            good.replacen("tfs_7", "tfs_-7", 1),
            format!("{good}0"),
            "tfs_7.short.secret".to_string(),
            "tfs_7".to_string(),
            String::new(),
        ];
        for raw in cases {
            assert!(SessionToken::parse(&raw).is_err(), "{raw} should not parse");
        }
    }

    #[test]
    fn lookup_keys_differ_between_mints() {
        let first = SessionToken::mint(1);
        let second = SessionToken::mint(1);
        assert_ne!(first.lookup_key, second.lookup_key);
        assert_eq!(first.lookup_key.len(), 12);
    }
}
