mod hashing;
pub mod password;
pub mod session_token;

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use chrono::Utc;
use tradefy_common::error::{AppError, AppResult};

use crate::state::AppState;
use crate::stores::session::{SessionRecord, SessionStore};
use crate::stores::user::{UserRecord, UserStore};
use session_token::SessionToken;

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ")
}

/// Resolves the bearer token to a live session.
pub async fn current_session(state: &AppState, headers: &HeaderMap) -> AppResult<SessionRecord> {
    let token = SessionToken::parse(bearer_token(headers).ok_or(AppError::Unauthorized)?)?;

    let session = SessionStore::new(state.db_pool.clone())
        .find(&token.lookup_key)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if session.user_id != token.user_id
        || session.is_expired(Utc::now())
        || !token.matches(&session.secret_hash)?
    {
        return Err(AppError::Unauthorized);
    }
    Ok(session)
}

/// The signed-in user. Deactivated accounts are treated as signed out.
pub async fn current_user(state: &AppState, headers: &HeaderMap) -> AppResult<UserRecord> {
    let session = current_session(state, headers).await?;
    let user = UserStore::new(state.db_pool.clone())
        .get(session.user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !user.is_active {
        return Err(AppError::Unauthorized);
    }
    Ok(user)
}

pub async fn require_admin(state: &AppState, headers: &HeaderMap) -> AppResult<UserRecord> {
    let user = current_user(state, headers).await?;
    if !user.is_superuser {
        return Err(AppError::Forbidden);
    }
    Ok(user)
}
