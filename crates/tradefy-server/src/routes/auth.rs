use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use tracing::info;
use tradefy_common::api::{LoginRequest, LoginResponse, RegisterRequest};
use tradefy_common::error::AppError;

use crate::auth::current_session;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::session_token::SessionToken;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::stores::session::SessionStore;
use crate::stores::user::{NewUser, UserRecord, UserStore};

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserRecord>), ApiError> {
    payload.validate()?;

    let username = payload.username.trim().to_string();
    let country = payload
        .country
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| state.config.default_country.clone());

    let user = UserStore::new(state.db_pool.clone())
        .create(NewUser {
            is_superuser: state.config.is_admin_username(&username),
            username,
            email: payload.email.trim().to_string(),
            password_hash: hash_password(&payload.password)?,
            full_name: payload.full_name,
            country: Some(country),
            city: payload.city,
            phone_number: payload.phone_number,
            profile_picture: payload.profile_picture,
        })
        .await?;

    info!(user_id = user.id, admin = user.is_superuser, "user registered");
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let user = UserStore::new(state.db_pool.clone())
        .get_by_username(payload.username.trim())
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !verify_password(&user.password_hash, &payload.password)? || !user.is_active {
        return Err(AppError::Unauthorized.into());
    }

    let token = SessionToken::mint(user.id);
    let session = SessionStore::new(state.db_pool.clone())
        .create(
            user.id,
            &token.lookup_key,
            &token.hash_secret()?,
            state.config.session_ttl_hours,
        )
        .await?;

    info!(user_id = user.id, "session issued");
    Ok(Json(LoginResponse {
        token: token.encode(),
        token_type: "bearer".to_string(),
        expires_at: session.expires_at,
    }))
}

pub async fn logout(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let session = current_session(&state, &headers).await?;
    SessionStore::new(state.db_pool.clone())
        .delete(&session.lookup_key)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::routes::test_support::{send, signup, test_app, TEST_PASSWORD};

    #[tokio::test]
    async fn login_me_logout_cycle() {
        let (app, _) = test_app().await;
        let (user_id, token) = signup(&app, "kofi", "Bénin").await;

        let (status, me) = send(&app, Method::GET, "/api/v1/users/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["id"], user_id);
        assert_eq!(me["rank"], "profane");
        assert!(me.get("password_hash").is_none());

        let (status, _) = send(&app, Method::POST, "/api/v1/auth/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&app, Method::GET, "/api/v1/users/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "unauthorized");
    }

    #[tokio::test]
    async fn token_bound_to_another_user_is_rejected() {
        let (app, _) = test_app().await;
        let (kofi_id, token) = signup(&app, "kofi", "Bénin").await;
        let (ama_id, _) = signup(&app, "ama", "Bénin").await;

        let forged = token.replacen(&format!("tfs_{kofi_id}."), &format!("tfs_{ama_id}."), 1);
        assert_ne!(forged, token);
        let (status, _) = send(&app, Method::GET, "/api/v1/users/me", Some(&forged), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let (app, _) = test_app().await;
        signup(&app, "kofi", "Bénin").await;

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({"username": "kofi", "password": "not-the-password"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let (app, _) = test_app().await;
        signup(&app, "kofi", "Bénin").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({
                "username": "kofi",
                "email": "other@example.com",
                "password": TEST_PASSWORD,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "conflict");
    }

    #[tokio::test]
    async fn registration_defaults_country_and_flags_admins() {
        let (app, _) = test_app().await;
        let (status, user) = send(
            &app,
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({
                "username": "admin",
                "email": "admin@example.com",
                "password": TEST_PASSWORD,
            })),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(user["country"], "Bénin");
        assert_eq!(user["is_superuser"], true);
        assert_eq!(user["sales_count"], 0);
        assert_eq!(user["commission_rate"], 4.5);
    }

    #[tokio::test]
    async fn short_password_is_invalid_input() {
        let (app, _) = test_app().await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({"username": "kofi", "email": "kofi@example.com", "password": "short"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_input");
    }
}
