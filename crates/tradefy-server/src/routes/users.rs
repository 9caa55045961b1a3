use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use tracing::info;
use tradefy_common::api::{
    ChangePasswordRequest, MessageResponse, UpdateProfileRequest, UserStatsResponse,
};
use tradefy_common::error::AppError;
use tradefy_common::leaderboard::PageRequest;

use super::PageQuery;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::{current_user, require_admin};
use crate::error::ApiResult;
use crate::state::AppState;
use crate::stores::product::ProductStore;
use crate::stores::session::SessionStore;
use crate::stores::user::{UserRecord, UserStore};

pub async fn me(headers: HeaderMap, State(state): State<AppState>) -> ApiResult<UserRecord> {
    Ok(Json(current_user(&state, &headers).await?))
}

pub async fn update_me(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> ApiResult<UserRecord> {
    let user = current_user(&state, &headers).await?;
    payload.validate()?;

    let updated = UserStore::new(state.db_pool.clone())
        .update_profile(user.id, &payload)
        .await?;
    Ok(Json(updated))
}

pub async fn change_password(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(payload): Json<ChangePasswordRequest>,
) -> ApiResult<MessageResponse> {
    let user = current_user(&state, &headers).await?;
    if !verify_password(&user.password_hash, &payload.current_password)? {
        return Err(AppError::InvalidInput("current password is incorrect".to_string()).into());
    }

    let new_hash = hash_password(&payload.new_password)?;
    UserStore::new(state.db_pool.clone())
        .update_password_hash(user.id, &new_hash)
        .await?;

    let revoked = SessionStore::new(state.db_pool.clone())
        .delete_for_user(user.id)
        .await?;

    info!(user_id = user.id, revoked_sessions = revoked, "password changed");
    Ok(Json(MessageResponse {
        message: "password updated; sign in again".to_string(),
    }))
}

pub async fn stats(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> ApiResult<UserStatsResponse> {
    let user = current_user(&state, &headers).await?;
    let total_products = ProductStore::new(state.db_pool.clone())
        .count_by_owner(user.id)
        .await?;

    let standing = user.standing;
    let progress = standing.progress();
    Ok(Json(UserStatsResponse {
        total_products,
        total_sales: standing.sales_count(),
        total_earnings: standing.total_earnings(),
        commission_rate: standing.commission_rate(),
        rank: standing.rank(),
        rank_progress: progress.percent_to_next,
        next_rank: progress.next_rank,
        sales_to_next_rank: progress.sales_remaining,
    }))
}

pub async fn get_user(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<UserRecord> {
    let caller = current_user(&state, &headers).await?;
    if caller.id != user_id && !caller.is_superuser {
        return Err(AppError::Forbidden.into());
    }

    let user = UserStore::new(state.db_pool.clone())
        .get(user_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(user))
}

pub async fn list_users(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Vec<UserRecord>> {
    require_admin(&state, &headers).await?;
    let page = PageRequest::new(query.offset, query.limit, state.config.leaderboard_max_limit)?;

    Ok(Json(UserStore::new(state.db_pool.clone()).list(page).await?))
}
