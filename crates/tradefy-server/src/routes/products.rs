use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use tracing::info;
use tradefy_common::api::{CreateProductRequest, UpdateProductRequest};
use tradefy_common::error::{AppError, AppResult};
use tradefy_common::leaderboard::PageRequest;
use tradefy_common::types::{ProductCategory, ProductStatus};

use crate::auth::current_user;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::stores::product::{ProductFilter, ProductRecord, ProductStore};
use crate::stores::user::UserRecord;

#[derive(Debug, Default, Deserialize)]
pub struct ProductListQuery {
    pub category: Option<String>,
    pub country: Option<String>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn create(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(mut payload): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductRecord>), ApiError> {
    let user = current_user(&state, &headers).await?;
    payload.validate()?;
    if payload.country.is_none() {
        payload.country = user.country.clone();
    }

    let product = ProductStore::new(state.db_pool.clone())
        .create(user.id, &payload)
        .await?;
    info!(product_id = product.id, owner_id = user.id, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> ApiResult<Vec<ProductRecord>> {
    let filter = ProductFilter {
        category: query.category.as_deref().map(str::parse::<ProductCategory>).transpose()?,
        country: query.country.filter(|c| !c.trim().is_empty()),
    };
    let page = PageRequest::new(query.offset, query.limit, state.config.leaderboard_max_limit)?;

    let products = ProductStore::new(state.db_pool.clone())
        .list_published(&filter, page)
        .await?;
    Ok(Json(products))
}

pub async fn mine(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> ApiResult<Vec<ProductRecord>> {
    let user = current_user(&state, &headers).await?;
    let products = ProductStore::new(state.db_pool.clone())
        .list_by_owner(user.id)
        .await?;
    Ok(Json(products))
}

/// Published listings are public; anything else is only visible to its owner
/// or an admin and reads as missing to everyone else.
pub async fn get(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> ApiResult<ProductRecord> {
    let product = ProductStore::new(state.db_pool.clone())
        .get(product_id)
        .await?
        .ok_or(AppError::NotFound)?;
    if product.status == ProductStatus::Published {
        return Ok(Json(product));
    }

    match current_user(&state, &headers).await {
        Ok(user) if can_manage(&user, &product) => Ok(Json(product)),
        _ => Err(AppError::NotFound.into()),
    }
}

pub async fn update(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
    Json(payload): Json<UpdateProductRequest>,
) -> ApiResult<ProductRecord> {
    let user = current_user(&state, &headers).await?;
    payload.validate()?;
    let store = ProductStore::new(state.db_pool.clone());
    let product = managed_product(&store, &user, product_id).await?;
    if product.status == ProductStatus::Sold {
        return Err(AppError::Conflict("sold products cannot be edited".to_string()).into());
    }

    Ok(Json(store.update(product_id, &payload).await?))
}

pub async fn delete(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let user = current_user(&state, &headers).await?;
    let store = ProductStore::new(state.db_pool.clone());
    managed_product(&store, &user, product_id).await?;

    store.delete(product_id).await?;
    info!(product_id, "product deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn publish(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> ApiResult<ProductRecord> {
    change_status(&state, &headers, product_id, ProductStatus::Published).await
}

pub async fn archive(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> ApiResult<ProductRecord> {
    change_status(&state, &headers, product_id, ProductStatus::Archived).await
}

async fn change_status(
    state: &AppState,
    headers: &HeaderMap,
    product_id: i64,
    status: ProductStatus,
) -> ApiResult<ProductRecord> {
    let user = current_user(state, headers).await?;
    let store = ProductStore::new(state.db_pool.clone());
    let product = managed_product(&store, &user, product_id).await?;
    if product.status == ProductStatus::Sold {
        return Err(AppError::Conflict(format!(
            "product {product_id} is sold and cannot be {}",
            status.as_str()
        ))
        .into());
    }

    let product = store.set_status(product_id, status).await?;
    info!(product_id, status = status.as_str(), "product status changed");
    Ok(Json(product))
}

async fn managed_product(
    store: &ProductStore,
    user: &UserRecord,
    product_id: i64,
) -> AppResult<ProductRecord> {
    let product = store.get(product_id).await?.ok_or(AppError::NotFound)?;
    if !can_manage(user, &product) {
        return Err(AppError::Forbidden);
    }
    Ok(product)
}

fn can_manage(user: &UserRecord, product: &ProductRecord) -> bool {
    user.is_superuser || product.owner_id == user.id
}
