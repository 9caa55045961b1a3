use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use tracing::{info, warn};
use tradefy_common::api::{ConfirmPaymentRequest, CreateSaleRequest};
use tradefy_common::commission::split_sale;
use tradefy_common::error::{AppError, AppResult};
use tradefy_common::sale::{SaleAction, SaleStatus};
use tradefy_common::types::ProductStatus;

use crate::auth::current_user;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::stores::product::ProductStore;
use crate::stores::sale::{NewSale, SaleRecord, SaleStore};
use crate::stores::user::{UserRecord, UserStore};

/// Checkout. The seller's current rate is captured on the sale and never
/// recomputed, whatever happens to the seller's rank later.
pub async fn create(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(payload): Json<CreateSaleRequest>,
) -> Result<(StatusCode, Json<SaleRecord>), ApiError> {
    let buyer = current_user(&state, &headers).await?;
    let product = ProductStore::new(state.db_pool.clone())
        .get(payload.product_id)
        .await?
        .ok_or(AppError::NotFound)?;

    if product.status != ProductStatus::Published {
        return Err(AppError::Conflict(format!(
            "product {} is not available for sale",
            product.id
        ))
        .into());
    }
    if product.owner_id == buyer.id {
        return Err(AppError::InvalidInput("cannot buy your own product".to_string()).into());
    }

    let seller = UserStore::new(state.db_pool.clone())
        .get(product.owner_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let amounts = split_sale(product.price, seller.standing.commission_rate())?;

    let sale = SaleStore::new(state.db_pool.clone())
        .create(NewSale {
            product_id: product.id,
            seller_id: seller.id,
            buyer_id: buyer.id,
            amounts,
            payment_method: payload.payment_method,
        })
        .await?;

    info!(
        sale_id = sale.id,
        product_id = product.id,
        seller_id = seller.id,
        buyer_id = buyer.id,
        sale_price = sale.sale_price,
        commission_rate = sale.commission_rate,
        "sale created"
    );
    Ok((StatusCode::CREATED, Json(sale)))
}

pub async fn list(headers: HeaderMap, State(state): State<AppState>) -> ApiResult<Vec<SaleRecord>> {
    let user = current_user(&state, &headers).await?;
    let sales = SaleStore::new(state.db_pool.clone())
        .list_for_user(user.id)
        .await?;
    Ok(Json(sales))
}

pub async fn get(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(sale_id): Path<i64>,
) -> ApiResult<SaleRecord> {
    let user = current_user(&state, &headers).await?;
    let sale = load_sale(&state, sale_id).await?;
    if !user.is_superuser && user.id != sale.buyer_id && user.id != sale.seller_id {
        return Err(AppError::Forbidden.into());
    }
    Ok(Json(sale))
}

pub async fn confirm_payment(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(sale_id): Path<i64>,
    Json(payload): Json<ConfirmPaymentRequest>,
) -> ApiResult<SaleRecord> {
    let reference = payload.reference.trim();
    if reference.is_empty() {
        return Err(AppError::InvalidInput("payment reference is required".to_string()).into());
    }
    act(&state, &headers, sale_id, SaleAction::ConfirmPayment, Some(reference)).await
}

pub async fn ship(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(sale_id): Path<i64>,
) -> ApiResult<SaleRecord> {
    act(&state, &headers, sale_id, SaleAction::Ship, None).await
}

pub async fn deliver(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(sale_id): Path<i64>,
) -> ApiResult<SaleRecord> {
    act(&state, &headers, sale_id, SaleAction::Deliver, None).await
}

pub async fn cancel(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(sale_id): Path<i64>,
) -> ApiResult<SaleRecord> {
    act(&state, &headers, sale_id, SaleAction::Cancel, None).await
}

pub async fn refund(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(sale_id): Path<i64>,
) -> ApiResult<SaleRecord> {
    act(&state, &headers, sale_id, SaleAction::Refund, None).await
}

async fn act(
    state: &AppState,
    headers: &HeaderMap,
    sale_id: i64,
    action: SaleAction,
    payment_reference: Option<&str>,
) -> ApiResult<SaleRecord> {
    let user = current_user(state, headers).await?;
    let sale = load_sale(state, sale_id).await?;
    if !may_perform(&user, &sale, action) {
        return Err(AppError::Forbidden.into());
    }

    Ok(Json(apply_sale_action(state, sale_id, action, payment_reference).await?))
}

/// Which party may drive each step: the buyer pays and signs for delivery,
/// the seller ships and refunds, either side may cancel.
fn may_perform(user: &UserRecord, sale: &SaleRecord, action: SaleAction) -> bool {
    if user.is_superuser {
        return true;
    }
    let is_buyer = user.id == sale.buyer_id;
    let is_seller = user.id == sale.seller_id;
    match action {
        SaleAction::ConfirmPayment | SaleAction::Deliver => is_buyer,
        SaleAction::Ship | SaleAction::Refund => is_seller,
        SaleAction::Cancel => is_buyer || is_seller,
    }
}

/// Runs a guarded transition and logs the economic event it produced.
pub(crate) async fn apply_sale_action(
    state: &AppState,
    sale_id: i64,
    action: SaleAction,
    payment_reference: Option<&str>,
) -> AppResult<SaleRecord> {
    let transition = SaleStore::new(state.db_pool.clone())
        .apply_action(sale_id, action, payment_reference)
        .await?;
    let sale = &transition.sale;

    match action {
        SaleAction::ConfirmPayment => {
            info!(sale_id, reference = ?sale.payment_reference, "payment confirmed");
        }
        SaleAction::Deliver => {
            if let Some(standing) = transition.seller {
                info!(
                    sale_id,
                    seller_id = sale.seller_id,
                    sales_count = standing.sales_count(),
                    rank = %standing.rank(),
                    "sale delivered"
                );
            }
            if let Some(promotion) = transition.promotion {
                info!(
                    seller_id = sale.seller_id,
                    from = %promotion.from,
                    to = %promotion.to,
                    "seller promoted"
                );
            }
        }
        SaleAction::Refund if transition.previous == SaleStatus::Delivered => {
            warn!(
                sale_id,
                seller_id = sale.seller_id,
                "delivered sale refunded; seller counters left unchanged"
            );
        }
        _ => {
            info!(sale_id, status = %sale.status, "sale status changed");
        }
    }

    Ok(transition.sale)
}

async fn load_sale(state: &AppState, sale_id: i64) -> AppResult<SaleRecord> {
    SaleStore::new(state.db_pool.clone())
        .get(sale_id)
        .await?
        .ok_or(AppError::NotFound)
}
