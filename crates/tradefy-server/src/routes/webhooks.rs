use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, warn};
use tradefy_common::api::{MessageResponse, PaymentWebhookPayload};
use tradefy_common::error::{AppError, AppResult};
use tradefy_common::sale::{SaleAction, SaleStatus};

use super::sales::apply_sale_action;
use crate::error::ApiResult;
use crate::state::AppState;
use crate::stores::sale::SaleStore;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-tradefy-signature";

/// Payment provider callback. Only `succeeded` events move a sale; a replay
/// for a sale already confirmed with the same reference is acknowledged.
pub async fn payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<MessageResponse> {
    let secret = state
        .config
        .webhook_secret
        .as_deref()
        .ok_or_else(|| AppError::Config("payment webhook is not configured".to_string()))?;
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::Unauthorized)?;
    verify_signature(secret, &body, signature)?;

    let event: PaymentWebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::InvalidInput(format!("invalid webhook payload: {e}")))?;
    if event.status != "succeeded" {
        debug!(sale_id = event.sale_id, status = %event.status, "payment event ignored");
        return Ok(Json(message("ignored")));
    }

    let sale = SaleStore::new(state.db_pool.clone())
        .get(event.sale_id)
        .await?
        .ok_or(AppError::NotFound)?;
    if sale.status != SaleStatus::Pending
        && sale.payment_reference.as_deref() == Some(event.reference.as_str())
    {
        return Ok(Json(message("already confirmed")));
    }

    apply_sale_action(
        &state,
        event.sale_id,
        SaleAction::ConfirmPayment,
        Some(&event.reference),
    )
    .await?;
    Ok(Json(message("payment confirmed")))
}

pub fn sign(secret: &str, body: &[u8]) -> AppResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AppError::Internal)?;
    mac.update(body);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

fn verify_signature(secret: &str, body: &[u8], signature: &str) -> AppResult<()> {
    let provided = signature
        .strip_prefix("sha256=")
        .and_then(|digest| hex::decode(digest).ok())
        .ok_or(AppError::Unauthorized)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AppError::Internal)?;
    mac.update(body);
    mac.verify_slice(&provided).map_err(|_| {
        warn!("payment webhook signature mismatch");
        AppError::Unauthorized
    })
}

fn message(text: &str) -> MessageResponse {
    MessageResponse {
        message: text.to_string(),
    }
}
