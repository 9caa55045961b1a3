use chrono::Utc;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{SqliteConnection, SqlitePool};
use tradefy_common::commission::SaleAmounts;
use tradefy_common::error::{AppError, AppResult};
use tradefy_common::sale::{SaleAction, SaleStatus};
use tradefy_common::standing::{Promotion, SellerStanding};
use tradefy_common::types::{PaymentMethod, ProductStatus};

use super::column;
use super::user::record_completed_sale;
use crate::db::store_error;

const SALE_COLUMNS: &str = "id, product_id, seller_id, buyer_id, sale_price, commission_rate, \
     commission_amount, seller_earnings, payment_method, payment_reference, payment_confirmed, \
     status, created_at, updated_at, paid_at, completed_at";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaleRecord {
    pub id: i64,
    pub product_id: i64,
    pub seller_id: i64,
    pub buyer_id: i64,
    pub sale_price: f64,
    /// Rate captured at checkout; never recomputed afterwards.
    pub commission_rate: f64,
    pub commission_amount: f64,
    pub seller_earnings: f64,
    pub payment_method: PaymentMethod,
    pub payment_reference: Option<String>,
    pub payment_confirmed: bool,
    pub status: SaleStatus,
    pub created_at: String,
    pub updated_at: String,
    pub paid_at: Option<String>,
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSale {
    pub product_id: i64,
    pub seller_id: i64,
    pub buyer_id: i64,
    pub amounts: SaleAmounts,
    pub payment_method: PaymentMethod,
}

/// Outcome of a status change. `seller` is set only for deliveries.
#[derive(Debug, Clone, PartialEq)]
pub struct SaleTransition {
    pub previous: SaleStatus,
    pub sale: SaleRecord,
    pub seller: Option<SellerStanding>,
    pub promotion: Option<Promotion>,
}

#[derive(Clone)]
pub struct SaleStore {
    pool: SqlitePool,
}

impl SaleStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens a pending sale. A product holds at most one open sale; the check
    /// and the insert are one statement, so racing checkouts cannot both win.
    pub async fn create(&self, sale: NewSale) -> AppResult<SaleRecord> {
        let now = Utc::now().to_rfc3339();
        let [pending, paid, shipped] = SaleStatus::OPEN;
        let result = sqlx::query(
            "INSERT INTO sales (product_id, seller_id, buyer_id, sale_price, commission_rate, \
             commission_amount, seller_earnings, payment_method, status, created_at, updated_at) \
             SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10 \
             WHERE NOT EXISTS (SELECT 1 FROM sales WHERE product_id = ?1 \
             AND status IN (?11, ?12, ?13))",
        )
        .bind(sale.product_id)
        .bind(sale.seller_id)
        .bind(sale.buyer_id)
        .bind(sale.amounts.sale_price)
        .bind(sale.amounts.commission_rate)
        .bind(sale.amounts.commission_amount)
        .bind(sale.amounts.seller_earnings)
        .bind(sale.payment_method.as_str())
        .bind(SaleStatus::Pending.as_str())
        .bind(&now)
        .bind(pending.as_str())
        .bind(paid.as_str())
        .bind(shipped.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("failed to create sale", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "product {} already has an open sale",
                sale.product_id
            )));
        }

        self.get(result.last_insert_rowid())
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn get(&self, id: i64) -> AppResult<Option<SaleRecord>> {
        let row = sqlx::query(&format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("failed to fetch sale", e))?;

        row.map(row_to_sale).transpose()
    }

    /// Sales where `user_id` is the buyer or the seller, newest first.
    pub async fn list_for_user(&self, user_id: i64) -> AppResult<Vec<SaleRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE buyer_id = ?1 OR seller_id = ?1 \
             ORDER BY id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("failed to list sales", e))?;

        rows.into_iter().map(row_to_sale).collect()
    }

    /// Applies `action` to the sale in one transaction.
    ///
    /// The status write is conditional on the status read at the start, so of
    /// two racing requests only one succeeds and the other gets `Conflict`. A
    /// delivery also credits the seller and marks the product sold before the
    /// transaction commits.
    pub async fn apply_action(
        &self,
        id: i64,
        action: SaleAction,
        payment_reference: Option<&str>,
    ) -> AppResult<SaleTransition> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("failed to begin transaction", e))?;

        let now = Utc::now().to_rfc3339();
        // Write first so the transaction owns the database write lock before the
        // status is read; a racing request waits here instead of deadlocking on
        // lock upgrade.
        let touched = sqlx::query("UPDATE sales SET updated_at = ?1 WHERE id = ?2")
            .bind(&now)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| store_error("failed to lock sale", e))?;
        if touched.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        let current = fetch_sale(&mut tx, id).await?.ok_or(AppError::NotFound)?;
        let next = current.status.apply(action)?;

        let query = match action {
            SaleAction::ConfirmPayment => sqlx::query(
                "UPDATE sales SET status = ?1, payment_confirmed = 1, payment_reference = ?2, \
                 paid_at = ?3, updated_at = ?3 WHERE id = ?4 AND status = ?5",
            )
            .bind(next.as_str())
            .bind(payment_reference),
            SaleAction::Deliver => sqlx::query(
                "UPDATE sales SET status = ?1, completed_at = ?2, updated_at = ?2 \
                 WHERE id = ?3 AND status = ?4",
            )
            .bind(next.as_str()),
            SaleAction::Ship | SaleAction::Cancel | SaleAction::Refund => sqlx::query(
                "UPDATE sales SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
            )
            .bind(next.as_str()),
        };

        let result = query
            .bind(&now)
            .bind(id)
            .bind(current.status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| store_error("failed to update sale status", e))?;
        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "sale {id} changed status concurrently"
            )));
        }

        let (seller, promotion) = if action == SaleAction::Deliver {
            let (standing, promotion) =
                record_completed_sale(&mut tx, current.seller_id, current.seller_earnings).await?;

            let marked = sqlx::query(
                "UPDATE products SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status != ?1",
            )
            .bind(ProductStatus::Sold.as_str())
            .bind(&now)
            .bind(current.product_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| store_error("failed to mark product sold", e))?;
            // dropping `tx` rolls the seller credit back
            if marked.rows_affected() == 0 {
                return Err(AppError::Conflict(format!(
                    "product {} is already sold",
                    current.product_id
                )));
            }

            (Some(standing), promotion)
        } else {
            (None, None)
        };

        let sale = fetch_sale(&mut tx, id).await?.ok_or(AppError::NotFound)?;
        tx.commit()
            .await
            .map_err(|e| store_error("failed to commit sale transition", e))?;

        Ok(SaleTransition {
            previous: current.status,
            sale,
            seller,
            promotion,
        })
    }
}

async fn fetch_sale(conn: &mut SqliteConnection, id: i64) -> AppResult<Option<SaleRecord>> {
    let row = sqlx::query(&format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| store_error("failed to fetch sale", e))?;

    row.map(row_to_sale).transpose()
}

fn row_to_sale(row: SqliteRow) -> AppResult<SaleRecord> {
    let payment_method: String = column(&row, "payment_method")?;
    let status: String = column(&row, "status")?;

    Ok(SaleRecord {
        id: column(&row, "id")?,
        product_id: column(&row, "product_id")?,
        seller_id: column(&row, "seller_id")?,
        buyer_id: column(&row, "buyer_id")?,
        sale_price: column(&row, "sale_price")?,
        commission_rate: column(&row, "commission_rate")?,
        commission_amount: column(&row, "commission_amount")?,
        seller_earnings: column(&row, "seller_earnings")?,
        payment_method: payment_method
            .parse()
            .map_err(|e| AppError::External(format!("invalid stored payment method: {e}")))?,
        payment_reference: column(&row, "payment_reference")?,
        payment_confirmed: column(&row, "payment_confirmed")?,
        status: status
            .parse()
            .map_err(|e| AppError::External(format!("invalid stored sale status: {e}")))?,
        created_at: column(&row, "created_at")?,
        updated_at: column(&row, "updated_at")?,
        paid_at: column(&row, "paid_at")?,
        completed_at: column(&row, "completed_at")?,
    })
}
