use chrono::Utc;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::SqlitePool;
use tradefy_common::api::{CreateProductRequest, UpdateProductRequest};
use tradefy_common::error::{AppError, AppResult};
use tradefy_common::leaderboard::PageRequest;
use tradefy_common::types::{ProductCategory, ProductStatus};

use super::{column, count_from_i64, to_i64};
use crate::db::store_error;

const PRODUCT_COLUMNS: &str = "id, owner_id, title, description, price, category, status, \
     main_image_url, image_urls, city, country, is_negotiable, is_featured, created_at, \
     updated_at, published_at";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRecord {
    pub id: i64,
    pub owner_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub category: ProductCategory,
    pub status: ProductStatus,
    pub main_image_url: Option<String>,
    pub image_urls: Vec<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub is_negotiable: bool,
    pub is_featured: bool,
    pub created_at: String,
    pub updated_at: String,
    pub published_at: Option<String>,
}

/// Optional narrowing for the public catalogue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub category: Option<ProductCategory>,
    pub country: Option<String>,
}

#[derive(Clone)]
pub struct ProductStore {
    pool: SqlitePool,
}

impl ProductStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts a draft listing owned by `owner_id`.
    pub async fn create(
        &self,
        owner_id: i64,
        req: &CreateProductRequest,
    ) -> AppResult<ProductRecord> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO products (owner_id, title, description, price, category, status, main_image_url, \
             image_urls, city, country, is_negotiable, is_featured, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
        )
        .bind(owner_id)
        .bind(req.title.trim())
        .bind(&req.description)
        .bind(req.price)
        .bind(req.category.as_str())
        .bind(ProductStatus::Draft.as_str())
        .bind(&req.main_image_url)
        .bind(encode_image_urls(&req.image_urls)?)
        .bind(&req.city)
        .bind(&req.country)
        .bind(req.is_negotiable)
        .bind(req.is_featured)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("failed to create product", e))?;

        self.get(result.last_insert_rowid())
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn get(&self, id: i64) -> AppResult<Option<ProductRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("failed to fetch product", e))?;

        row.map(row_to_product).transpose()
    }

    /// Published listings, newest first.
    pub async fn list_published(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> AppResult<Vec<ProductRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE status = ?1 \
             AND (?2 IS NULL OR category = ?2) AND (?3 IS NULL OR country = ?3) \
             ORDER BY created_at DESC, id DESC LIMIT ?4 OFFSET ?5"
        ))
        .bind(ProductStatus::Published.as_str())
        .bind(filter.category.map(|c| c.as_str()))
        .bind(filter.country.as_deref())
        .bind(to_i64(page.limit))
        .bind(to_i64(page.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("failed to list products", e))?;

        rows.into_iter().map(row_to_product).collect()
    }

    pub async fn list_by_owner(&self, owner_id: i64) -> AppResult<Vec<ProductRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE owner_id = ?1 ORDER BY id DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("failed to list products", e))?;

        rows.into_iter().map(row_to_product).collect()
    }

    pub async fn count_by_owner(&self, owner_id: i64) -> AppResult<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM products WHERE owner_id = ?1")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| store_error("failed to count products", e))?;
        count_from_i64(column(&row, "total")?)
    }

    pub async fn update(&self, id: i64, update: &UpdateProductRequest) -> AppResult<ProductRecord> {
        let image_urls = update
            .image_urls
            .as_deref()
            .map(encode_image_urls)
            .transpose()?;

        let result = sqlx::query(
            "UPDATE products SET title = COALESCE(?1, title), description = COALESCE(?2, description), \
             price = COALESCE(?3, price), category = COALESCE(?4, category), \
             main_image_url = COALESCE(?5, main_image_url), image_urls = COALESCE(?6, image_urls), \
             city = COALESCE(?7, city), country = COALESCE(?8, country), \
             is_negotiable = COALESCE(?9, is_negotiable), is_featured = COALESCE(?10, is_featured), \
             updated_at = ?11 WHERE id = ?12",
        )
        .bind(update.title.as_deref().map(str::trim))
        .bind(&update.description)
        .bind(update.price)
        .bind(update.category.map(|c| c.as_str()))
        .bind(&update.main_image_url)
        .bind(image_urls)
        .bind(&update.city)
        .bind(&update.country)
        .bind(update.is_negotiable)
        .bind(update.is_featured)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("failed to update product", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        self.get(id).await?.ok_or(AppError::NotFound)
    }

    /// Moves a listing to `status`. `published_at` is stamped on first publish only.
    pub async fn set_status(&self, id: i64, status: ProductStatus) -> AppResult<ProductRecord> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "UPDATE products SET status = ?1, updated_at = ?2, \
             published_at = CASE WHEN ?1 = 'published' THEN COALESCE(published_at, ?2) ELSE published_at END \
             WHERE id = ?3",
        )
        .bind(status.as_str())
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("failed to update product status", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        self.get(id).await?.ok_or(AppError::NotFound)
    }

    /// Removes a listing that has never been sold.
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM sales WHERE product_id = ?1")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| store_error("failed to count product sales", e))?;
        if column::<i64>(&row, "total")? > 0 {
            return Err(AppError::Conflict(
                "product has sales and cannot be deleted; archive it instead".to_string(),
            ));
        }

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| store_error("failed to delete product", e))?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}

fn encode_image_urls(urls: &[String]) -> AppResult<String> {
    serde_json::to_string(urls).map_err(|_| AppError::Internal)
}

fn row_to_product(row: SqliteRow) -> AppResult<ProductRecord> {
    let category: String = column(&row, "category")?;
    let status: String = column(&row, "status")?;
    let image_urls: String = column(&row, "image_urls")?;

    Ok(ProductRecord {
        id: column(&row, "id")?,
        owner_id: column(&row, "owner_id")?,
        title: column(&row, "title")?,
        description: column(&row, "description")?,
        price: column(&row, "price")?,
        category: category
            .parse()
            .map_err(|e| AppError::External(format!("invalid stored category: {e}")))?,
        status: status
            .parse()
            .map_err(|e| AppError::External(format!("invalid stored product status: {e}")))?,
        main_image_url: column(&row, "main_image_url")?,
        image_urls: serde_json::from_str(&image_urls)
            .map_err(|e| AppError::External(format!("invalid stored image_urls: {e}")))?,
        city: column(&row, "city")?,
        country: column(&row, "country")?,
        is_negotiable: column(&row, "is_negotiable")?,
        is_featured: column(&row, "is_featured")?,
        created_at: column(&row, "created_at")?,
        updated_at: column(&row, "updated_at")?,
        published_at: column(&row, "published_at")?,
    })
}
