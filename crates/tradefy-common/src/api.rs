use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::leaderboard::LeaderboardEntry;
use crate::ranks::{RankInfo, RankName};
use crate::types::{PaymentMethod, ProductCategory};

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub ok: bool,
    pub boot_id: Option<String>,
    pub git_sha: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub phone_number: Option<String>,
    pub profile_picture: Option<String>,
}

impl RegisterRequest {
    pub fn validate(&self) -> AppResult<()> {
        if self.username.trim().is_empty() {
            return Err(AppError::InvalidInput("username is required".to_string()));
        }
        validate_email(&self.email)?;
        validate_password(&self.password)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_at: String,
}

/// Profile fields a user may change themselves. Counters and flags are absent
/// on purpose: they are not writable through this path.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpdateProfileRequest {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub city: Option<String>,
    pub phone_number: Option<String>,
    pub profile_picture: Option<String>,
}

impl UpdateProfileRequest {
    pub fn validate(&self) -> AppResult<()> {
        match &self.email {
            Some(email) => validate_email(email),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserStatsResponse {
    pub total_products: u64,
    pub total_sales: u64,
    pub total_earnings: f64,
    pub commission_rate: f64,
    pub rank: RankName,
    pub rank_progress: f64,
    pub next_rank: Option<RankName>,
    pub sales_to_next_rank: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateProductRequest {
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub category: ProductCategory,
    pub main_image_url: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    #[serde(default)]
    pub is_negotiable: bool,
    #[serde(default)]
    pub is_featured: bool,
}

impl CreateProductRequest {
    pub fn validate(&self) -> AppResult<()> {
        if self.title.trim().is_empty() {
            return Err(AppError::InvalidInput("title is required".to_string()));
        }
        validate_price(self.price)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpdateProductRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub category: Option<ProductCategory>,
    pub main_image_url: Option<String>,
    pub image_urls: Option<Vec<String>>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub is_negotiable: Option<bool>,
    pub is_featured: Option<bool>,
}

impl UpdateProductRequest {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(AppError::InvalidInput("title cannot be empty".to_string()));
            }
        }
        match self.price {
            Some(price) => validate_price(price),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateSaleRequest {
    pub product_id: i64,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfirmPaymentRequest {
    pub reference: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentWebhookPayload {
    pub sale_id: i64,
    pub reference: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeaderboardResponse {
    pub users: Vec<LeaderboardEntry>,
    pub current_user_position: Option<u64>,
    pub total_users: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RankInfoResponse {
    pub ranks: Vec<RankInfo>,
}

fn validate_email(email: &str) -> AppResult<()> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(AppError::InvalidInput("email is not valid".to_string())),
    }
}

pub fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::InvalidInput(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    Ok(())
}

fn validate_price(price: f64) -> AppResult<()> {
    if !price.is_finite() || price <= 0.0 {
        return Err(AppError::InvalidInput("price must be positive".to_string()));
    }
    Ok(())
}
