pub mod auth;
pub mod health;
pub mod leaderboard;
pub mod products;
pub mod sales;
pub mod users;
pub mod webhooks;

#[cfg(test)]
pub(crate) mod test_support;

use axum::routing::{get, post, put};
use axum::Router;
use serde::Deserialize;

use crate::state::AppState;

/// Raw `offset`/`limit` query values, validated by `PageRequest::new`.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/v1/auth/register", post(auth::register))
        .route("/api/v1/auth/login", post(auth::login))
        .route("/api/v1/auth/logout", post(auth::logout))
        .route("/api/v1/users", get(users::list_users))
        .route("/api/v1/users/me", get(users::me).put(users::update_me))
        .route("/api/v1/users/me/password", put(users::change_password))
        .route("/api/v1/users/me/stats", get(users::stats))
        .route("/api/v1/users/{user_id}", get(users::get_user))
        .route(
            "/api/v1/products",
            get(products::list).post(products::create),
        )
        .route("/api/v1/products/mine", get(products::mine))
        .route(
            "/api/v1/products/{product_id}",
            get(products::get)
                .put(products::update)
                .delete(products::delete),
        )
        .route(
            "/api/v1/products/{product_id}/publish",
            post(products::publish),
        )
        .route(
            "/api/v1/products/{product_id}/archive",
            post(products::archive),
        )
        .route("/api/v1/sales", get(sales::list).post(sales::create))
        .route("/api/v1/sales/{sale_id}", get(sales::get))
        .route(
            "/api/v1/sales/{sale_id}/confirm-payment",
            post(sales::confirm_payment),
        )
        .route("/api/v1/sales/{sale_id}/ship", post(sales::ship))
        .route("/api/v1/sales/{sale_id}/deliver", post(sales::deliver))
        .route("/api/v1/sales/{sale_id}/cancel", post(sales::cancel))
        .route("/api/v1/sales/{sale_id}/refund", post(sales::refund))
        .route("/api/v1/leaderboard/global", get(leaderboard::global))
        .route("/api/v1/leaderboard/national", get(leaderboard::national))
        .route("/api/v1/leaderboard/ranks", get(leaderboard::ranks))
        .route("/webhooks/payments", post(webhooks::payment))
        .with_state(state)
}
