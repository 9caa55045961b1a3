use std::collections::HashMap;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use tradefy_common::config::MarketConfig;

use crate::db::test_pool;
use crate::routes::build_router;
use crate::state::AppState;

pub const TEST_PASSWORD: &str = "correct-horse";
pub const WEBHOOK_SECRET: &str = "whsec_test";

pub async fn test_app() -> (Router, AppState) {
    let mut vars = HashMap::new();
    vars.insert("TRADEFY_ADMIN_USERNAMES".to_string(), "admin".to_string());
    vars.insert("TRADEFY_WEBHOOK_SECRET".to_string(), WEBHOOK_SECRET.to_string());
    vars.insert("TRADEFY_LEADERBOARD_MAX_LIMIT".to_string(), "50".to_string());
    let config = MarketConfig::from_map(&vars).expect("config");

    let state = AppState::new(
        "boot-test".to_string(),
        Some("sha-test".to_string()),
        config,
        test_pool().await,
    );
    (build_router(state.clone()), state)
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json")
    };
    (status, json)
}

/// Registers `username` and returns `(user_id, bearer token)`.
pub async fn signup(app: &Router, username: &str, country: &str) -> (i64, String) {
    let (status, user) = send(
        app,
        Method::POST,
        "/api/v1/auth/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": TEST_PASSWORD,
            "country": country,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{user}");

    let (status, login) = send(
        app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({"username": username, "password": TEST_PASSWORD})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{login}");

    (
        user["id"].as_i64().expect("id"),
        login["token"].as_str().expect("token").to_string(),
    )
}

/// Creates and publishes a listing, returning its id.
pub async fn published_product(app: &Router, token: &str, price: f64) -> i64 {
    let (status, product) = send(
        app,
        Method::POST,
        "/api/v1/products",
        Some(token),
        Some(json!({"title": "Radio", "price": price, "category": "electronics"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{product}");
    let id = product["id"].as_i64().expect("id");

    let (status, _) = send(
        app,
        Method::POST,
        &format!("/api/v1/products/{id}/publish"),
        Some(token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    id
}
