pub mod auth;
pub mod db;
pub mod error;
pub mod routes;
pub mod state;
pub mod stores;

use axum::Router;
use tradefy_common::config::MarketConfig;
use tradefy_common::error::{AppError, AppResult};

use state::AppState;

pub async fn app_from_config(
    config: MarketConfig,
    boot_id: String,
    git_sha: Option<String>,
) -> AppResult<Router> {
    let pool = db::connect_and_migrate(&config.database_url).await?;
    let state = AppState::new(boot_id, git_sha, config, pool);
    Ok(routes::build_router(state))
}

pub async fn serve(
    config: MarketConfig,
    boot_id: String,
    git_sha: Option<String>,
) -> AppResult<()> {
    let bind_addr = config.bind_addr.clone();
    let app = app_from_config(config, boot_id.clone(), git_sha).await?;

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| AppError::Config(format!("bind {bind_addr} failed: {e}")))?;
    tracing::info!(%bind_addr, %boot_id, "tradefy server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::External(format!("server error: {e}")))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
