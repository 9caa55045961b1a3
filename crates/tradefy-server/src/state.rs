use sqlx::SqlitePool;
use tradefy_common::config::MarketConfig;

#[derive(Clone)]
pub struct AppState {
    pub boot_id: String,
    pub git_sha: Option<String>,
    pub config: MarketConfig,
    pub db_pool: SqlitePool,
}

impl AppState {
    pub fn new(
        boot_id: String,
        git_sha: Option<String>,
        config: MarketConfig,
        db_pool: SqlitePool,
    ) -> Self {
        Self {
            boot_id,
            git_sha,
            config,
            db_pool,
        }
    }
}
