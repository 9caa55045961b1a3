use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tradefy_common::error::{AppError, AppResult};

pub async fn connect_and_migrate(database_url: &str) -> AppResult<SqlitePool> {
    connect_with(database_url, 5).await
}

pub async fn connect_with(database_url: &str, max_connections: u32) -> AppResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| AppError::Config(format!("invalid database url: {e}")))?
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .map_err(|e| AppError::External(format!("sqlite connect failed: {e}")))?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| AppError::External(format!("sqlite migrate failed: {e}")))?;

    Ok(pool)
}

/// Map a sqlx failure, turning unique-constraint hits into `Conflict`.
pub(crate) fn store_error(context: &str, err: sqlx::Error) -> AppError {
    let unique = err
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation());
    if unique {
        AppError::Conflict(format!("{context}: already exists"))
    } else {
        AppError::External(format!("{context}: {err}"))
    }
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    connect_with("sqlite::memory:", 1).await.expect("pool")
}

#[cfg(test)]
mod tests {
    use super::test_pool;

    #[tokio::test]
    async fn migrations_create_marketplace_tables() {
        let pool = test_pool().await;

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' \
             AND name IN ('users', 'products', 'sales', 'sessions') ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .expect("tables");

        let names: Vec<_> = tables.into_iter().map(|(name,)| name).collect();
        assert_eq!(names, vec!["products", "sales", "sessions", "users"]);
    }
}
