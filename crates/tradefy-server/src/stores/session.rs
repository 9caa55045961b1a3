use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::SqlitePool;
use tradefy_common::error::{AppError, AppResult};
use uuid::Uuid;

use super::column;
use crate::db::store_error;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRecord {
    pub session_id: Uuid,
    pub user_id: i64,
    pub lookup_key: String,
    #[serde(skip_serializing)]
    pub secret_hash: String,
    pub expires_at: String,
}

impl SessionRecord {
    /// Unparseable expiry counts as expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        DateTime::parse_from_rfc3339(&self.expires_at)
            .map(|expires_at| expires_at.with_timezone(&Utc) <= now)
            .unwrap_or(true)
    }
}

#[derive(Clone)]
pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        user_id: i64,
        lookup_key: &str,
        secret_hash: &str,
        ttl_hours: i64,
    ) -> AppResult<SessionRecord> {
        let session_id = Uuid::new_v4();
        let expires_at = (Utc::now() + Duration::hours(ttl_hours)).to_rfc3339();

        sqlx::query(
            "INSERT INTO sessions (session_id, user_id, lookup_key, secret_hash, expires_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(session_id.to_string())
        .bind(user_id)
        .bind(lookup_key)
        .bind(secret_hash)
        .bind(&expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("failed to create session", e))?;

        Ok(SessionRecord {
            session_id,
            user_id,
            lookup_key: lookup_key.to_string(),
            secret_hash: secret_hash.to_string(),
            expires_at,
        })
    }

    pub async fn find(&self, lookup_key: &str) -> AppResult<Option<SessionRecord>> {
        let row = sqlx::query(
            "SELECT session_id, user_id, lookup_key, secret_hash, expires_at \
             FROM sessions WHERE lookup_key = ?1",
        )
        .bind(lookup_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("failed to lookup session", e))?;

        row.map(row_to_session).transpose()
    }

    pub async fn delete(&self, lookup_key: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM sessions WHERE lookup_key = ?1")
            .bind(lookup_key)
            .execute(&self.pool)
            .await
            .map_err(|e| store_error("failed to delete session", e))?;
        Ok(())
    }

    /// Signs the user out everywhere; returns how many sessions were dropped.
    pub async fn delete_for_user(&self, user_id: i64) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| store_error("failed to delete sessions", e))?;
        Ok(result.rows_affected())
    }
}

fn row_to_session(row: SqliteRow) -> AppResult<SessionRecord> {
    let session_id: String = column(&row, "session_id")?;

    Ok(SessionRecord {
        session_id: Uuid::parse_str(&session_id)
            .map_err(|e| AppError::External(format!("invalid session_id uuid: {e}")))?,
        user_id: column(&row, "user_id")?,
        lookup_key: column(&row, "lookup_key")?,
        secret_hash: column(&row, "secret_hash")?,
        expires_at: column(&row, "expires_at")?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::SessionStore;
    use crate::db::test_pool;
    use crate::stores::user::{NewUser, UserStore};

    async fn seed_user(pool: &sqlx::SqlitePool) -> i64 {
        UserStore::new(pool.clone())
            .create(NewUser {
                username: "kofi".to_string(),
                email: "kofi@example.com".to_string(),
                password_hash: "hash".to_string(),
                ..NewUser::default()
            })
            .await
            .expect("user")
            .id
    }

    #[tokio::test]
    async fn create_find_delete_session() {
        let pool = test_pool().await;
        let user_id = seed_user(&pool).await;

        let store = SessionStore::new(pool);
        let created = store
            .create(user_id, "0a1b2c3d4e5f", "hash", 24)
            .await
            .expect("create");
        assert!(!created.is_expired(Utc::now()));
        assert!(created.is_expired(Utc::now() + Duration::hours(25)));

        let found = store
            .find("0a1b2c3d4e5f")
            .await
            .expect("lookup")
            .expect("exists");
        assert_eq!(found.user_id, user_id);

        store.delete("0a1b2c3d4e5f").await.expect("delete");
        assert!(store.find("0a1b2c3d4e5f").await.expect("lookup").is_none());
    }

    #[tokio::test]
    async fn lookup_keys_are_unique_and_user_wide_delete_clears_all() {
        let pool = test_pool().await;
        let user_id = seed_user(&pool).await;
        let store = SessionStore::new(pool);

        store.create(user_id, "aaaaaaaaaaaa", "h1", 24).await.expect("first");
        store.create(user_id, "bbbbbbbbbbbb", "h2", 24).await.expect("second");
        let dup = store.create(user_id, "aaaaaaaaaaaa", "h3", 24).await;
        assert!(dup.is_err());

        assert_eq!(store.delete_for_user(user_id).await.expect("delete"), 2);
        assert!(store.find("bbbbbbbbbbbb").await.expect("lookup").is_none());
    }
}
