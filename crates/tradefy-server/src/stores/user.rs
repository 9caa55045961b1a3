use chrono::Utc;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{SqliteConnection, SqlitePool};
use tradefy_common::api::UpdateProfileRequest;
use tradefy_common::error::{AppError, AppResult};
use tradefy_common::leaderboard::{LeaderboardScope, PageRequest, RankedSeller};
use tradefy_common::ranks::RankName;
use tradefy_common::standing::{Promotion, SellerStanding};

use super::{column, count_from_i64, to_i64};
use crate::db::store_error;

const USER_COLUMNS: &str = "id, username, email, password_hash, full_name, country, city, \
     phone_number, profile_picture, sales_count, total_earnings, is_active, is_verified, \
     is_superuser, created_at, updated_at";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub phone_number: Option<String>,
    pub profile_picture: Option<String>,
    /// Counters plus the rank and rate derived from them.
    #[serde(flatten)]
    pub standing: SellerStanding,
    pub is_active: bool,
    pub is_verified: bool,
    pub is_superuser: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub phone_number: Option<String>,
    pub profile_picture: Option<String>,
    pub is_superuser: bool,
}

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user: NewUser) -> AppResult<UserRecord> {
        let standing = SellerStanding::new();
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO users (username, email, password_hash, full_name, country, city, phone_number, \
             profile_picture, rank, commission_rate, is_superuser, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(&user.country)
        .bind(&user.city)
        .bind(&user.phone_number)
        .bind(&user.profile_picture)
        .bind(standing.rank().as_str())
        .bind(standing.commission_rate())
        .bind(user.is_superuser)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("failed to create user", e))?;

        self.get(result.last_insert_rowid())
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn get(&self, id: i64) -> AppResult<Option<UserRecord>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("failed to fetch user", e))?;

        row.map(row_to_user).transpose()
    }

    pub async fn get_by_username(&self, username: &str) -> AppResult<Option<UserRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("failed to fetch user", e))?;

        row.map(row_to_user).transpose()
    }

    pub async fn list(&self, page: PageRequest) -> AppResult<Vec<UserRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id ASC LIMIT ?1 OFFSET ?2"
        ))
        .bind(to_i64(page.limit))
        .bind(to_i64(page.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("failed to list users", e))?;

        rows.into_iter().map(row_to_user).collect()
    }

    /// Applies the fields present in `update`; absent fields keep their value.
    pub async fn update_profile(
        &self,
        id: i64,
        update: &UpdateProfileRequest,
    ) -> AppResult<UserRecord> {
        let result = sqlx::query(
            "UPDATE users SET email = COALESCE(?1, email), full_name = COALESCE(?2, full_name), \
             city = COALESCE(?3, city), phone_number = COALESCE(?4, phone_number), \
             profile_picture = COALESCE(?5, profile_picture), updated_at = ?6 WHERE id = ?7",
        )
        .bind(&update.email)
        .bind(&update.full_name)
        .bind(&update.city)
        .bind(&update.phone_number)
        .bind(&update.profile_picture)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("failed to update user", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        self.get(id).await?.ok_or(AppError::NotFound)
    }

    pub async fn update_password_hash(&self, id: i64, password_hash: &str) -> AppResult<()> {
        let result =
            sqlx::query("UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3")
                .bind(password_hash)
                .bind(Utc::now().to_rfc3339())
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| store_error("failed to update password", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    /// Sellers in `scope` ordered by sales count, ties broken by id.
    pub async fn leaderboard_page(
        &self,
        scope: &LeaderboardScope,
        page: PageRequest,
    ) -> AppResult<Vec<RankedSeller>> {
        let query = match scope.country() {
            Some(country) => sqlx::query(
                "SELECT id, username, country, sales_count, rank FROM users WHERE country = ?1 \
                 ORDER BY sales_count DESC, id ASC LIMIT ?2 OFFSET ?3",
            )
            .bind(country),
            None => sqlx::query(
                "SELECT id, username, country, sales_count, rank FROM users \
                 ORDER BY sales_count DESC, id ASC LIMIT ?1 OFFSET ?2",
            ),
        };

        let rows = query
            .bind(to_i64(page.limit))
            .bind(to_i64(page.offset))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_error("failed to load leaderboard", e))?;

        rows.into_iter().map(row_to_ranked_seller).collect()
    }

    pub async fn count_in_scope(&self, scope: &LeaderboardScope) -> AppResult<u64> {
        let query = match scope.country() {
            Some(country) => {
                sqlx::query("SELECT COUNT(*) AS total FROM users WHERE country = ?1").bind(country)
            }
            None => sqlx::query("SELECT COUNT(*) AS total FROM users"),
        };

        let row = query
            .fetch_one(&self.pool)
            .await
            .map_err(|e| store_error("failed to count users", e))?;
        count_from_i64(column(&row, "total")?)
    }

    /// Number of sellers in `scope` with strictly more sales than `sales_count`.
    pub async fn count_ahead(&self, scope: &LeaderboardScope, sales_count: u64) -> AppResult<u64> {
        let query = match scope.country() {
            Some(country) => sqlx::query(
                "SELECT COUNT(*) AS total FROM users WHERE sales_count > ?1 AND country = ?2",
            )
            .bind(to_i64(sales_count))
            .bind(country),
            None => sqlx::query("SELECT COUNT(*) AS total FROM users WHERE sales_count > ?1")
                .bind(to_i64(sales_count)),
        };

        let row = query
            .fetch_one(&self.pool)
            .await
            .map_err(|e| store_error("failed to count sellers ahead", e))?;
        count_from_i64(column(&row, "total")?)
    }
}

/// Adds one completed sale to the seller's counters inside the caller's
/// transaction and re-derives rank and commission rate.
///
/// The caller's transaction must already hold the write lock so the counters
/// read here are the committed values.
pub(crate) async fn record_completed_sale(
    conn: &mut SqliteConnection,
    seller_id: i64,
    seller_earnings: f64,
) -> AppResult<(SellerStanding, Option<Promotion>)> {
    let row = sqlx::query("SELECT sales_count, total_earnings FROM users WHERE id = ?1")
        .bind(seller_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| store_error("failed to read seller counters", e))?
        .ok_or(AppError::NotFound)?;

    let mut standing = SellerStanding::from_counters(
        column(&row, "sales_count")?,
        column(&row, "total_earnings")?,
    )?;
    let promotion = standing.record_completed_sale(seller_earnings)?;

    sqlx::query(
        "UPDATE users SET sales_count = ?1, total_earnings = ?2, rank = ?3, commission_rate = ?4, \
         updated_at = ?5 WHERE id = ?6",
    )
    .bind(to_i64(standing.sales_count()))
    .bind(standing.total_earnings())
    .bind(standing.rank().as_str())
    .bind(standing.commission_rate())
    .bind(Utc::now().to_rfc3339())
    .bind(seller_id)
    .execute(&mut *conn)
    .await
    .map_err(|e| store_error("failed to update seller counters", e))?;

    Ok((standing, promotion))
}

fn row_to_user(row: SqliteRow) -> AppResult<UserRecord> {
    let standing = SellerStanding::from_counters(
        column(&row, "sales_count")?,
        column(&row, "total_earnings")?,
    )?;

    Ok(UserRecord {
        id: column(&row, "id")?,
        username: column(&row, "username")?,
        email: column(&row, "email")?,
        password_hash: column(&row, "password_hash")?,
        full_name: column(&row, "full_name")?,
        country: column(&row, "country")?,
        city: column(&row, "city")?,
        phone_number: column(&row, "phone_number")?,
        profile_picture: column(&row, "profile_picture")?,
        standing,
        is_active: column(&row, "is_active")?,
        is_verified: column(&row, "is_verified")?,
        is_superuser: column(&row, "is_superuser")?,
        created_at: column(&row, "created_at")?,
        updated_at: column(&row, "updated_at")?,
    })
}

fn row_to_ranked_seller(row: SqliteRow) -> AppResult<RankedSeller> {
    let rank: String = column(&row, "rank")?;

    Ok(RankedSeller {
        user_id: column(&row, "id")?,
        username: column(&row, "username")?,
        country: column(&row, "country")?,
        sales_count: count_from_i64(column(&row, "sales_count")?)?,
        rank: rank
            .parse::<RankName>()
            .map_err(|e| AppError::External(format!("invalid stored rank: {e}")))?,
    })
}

#[cfg(test)]
mod tests {
    use tradefy_common::leaderboard::{LeaderboardScope, PageRequest};
    use tradefy_common::ranks::RankName;

    use super::{record_completed_sale, NewUser, UserStore};
    use crate::db::test_pool;

    fn new_user(username: &str, country: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash: "hash".to_string(),
            country: Some(country.to_string()),
            ..NewUser::default()
        }
    }

    async fn set_sales(store: &UserStore, id: i64, sales: i64) {
        sqlx::query("UPDATE users SET sales_count = ?1 WHERE id = ?2")
            .bind(sales)
            .bind(id)
            .execute(&store.pool)
            .await
            .expect("set sales");
    }

    #[tokio::test]
    async fn new_users_start_as_profane() {
        let store = UserStore::new(test_pool().await);
        let user = store.create(new_user("kofi", "Bénin")).await.expect("create");

        assert_eq!(user.standing.sales_count(), 0);
        assert_eq!(user.standing.rank(), RankName::Profane);
        assert_eq!(user.standing.commission_rate(), 4.5);
        assert!(user.is_active);
        assert!(!user.is_superuser);

        let json = serde_json::to_value(&user).expect("json");
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["rank"], "profane");
        assert_eq!(json["sales_count"], 0);
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let store = UserStore::new(test_pool().await);
        store.create(new_user("kofi", "Bénin")).await.expect("create");

        let mut again = new_user("kofi", "Bénin");
        again.email = "other@example.com".to_string();
        let err = store.create(again).await.expect_err("duplicate");
        assert_eq!(err.code(), "conflict");
    }

    #[tokio::test]
    async fn profile_update_keeps_absent_fields() {
        let store = UserStore::new(test_pool().await);
        let user = store.create(new_user("kofi", "Bénin")).await.expect("create");

        let update = tradefy_common::api::UpdateProfileRequest {
            city: Some("Cotonou".to_string()),
            ..Default::default()
        };
        let updated = store.update_profile(user.id, &update).await.expect("update");
        assert_eq!(updated.city.as_deref(), Some("Cotonou"));
        assert_eq!(updated.email, "kofi@example.com");
    }

    #[tokio::test]
    async fn leaderboard_orders_by_sales_then_id() {
        let store = UserStore::new(test_pool().await);
        let a = store.create(new_user("ama", "Bénin")).await.expect("a");
        let b = store.create(new_user("yao", "Togo")).await.expect("b");
        let c = store.create(new_user("ife", "Bénin")).await.expect("c");
        set_sales(&store, a.id, 3).await;
        set_sales(&store, b.id, 10).await;
        set_sales(&store, c.id, 3).await;

        let page = PageRequest::new(None, None, 100).expect("page");
        let global = store
            .leaderboard_page(&LeaderboardScope::Global, page)
            .await
            .expect("global");
        let ids: Vec<_> = global.iter().map(|s| s.user_id).collect();
        assert_eq!(ids, vec![b.id, a.id, c.id]);

        let benin = LeaderboardScope::National("Bénin".to_string());
        let national = store.leaderboard_page(&benin, page).await.expect("national");
        let ids: Vec<_> = national.iter().map(|s| s.user_id).collect();
        assert_eq!(ids, vec![a.id, c.id]);

        assert_eq!(store.count_in_scope(&benin).await.expect("count"), 2);
        assert_eq!(store.count_ahead(&LeaderboardScope::Global, 3).await.expect("ahead"), 1);
        assert_eq!(store.count_ahead(&benin, 3).await.expect("ahead"), 0);
    }

    #[tokio::test]
    async fn completed_sale_promotes_at_threshold() {
        let store = UserStore::new(test_pool().await);
        let seller = store.create(new_user("kofi", "Bénin")).await.expect("create");
        set_sales(&store, seller.id, 24).await;

        let mut tx = store.pool.begin().await.expect("tx");
        let (standing, promotion) = record_completed_sale(&mut tx, seller.id, 955.0)
            .await
            .expect("record");
        tx.commit().await.expect("commit");

        assert_eq!(standing.sales_count(), 25);
        let promotion = promotion.expect("promoted");
        assert_eq!(promotion.from, RankName::Profane);
        assert_eq!(promotion.to, RankName::Beginner);

        let reloaded = store.get(seller.id).await.expect("get").expect("exists");
        assert_eq!(reloaded.standing.rank(), RankName::Beginner);
        assert_eq!(reloaded.standing.commission_rate(), 4.35);
        assert_eq!(reloaded.standing.total_earnings(), 955.0);

        let stored_rank: (String, f64) =
            sqlx::query_as("SELECT rank, commission_rate FROM users WHERE id = ?1")
                .bind(seller.id)
                .fetch_one(&store.pool)
                .await
                .expect("row");
        assert_eq!(stored_rank, ("beginner".to_string(), 4.35));
    }
}
