use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use tradefy_common::api::{LeaderboardResponse, RankInfoResponse};
use tradefy_common::error::AppResult;
use tradefy_common::leaderboard::{number_page, position_after, LeaderboardScope, PageRequest};
use tradefy_common::ranks::rank_info;

use super::PageQuery;
use crate::auth::current_user;
use crate::error::ApiResult;
use crate::state::AppState;
use crate::stores::user::{UserRecord, UserStore};

#[derive(Debug, Default, Deserialize)]
pub struct NationalQuery {
    pub country: Option<String>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn global(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<LeaderboardResponse> {
    let caller = current_user(&state, &headers).await?;
    let page = PageRequest::new(query.offset, query.limit, state.config.leaderboard_max_limit)?;

    Ok(Json(board(&state, &caller, &LeaderboardScope::Global, page).await?))
}

/// Defaults to the caller's own country when none is given.
pub async fn national(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<NationalQuery>,
) -> ApiResult<LeaderboardResponse> {
    let caller = current_user(&state, &headers).await?;
    let scope = LeaderboardScope::national(query.country.as_deref(), caller.country.as_deref())?;
    let page = PageRequest::new(query.offset, query.limit, state.config.leaderboard_max_limit)?;

    Ok(Json(board(&state, &caller, &scope, page).await?))
}

pub async fn ranks() -> Json<RankInfoResponse> {
    Json(RankInfoResponse { ranks: rank_info() })
}

async fn board(
    state: &AppState,
    caller: &UserRecord,
    scope: &LeaderboardScope,
    page: PageRequest,
) -> AppResult<LeaderboardResponse> {
    let store = UserStore::new(state.db_pool.clone());
    let sellers = store.leaderboard_page(scope, page).await?;
    let total_users = store.count_in_scope(scope).await?;

    // Independent of the page window; absent when the caller is outside the scope.
    let current_user_position = if scope.includes(caller.country.as_deref()) {
        let ahead = store
            .count_ahead(scope, caller.standing.sales_count())
            .await?;
        Some(position_after(ahead))
    } else {
        None
    };

    Ok(LeaderboardResponse {
        users: number_page(page.offset, sellers),
        current_user_position,
        total_users,
    })
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::Value;
    use tradefy_common::ranks::resolve;

    use crate::routes::test_support::{send, signup, test_app};
    use crate::state::AppState;

    async fn set_sales(state: &AppState, user_id: i64, sales: u64) {
        let tier = resolve(sales);
        sqlx::query(
            "UPDATE users SET sales_count = ?1, rank = ?2, commission_rate = ?3 WHERE id = ?4",
        )
        .bind(sales as i64)
        .bind(tier.name.as_str())
        .bind(tier.commission_rate)
        .bind(user_id)
        .execute(&state.db_pool)
        .await
        .expect("seed sales");
    }

    fn ids(body: &Value) -> Vec<i64> {
        body["users"]
            .as_array()
            .expect("users")
            .iter()
            .map(|row| row["user_id"].as_i64().expect("user_id"))
            .collect()
    }

    #[tokio::test]
    async fn global_board_pages_and_locates_caller() {
        let (app, state) = test_app().await;
        let (a, token) = signup(&app, "ama", "Bénin").await;
        let (b, _) = signup(&app, "yao", "Togo").await;
        let (c, _) = signup(&app, "ife", "Bénin").await;
        set_sales(&state, a, 3).await;
        set_sales(&state, b, 30).await;
        set_sales(&state, c, 3).await;

        let (status, body) = send(
            &app,
            Method::GET,
            "/api/v1/leaderboard/global?offset=1&limit=1",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ids(&body), vec![a]);
        assert_eq!(body["users"][0]["position"], 2);
        assert_eq!(body["total_users"], 3);
        assert_eq!(body["current_user_position"], 2);

        let (_, full) =
            send(&app, Method::GET, "/api/v1/leaderboard/global", Some(&token), None).await;
        assert_eq!(ids(&full), vec![b, a, c]);
        // rows show the rate for the rank read off the row
        assert_eq!(full["users"][0]["rank"], "beginner");
        assert_eq!(full["users"][0]["commission_rate"], 4.35);
    }

    #[tokio::test]
    async fn national_board_defaults_to_caller_country() {
        let (app, state) = test_app().await;
        let (a, token) = signup(&app, "ama", "Bénin").await;
        let (b, _) = signup(&app, "yao", "Togo").await;
        set_sales(&state, b, 30).await;

        let (status, body) =
            send(&app, Method::GET, "/api/v1/leaderboard/national", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ids(&body), vec![a]);
        assert_eq!(body["total_users"], 1);
        assert_eq!(body["current_user_position"], 1);

        let (_, togo) = send(
            &app,
            Method::GET,
            "/api/v1/leaderboard/national?country=Togo",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(ids(&togo), vec![b]);
        assert!(togo["current_user_position"].is_null());

        let (_, padded) = send(
            &app,
            Method::GET,
            "/api/v1/leaderboard/national?country=Togo%20",
            Some(&token),
            None,
        )
        .await;
        assert!(ids(&padded).is_empty());
        assert_eq!(padded["total_users"], 0);
    }

    #[tokio::test]
    async fn paging_inputs_are_checked() {
        let (app, _) = test_app().await;
        let (_, token) = signup(&app, "ama", "Bénin").await;

        let (status, _) = send(
            &app,
            Method::GET,
            "/api/v1/leaderboard/global?offset=-1",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            Method::GET,
            "/api/v1/leaderboard/global?limit=0",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["users"].as_array().expect("users").len(), 1);

        let (status, _) = send(&app, Method::GET, "/api/v1/leaderboard/global", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn reads_leave_no_trace() {
        let (app, state) = test_app().await;
        let (a, token) = signup(&app, "ama", "Bénin").await;
        let (b, _) = signup(&app, "yao", "Togo").await;
        set_sales(&state, a, 40).await;
        set_sales(&state, b, 80).await;

        for uri in [
            "/api/v1/leaderboard/global",
            "/api/v1/leaderboard/national",
            "/api/v1/leaderboard/national?country=Togo",
            "/api/v1/leaderboard/ranks",
            "/api/v1/users/me/stats",
        ] {
            let (status, first) = send(&app, Method::GET, uri, Some(&token), None).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            let (_, second) = send(&app, Method::GET, uri, Some(&token), None).await;
            assert_eq!(first, second, "{uri}");
        }

        let (_, me) = send(&app, Method::GET, "/api/v1/users/me", Some(&token), None).await;
        assert_eq!(me["sales_count"], 40);
        assert_eq!(me["rank"], "beginner");
    }

    #[tokio::test]
    async fn rank_table_is_public() {
        let (app, _) = test_app().await;
        let (status, body) = send(&app, Method::GET, "/api/v1/leaderboard/ranks", None, None).await;

        assert_eq!(status, StatusCode::OK);
        let ranks = body["ranks"].as_array().expect("ranks");
        assert_eq!(ranks.len(), 7);
        assert_eq!(ranks[0]["name"], "senior");
        assert!(ranks[0]["next_rank"].is_null());
        assert_eq!(ranks[6]["name"], "profane");
        assert_eq!(ranks[6]["sales_to_next"], 25);
    }
}
