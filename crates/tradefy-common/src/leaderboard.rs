//! Read-only ranking of sellers by completed sales.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::ranks::{commission_rate_for, RankName};

pub const DEFAULT_PAGE_LIMIT: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaderboardScope {
    Global,
    National(String),
}

impl LeaderboardScope {
    /// National scope for `requested`, falling back to the caller's country.
    /// The country is kept byte for byte; membership is exact string equality.
    pub fn national(requested: Option<&str>, caller_country: Option<&str>) -> AppResult<Self> {
        requested
            .or(caller_country)
            .filter(|country| !country.is_empty())
            .map(|country| Self::National(country.to_string()))
            .ok_or_else(|| AppError::InvalidInput("country is required".to_string()))
    }

    pub fn country(&self) -> Option<&str> {
        match self {
            Self::Global => None,
            Self::National(country) => Some(country),
        }
    }

    /// Whether a seller from `country` is ranked in this scope.
    pub fn includes(&self, country: Option<&str>) -> bool {
        match self {
            Self::Global => true,
            Self::National(scope) => country == Some(scope.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: u64,
    pub limit: u64,
}

impl PageRequest {
    /// Validate raw query values; `limit` is clamped to `1..=max_limit`.
    pub fn new(offset: Option<i64>, limit: Option<i64>, max_limit: u64) -> AppResult<Self> {
        let offset = match offset {
            Some(raw) => u64::try_from(raw)
                .map_err(|_| AppError::InvalidInput("offset must be non-negative".to_string()))?,
            None => 0,
        };
        let max_limit = max_limit.max(1);
        let limit = limit
            .map(|raw| raw.clamp(1, i64::try_from(max_limit).unwrap_or(i64::MAX)) as u64)
            .unwrap_or(DEFAULT_PAGE_LIMIT.min(max_limit));

        Ok(Self { offset, limit })
    }
}

/// One seller as read from the store, already in leaderboard order.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedSeller {
    pub user_id: i64,
    pub username: String,
    pub country: Option<String>,
    pub sales_count: u64,
    pub rank: RankName,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub position: u64,
    pub user_id: i64,
    pub username: String,
    pub country: Option<String>,
    pub sales: u64,
    pub rank: RankName,
    pub commission_rate: f64,
}

/// Number a page of sellers starting at `offset + 1`.
pub fn number_page(offset: u64, sellers: Vec<RankedSeller>) -> Vec<LeaderboardEntry> {
    sellers
        .into_iter()
        .zip(offset + 1..)
        .map(|(seller, position)| LeaderboardEntry {
            position,
            user_id: seller.user_id,
            username: seller.username,
            country: seller.country,
            sales: seller.sales_count,
            commission_rate: commission_rate_for(seller.rank),
            rank: seller.rank,
        })
        .collect()
}

/// Position of a seller given how many sellers in scope strictly outsell them.
pub fn position_after(sellers_ahead: u64) -> u64 {
    sellers_ahead + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seller(user_id: i64, sales_count: u64) -> RankedSeller {
        RankedSeller {
            user_id,
            username: format!("seller-{user_id}"),
            country: Some("Bénin".to_string()),
            sales_count,
            rank: crate::ranks::resolve(sales_count).name,
        }
    }

    #[test]
    fn national_scope_defaults_to_caller_country() {
        let scope = LeaderboardScope::national(None, Some("Togo")).expect("scope");
        assert_eq!(scope, LeaderboardScope::National("Togo".to_string()));

        let explicit = LeaderboardScope::national(Some("Bénin"), Some("Togo")).expect("scope");
        assert_eq!(explicit.country(), Some("Bénin"));
    }

    #[test]
    fn national_scope_needs_some_country() {
        let err = LeaderboardScope::national(None, None).expect_err("missing");
        assert!(err.to_string().contains("country is required"));

        assert!(LeaderboardScope::national(Some(""), Some("Togo")).is_err());
    }

    #[test]
    fn requested_country_is_not_normalised() {
        let padded = LeaderboardScope::national(Some("Togo "), None).expect("scope");
        assert_eq!(padded.country(), Some("Togo "));
        assert!(!padded.includes(Some("Togo")));
    }

    #[test]
    fn scope_membership_is_exact_match() {
        let scope = LeaderboardScope::National("Bénin".to_string());
        assert!(scope.includes(Some("Bénin")));
        assert!(!scope.includes(Some("benin")));
        assert!(!scope.includes(None));
        assert!(LeaderboardScope::Global.includes(None));
    }

    #[test]
    fn page_request_clamps_limit() {
        let page = PageRequest::new(Some(20), Some(500), 100).expect("page");
        assert_eq!(page, PageRequest { offset: 20, limit: 100 });

        let page = PageRequest::new(None, Some(0), 100).expect("page");
        assert_eq!(page.limit, 1);

        let page = PageRequest::new(None, None, 50).expect("page");
        assert_eq!(page.limit, 50);

        assert!(PageRequest::new(Some(-1), None, 100).is_err());
    }

    #[test]
    fn positions_continue_from_offset() {
        let page = number_page(10, vec![seller(7, 300), seller(3, 80)]);

        assert_eq!(page[0].position, 11);
        assert_eq!(page[1].position, 12);
        assert_eq!(page[0].rank, RankName::Negotiator);
        assert_eq!(page[0].commission_rate, 4.05);
        assert_eq!(page[1].sales, 80);
    }

    #[test]
    fn position_counts_strictly_better_sellers() {
        assert_eq!(position_after(0), 1);
        assert_eq!(position_after(4), 5);
    }
}
