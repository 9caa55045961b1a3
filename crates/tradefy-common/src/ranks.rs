//! Seller rank tiers and the commission schedule tied to lifetime sales.
//!
//! The table is fixed at compile time and ordered by descending `min_sales`,
//! ending at a zero threshold so every sales count lands in exactly one tier.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankName {
    Profane,
    Beginner,
    Merchant,
    Negotiator,
    Broker,
    Magnate,
    Senior,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankTier {
    pub name: RankName,
    pub display_name: &'static str,
    pub min_sales: u64,
    /// Percentage of the sale price kept by the platform.
    pub commission_rate: f64,
}

pub const RANK_TABLE: [RankTier; 7] = [
    RankTier {
        name: RankName::Senior,
        display_name: "Senior",
        min_sales: 2850,
        commission_rate: 3.6,
    },
    RankTier {
        name: RankName::Magnate,
        display_name: "Magnat",
        min_sales: 1005,
        commission_rate: 3.75,
    },
    RankTier {
        name: RankName::Broker,
        display_name: "Courtier",
        min_sales: 555,
        commission_rate: 3.9,
    },
    RankTier {
        name: RankName::Negotiator,
        display_name: "Négociant",
        min_sales: 228,
        commission_rate: 4.05,
    },
    RankTier {
        name: RankName::Merchant,
        display_name: "Marchand",
        min_sales: 75,
        commission_rate: 4.2,
    },
    RankTier {
        name: RankName::Beginner,
        display_name: "Débutant",
        min_sales: 25,
        commission_rate: 4.35,
    },
    RankTier {
        name: RankName::Profane,
        display_name: "Profane",
        min_sales: 0,
        commission_rate: 4.5,
    },
];

const LOWEST_TIER: usize = RANK_TABLE.len() - 1;

impl RankName {
    pub const ALL: [RankName; 7] = [
        RankName::Profane,
        RankName::Beginner,
        RankName::Merchant,
        RankName::Negotiator,
        RankName::Broker,
        RankName::Magnate,
        RankName::Senior,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Profane => "profane",
            Self::Beginner => "beginner",
            Self::Merchant => "merchant",
            Self::Negotiator => "negotiator",
            Self::Broker => "broker",
            Self::Magnate => "magnate",
            Self::Senior => "senior",
        }
    }

    /// The table row for this rank.
    pub fn tier(self) -> &'static RankTier {
        &RANK_TABLE[self.table_index()]
    }

    pub fn display_name(self) -> &'static str {
        self.tier().display_name
    }

    fn table_index(self) -> usize {
        match self {
            Self::Senior => 0,
            Self::Magnate => 1,
            Self::Broker => 2,
            Self::Negotiator => 3,
            Self::Merchant => 4,
            Self::Beginner => 5,
            Self::Profane => 6,
        }
    }
}

impl fmt::Display for RankName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RankName {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        RankName::ALL
            .into_iter()
            .find(|rank| rank.as_str() == raw)
            .ok_or_else(|| AppError::InvalidInput(format!("unknown rank: {raw}")))
    }
}

/// Tier occupied by a seller with `sales_count` completed sales.
///
/// Thresholds are inclusive lower bounds: 25 sales is already `Beginner`.
pub fn resolve(sales_count: u64) -> &'static RankTier {
    &RANK_TABLE[resolve_index(sales_count)]
}

/// Display-rate lookup keyed by rank name.
pub fn commission_rate_for(rank: RankName) -> f64 {
    rank.tier().commission_rate
}

/// The tier directly above `rank`, if any.
pub fn next_tier(rank: RankName) -> Option<&'static RankTier> {
    rank.table_index()
        .checked_sub(1)
        .map(|index| &RANK_TABLE[index])
}

/// Validate a persisted counter before it reaches the resolver.
pub fn sales_count_from_i64(raw: i64) -> AppResult<u64> {
    u64::try_from(raw)
        .map_err(|_| AppError::InvalidInput(format!("sales_count must be non-negative, got {raw}")))
}

fn resolve_index(sales_count: u64) -> usize {
    RANK_TABLE
        .iter()
        .position(|tier| sales_count >= tier.min_sales)
        .unwrap_or(LOWEST_TIER)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankProgress {
    /// Share of the current tier's span already covered, in `[0, 100]`.
    pub percent_to_next: f64,
    pub next_rank: Option<RankName>,
    pub sales_remaining: Option<u64>,
}

pub fn progress(sales_count: u64) -> RankProgress {
    let index = resolve_index(sales_count);
    let Some(next_index) = index.checked_sub(1) else {
        return RankProgress {
            percent_to_next: 100.0,
            next_rank: None,
            sales_remaining: None,
        };
    };

    let current = &RANK_TABLE[index];
    let next = &RANK_TABLE[next_index];
    let span = (next.min_sales - current.min_sales) as f64;
    let covered = sales_count.saturating_sub(current.min_sales) as f64;

    RankProgress {
        percent_to_next: (covered / span * 100.0).clamp(0.0, 100.0),
        next_rank: Some(next.name),
        sales_remaining: Some(next.min_sales.saturating_sub(sales_count)),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankInfo {
    pub name: RankName,
    pub display_name: &'static str,
    pub min_sales: u64,
    pub commission_rate: f64,
    pub next_rank: Option<RankName>,
    /// Width of this tier: sales between its threshold and the next one.
    pub sales_to_next: Option<u64>,
}

/// Every tier with its promotion requirement, highest first.
pub fn rank_info() -> Vec<RankInfo> {
    RANK_TABLE
        .iter()
        .map(|tier| {
            let next = next_tier(tier.name);
            RankInfo {
                name: tier.name,
                display_name: tier.display_name,
                min_sales: tier.min_sales,
                commission_rate: tier.commission_rate,
                next_rank: next.map(|n| n.name),
                sales_to_next: next.map(|n| n.min_sales - tier.min_sales),
            }
        })
        .collect()
}
