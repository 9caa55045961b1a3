use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::ranks::{self, RankName};

/// A seller's counters together with the rank they imply.
///
/// `rank` and `commission_rate` are derived from `sales_count` and are only
/// ever recomputed, never assigned, so the fields stay private.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SellerStanding {
    sales_count: u64,
    total_earnings: f64,
    rank: RankName,
    commission_rate: f64,
}

/// Rank movement caused by one completed sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Promotion {
    pub from: RankName,
    pub to: RankName,
}

impl Default for SellerStanding {
    fn default() -> Self {
        Self::derive(0, 0.0)
    }
}

impl SellerStanding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted counters; the cached rank columns are ignored.
    pub fn from_counters(sales_count: i64, total_earnings: f64) -> AppResult<Self> {
        let sales_count = ranks::sales_count_from_i64(sales_count)?;
        validate_earnings(total_earnings)?;
        Ok(Self::derive(sales_count, total_earnings))
    }

    /// Count one delivered sale and re-resolve the rank from the new total.
    pub fn record_completed_sale(&mut self, seller_earnings: f64) -> AppResult<Option<Promotion>> {
        validate_earnings(seller_earnings)?;

        let before = self.rank;
        *self = Self::derive(self.sales_count + 1, self.total_earnings + seller_earnings);

        Ok((self.rank != before).then_some(Promotion {
            from: before,
            to: self.rank,
        }))
    }

    pub fn sales_count(&self) -> u64 {
        self.sales_count
    }

    pub fn total_earnings(&self) -> f64 {
        self.total_earnings
    }

    pub fn rank(&self) -> RankName {
        self.rank
    }

    pub fn commission_rate(&self) -> f64 {
        self.commission_rate
    }

    pub fn progress(&self) -> ranks::RankProgress {
        ranks::progress(self.sales_count)
    }

    fn derive(sales_count: u64, total_earnings: f64) -> Self {
        let tier = ranks::resolve(sales_count);
        Self {
            sales_count,
            total_earnings,
            rank: tier.name,
            commission_rate: tier.commission_rate,
        }
    }
}

fn validate_earnings(amount: f64) -> AppResult<()> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(AppError::InvalidInput(
            "earnings must be a non-negative amount".to_string(),
        ));
    }
    Ok(())
}
