//! Sale lifecycle: `pending -> paid -> shipped -> delivered`, with cancel and
//! refund exits.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Pending,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleAction {
    ConfirmPayment,
    Ship,
    Deliver,
    Cancel,
    Refund,
}

impl SaleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled | Self::Refunded)
    }

    /// Statuses that still hold the listing for their buyer.
    pub const OPEN: [SaleStatus; 3] = [Self::Pending, Self::Paid, Self::Shipped];

    pub fn is_open(self) -> bool {
        Self::OPEN.contains(&self)
    }

    /// Status reached by applying `action`, or `Conflict` when the current
    /// status does not allow it.
    pub fn apply(self, action: SaleAction) -> AppResult<SaleStatus> {
        use SaleAction::*;
        use SaleStatus::*;

        let next = match (self, action) {
            (Pending, ConfirmPayment) => Paid,
            (Paid, Ship) => Shipped,
            (Shipped, Deliver) => Delivered,
            (Pending | Paid, Cancel) => Cancelled,
            (Paid | Shipped | Delivered, Refund) => Refunded,
            _ => {
                return Err(AppError::Conflict(format!(
                    "cannot {} a {} sale",
                    action.as_str(),
                    self.as_str()
                )))
            }
        };
        Ok(next)
    }
}

impl SaleAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConfirmPayment => "confirm payment for",
            Self::Ship => "ship",
            Self::Deliver => "deliver",
            Self::Cancel => "cancel",
            Self::Refund => "refund",
        }
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SaleStatus {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            "refunded" => Ok(Self::Refunded),
            _ => Err(AppError::InvalidInput(format!("unknown sale status: {raw}"))),
        }
    }
}
