use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Split of a sale price between the platform and the seller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SaleAmounts {
    pub sale_price: f64,
    pub commission_rate: f64,
    pub commission_amount: f64,
    pub seller_earnings: f64,
}

pub fn split_sale(sale_price: f64, commission_rate: f64) -> AppResult<SaleAmounts> {
    if !sale_price.is_finite() || sale_price < 0.0 {
        return Err(AppError::InvalidInput(
            "sale_price must be a non-negative amount".to_string(),
        ));
    }
    if !(0.0..=100.0).contains(&commission_rate) {
        return Err(AppError::InvalidInput(
            "commission_rate must be between 0 and 100".to_string(),
        ));
    }

    let commission_amount = sale_price * commission_rate / 100.0;
    Ok(SaleAmounts {
        sale_price,
        commission_rate,
        commission_amount,
        seller_earnings: sale_price - commission_amount,
    })
}
