use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Draft,
    Published,
    Sold,
    Archived,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    Electronics,
    Fashion,
    Home,
    Beauty,
    Sports,
    Toys,
    Books,
    #[default]
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    #[default]
    MobileMoney,
    CreditCard,
    BankTransfer,
}

impl ProductStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Sold => "sold",
            Self::Archived => "archived",
        }
    }
}

impl FromStr for ProductStatus {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            "sold" => Ok(Self::Sold),
            "archived" => Ok(Self::Archived),
            _ => Err(AppError::InvalidInput(format!("unknown product status: {raw}"))),
        }
    }
}

impl ProductCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Electronics => "electronics",
            Self::Fashion => "fashion",
            Self::Home => "home",
            Self::Beauty => "beauty",
            Self::Sports => "sports",
            Self::Toys => "toys",
            Self::Books => "books",
            Self::Other => "other",
        }
    }
}

impl FromStr for ProductCategory {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "electronics" => Ok(Self::Electronics),
            "fashion" => Ok(Self::Fashion),
            "home" => Ok(Self::Home),
            "beauty" => Ok(Self::Beauty),
            "sports" => Ok(Self::Sports),
            "toys" => Ok(Self::Toys),
            "books" => Ok(Self::Books),
            "other" => Ok(Self::Other),
            _ => Err(AppError::InvalidInput(format!(
                "unknown product category: {raw}"
            ))),
        }
    }
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::MobileMoney => "mobile_money",
            Self::CreditCard => "credit_card",
            Self::BankTransfer => "bank_transfer",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "cash" => Ok(Self::Cash),
            "mobile_money" => Ok(Self::MobileMoney),
            "credit_card" => Ok(Self::CreditCard),
            "bank_transfer" => Ok(Self::BankTransfer),
            _ => Err(AppError::InvalidInput(format!("unknown payment method: {raw}"))),
        }
    }
}
