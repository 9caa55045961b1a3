use std::collections::HashMap;
use std::env;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketConfig {
    pub bind_addr: String,
    pub database_url: String,
    pub session_ttl_hours: i64,
    pub default_country: String,
    pub webhook_secret: Option<String>,
    pub leaderboard_max_limit: u64,
    /// Usernames granted admin rights when they register.
    pub admin_usernames: Vec<String>,
}

impl MarketConfig {
    pub fn from_env() -> AppResult<Self> {
        Self::from_map(&env_map())
    }

    pub fn from_map(vars: &HashMap<String, String>) -> AppResult<Self> {
        let session_ttl_hours = parse(vars, "TRADEFY_SESSION_TTL_HOURS", 24_i64)?;
        if session_ttl_hours <= 0 {
            return Err(AppError::Config(
                "TRADEFY_SESSION_TTL_HOURS must be positive".to_string(),
            ));
        }

        Ok(Self {
            bind_addr: get(vars, "TRADEFY_BIND_ADDR", "0.0.0.0:8080"),
            database_url: get(vars, "TRADEFY_DATABASE_URL", "sqlite://tradefy.db?mode=rwc"),
            session_ttl_hours,
            default_country: get(vars, "TRADEFY_DEFAULT_COUNTRY", "Bénin"),
            webhook_secret: optional(vars, "TRADEFY_WEBHOOK_SECRET"),
            leaderboard_max_limit: parse(vars, "TRADEFY_LEADERBOARD_MAX_LIMIT", 100_u64)?,
            admin_usernames: csv(vars, "TRADEFY_ADMIN_USERNAMES"),
        })
    }

    pub fn is_admin_username(&self, username: &str) -> bool {
        self.admin_usernames
            .iter()
            .any(|admin| admin.eq_ignore_ascii_case(username))
    }
}

fn env_map() -> HashMap<String, String> {
    env::vars().collect()
}

fn get(vars: &HashMap<String, String>, key: &str, default: &str) -> String {
    vars.get(key)
        .cloned()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn optional(vars: &HashMap<String, String>, key: &str) -> Option<String> {
    vars.get(key).cloned().filter(|v| !v.is_empty())
}

fn csv(vars: &HashMap<String, String>, key: &str) -> Vec<String> {
    vars.get(key)
        .map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn parse<T: std::str::FromStr>(
    vars: &HashMap<String, String>,
    key: &str,
    default: T,
) -> AppResult<T> {
    match optional(vars, key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("invalid value for {key}: {raw}"))),
        None => Ok(default),
    }
}
