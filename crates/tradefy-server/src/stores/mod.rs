pub mod product;
pub mod sale;
pub mod session;
pub mod user;

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite};
use tradefy_common::error::{AppError, AppResult};

pub(crate) fn column<'r, T>(row: &'r SqliteRow, name: &str) -> AppResult<T>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| AppError::External(format!("read {name} failed: {e}")))
}

pub(crate) fn count_from_i64(raw: i64) -> AppResult<u64> {
    u64::try_from(raw).map_err(|_| AppError::External(format!("negative count: {raw}")))
}

pub(crate) fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
