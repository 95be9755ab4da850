//! Connection owners for each supported backend.
//!
//! A backend only moves statements and rows; it never builds SQL.

mod mysql;
mod postgres;
mod sqlite;

use super::statement::Statement;
use super::value::{SqlRow, SqlValue};
use crate::error::StoreError;

pub use self::mysql::MySqlBackend;
pub use self::postgres::PostgresBackend;
pub use self::sqlite::SqliteBackend;

pub trait Backend: Send + Sync {
    /// Short label for logs.
    fn describe(&self) -> String;

    fn query(&self, statement: &Statement) -> Result<Vec<SqlRow>, StoreError>;

    /// Run a statement and return the affected row count.
    fn execute(&self, statement: &Statement) -> Result<u64, StoreError>;

    /// Run an insert and return the generated id.
    fn insert(&self, statement: &Statement) -> Result<i64, StoreError>;
}

/// Floating point columns only ever carry whole numbers here.
fn integral(column: &str, value: f64) -> Result<SqlValue, StoreError> {
    if value.fract() != 0.0 || !(i64::MIN as f64..i64::MAX as f64).contains(&value) {
        return Err(StoreError::decode(column, format!("{value} is not an integer")));
    }
    Ok(SqlValue::Int(value as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_whole_reals_decode() {
        assert_eq!(integral("playtime", 3_600_000.0).unwrap(), SqlValue::Int(3_600_000));
        assert!(matches!(
            integral("playtime", 12.5),
            Err(StoreError::Decode { column, .. }) if column == "playtime"
        ));
        assert!(integral("id", f64::NAN).is_err());
        assert!(integral("id", 1e300).is_err());
    }
}
