//! Backend-neutral statement parameters and result rows.

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::error::StoreError;

/// Timestamp text layout used by backends without a native timestamp type.
///
/// Fixed-width fractional seconds keep lexicographic order equal to time order.
pub const TIMESTAMP_TEXT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

/// A bound parameter or a decoded column.
///
/// Nullable variants carry their type so typed backends can bind a `NULL`
/// of the right column type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Text(Option<String>),
    Int(i64),
    Bool(bool),
    Timestamp(Option<NaiveDateTime>),
}

impl SqlValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(Some(value.into()))
    }

    pub fn opt_text(value: Option<&str>) -> Self {
        Self::Text(value.map(str::to_string))
    }

    pub fn uuid(value: Uuid) -> Self {
        Self::Text(Some(value.to_string()))
    }

    pub fn opt_uuid(value: Option<Uuid>) -> Self {
        Self::Text(value.map(|uuid| uuid.to_string()))
    }

    pub fn timestamp(value: NaiveDateTime) -> Self {
        Self::Timestamp(Some(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Text(None) | Self::Timestamp(None))
    }
}

/// One result row, with columns addressable by name.
///
/// Name lookup ignores ASCII case since PostgreSQL folds unquoted identifiers
/// to lowercase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlRow {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl SqlRow {
    pub fn new(columns: Vec<String>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    pub fn get(&self, column: &str) -> Result<&SqlValue, StoreError> {
        self.columns
            .iter()
            .position(|name| name.eq_ignore_ascii_case(column))
            .and_then(|index| self.values.get(index))
            .ok_or_else(|| StoreError::decode(column, "column missing from result"))
    }

    pub fn opt_text(&self, column: &str) -> Result<Option<String>, StoreError> {
        match self.get(column)? {
            SqlValue::Text(value) => Ok(value.clone()),
            SqlValue::Int(value) => Ok(Some(value.to_string())),
            SqlValue::Timestamp(None) => Ok(None),
            other => Err(StoreError::decode(column, format!("expected text, got {other:?}"))),
        }
    }

    pub fn text(&self, column: &str) -> Result<String, StoreError> {
        self.opt_text(column)?
            .ok_or_else(|| StoreError::decode(column, "unexpected NULL"))
    }

    pub fn int(&self, column: &str) -> Result<i64, StoreError> {
        match self.get(column)? {
            SqlValue::Int(value) => Ok(*value),
            SqlValue::Bool(value) => Ok(i64::from(*value)),
            SqlValue::Text(Some(value)) => value
                .trim()
                .parse()
                .map_err(|_| StoreError::decode(column, format!("`{value}` is not an integer"))),
            other => Err(StoreError::decode(column, format!("expected integer, got {other:?}"))),
        }
    }

    pub fn bool(&self, column: &str) -> Result<bool, StoreError> {
        match self.get(column)? {
            SqlValue::Bool(value) => Ok(*value),
            SqlValue::Int(value) => Ok(*value != 0),
            other => Err(StoreError::decode(column, format!("expected boolean, got {other:?}"))),
        }
    }

    pub fn opt_timestamp(&self, column: &str) -> Result<Option<NaiveDateTime>, StoreError> {
        match self.get(column)? {
            SqlValue::Timestamp(value) => Ok(*value),
            SqlValue::Text(None) => Ok(None),
            SqlValue::Text(Some(text)) => parse_timestamp(text)
                .map(Some)
                .ok_or_else(|| StoreError::decode(column, format!("`{text}` is not a timestamp"))),
            other => Err(StoreError::decode(column, format!("expected timestamp, got {other:?}"))),
        }
    }

    pub fn timestamp(&self, column: &str) -> Result<NaiveDateTime, StoreError> {
        self.opt_timestamp(column)?
            .ok_or_else(|| StoreError::decode(column, "unexpected NULL"))
    }

    pub fn opt_uuid(&self, column: &str) -> Result<Option<Uuid>, StoreError> {
        self.opt_text(column)?
            .map(|text| {
                Uuid::parse_str(text.trim())
                    .map_err(|error| StoreError::decode(column, error.to_string()))
            })
            .transpose()
    }

    pub fn uuid(&self, column: &str) -> Result<Uuid, StoreError> {
        self.opt_uuid(column)?
            .ok_or_else(|| StoreError::decode(column, "unexpected NULL"))
    }
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text.trim(), format).ok())
}
