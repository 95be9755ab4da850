//! Error types shared across the crate.

use thiserror::Error;

/// Rejected builder input, raised before any I/O happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("a {0} needs a target player or address")]
    MissingTarget(&'static str),

    #[error("{kind} expiry {expiry} is earlier than its issue date {issued}")]
    ExpiryBeforeIssue {
        kind: &'static str,
        issued: chrono::NaiveDateTime,
        expiry: chrono::NaiveDateTime,
    },

    #[error("{0} is required")]
    MissingField(&'static str),
}

/// A mutation that the record's lifecycle no longer allows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("cannot switch the warning flag of a persisted comment (id {0})")]
    WarningFlagLocked(i64),
}

/// Failures at the database boundary.
///
/// Cloneable so a failed single-flight load can be handed to every waiter.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("connection unavailable: {0}")]
    Connection(String),

    #[error("statement failed: {0}")]
    Statement(String),

    #[error("column `{column}` could not be decoded: {reason}")]
    Decode { column: String, reason: String },

    #[error("schema initialization failed: {0}")]
    Schema(String),

    #[error("record has no persisted identity")]
    NotPersisted,
}

impl StoreError {
    pub(crate) fn decode(column: &str, reason: impl Into<String>) -> Self {
        Self::Decode {
            column: column.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Statement(error.to_string())
    }
}

impl From<postgres::Error> for StoreError {
    fn from(error: postgres::Error) -> Self {
        if error.is_closed() {
            Self::Connection(error.to_string())
        } else {
            Self::Statement(error.to_string())
        }
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(error: r2d2::Error) -> Self {
        Self::Connection(error.to_string())
    }
}

impl From<mysql::Error> for StoreError {
    fn from(error: mysql::Error) -> Self {
        match error {
            mysql::Error::IoError(_) | mysql::Error::DriverError(_) | mysql::Error::UrlError(_) => {
                Self::Connection(error.to_string())
            }
            other => Self::Statement(other.to_string()),
        }
    }
}
