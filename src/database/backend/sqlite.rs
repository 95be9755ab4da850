//! Embedded SQLite backend.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use rusqlite::{Connection, params_from_iter};
use tracing::info;

use super::{Backend, integral};
use crate::database::statement::Statement;
use crate::database::value::{SqlRow, SqlValue, TIMESTAMP_TEXT_FORMAT};
use crate::error::StoreError;

/// One connection serialised behind a mutex.
pub struct SqliteBackend {
    label: String,
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Open (or create) a database file. `:memory:` opens a private in-memory database.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = if path.as_os_str() == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(|e| StoreError::Connection(e.to_string()))?;

        info!("Opened SQLite database at {}", path.display());
        Ok(Self {
            label: format!("sqlite:{}", path.display()),
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::open(Path::new(":memory:"))
    }

    /// Open a SQLCipher-encrypted database file.
    #[cfg(feature = "sqlcipher")]
    pub fn open_encrypted(path: &Path, password: &str) -> Result<Self, StoreError> {
        let backend = Self::open(path)?;
        {
            let conn = backend.conn.lock();
            conn.pragma_update(None, "key", password)
                .map_err(|e| StoreError::Connection(e.to_string()))?;
            // Fails here rather than on first use when the key is wrong.
            conn.query_row("SELECT count(*) FROM sqlite_master", [], |_| Ok(()))
                .map_err(|e| StoreError::Connection(format!("cannot unlock database: {e}")))?;
        }
        Ok(Self {
            label: format!("sqlcipher:{}", path.display()),
            ..backend
        })
    }

    #[cfg(not(feature = "sqlcipher"))]
    pub fn open_encrypted(_path: &Path, _password: &str) -> Result<Self, StoreError> {
        Err(StoreError::Connection(
            "encrypted storage needs the `sqlcipher` feature".to_string(),
        ))
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Text(Some(text)) => ToSqlOutput::Borrowed(ValueRef::Text(text.as_bytes())),
            SqlValue::Text(None) | SqlValue::Timestamp(None) => ToSqlOutput::Owned(Value::Null),
            SqlValue::Int(value) => ToSqlOutput::Owned(Value::Integer(*value)),
            SqlValue::Bool(value) => ToSqlOutput::Owned(Value::Integer(i64::from(*value))),
            SqlValue::Timestamp(Some(at)) => {
                ToSqlOutput::Owned(Value::Text(at.format(TIMESTAMP_TEXT_FORMAT).to_string()))
            }
        })
    }
}

fn decode(column: &str, value: ValueRef<'_>) -> Result<SqlValue, StoreError> {
    Ok(match value {
        ValueRef::Null => SqlValue::Text(None),
        ValueRef::Integer(value) => SqlValue::Int(value),
        ValueRef::Real(value) => integral(column, value)?,
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            SqlValue::Text(Some(String::from_utf8_lossy(bytes).into_owned()))
        }
    })
}

impl Backend for SqliteBackend {
    fn describe(&self) -> String {
        self.label.clone()
    }

    fn query(&self, statement: &Statement) -> Result<Vec<SqlRow>, StoreError> {
        let conn = self.conn.lock();
        let mut prepared = conn.prepare(&statement.sql)?;
        let columns: Vec<String> = prepared
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();

        let mut rows = prepared.query(params_from_iter(statement.params.iter()))?;
        let mut decoded = Vec::new();
        while let Some(row) = rows.next()? {
            let values = columns
                .iter()
                .enumerate()
                .map(|(index, column)| decode(column, row.get_ref(index)?))
                .collect::<Result<Vec<_>, StoreError>>()?;
            decoded.push(SqlRow::new(columns.clone(), values));
        }
        Ok(decoded)
    }

    fn execute(&self, statement: &Statement) -> Result<u64, StoreError> {
        let conn = self.conn.lock();
        let changed = conn.execute(&statement.sql, params_from_iter(statement.params.iter()))?;
        Ok(changed as u64)
    }

    fn insert(&self, statement: &Statement) -> Result<i64, StoreError> {
        let conn = self.conn.lock();
        conn.execute(&statement.sql, params_from_iter(statement.params.iter()))?;
        Ok(conn.last_insert_rowid())
    }
}
