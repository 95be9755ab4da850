//! MySQL / MariaDB backend over the driver's own pool.

use chrono::{Datelike, NaiveDate, Timelike};
use mysql::consts::CapabilityFlags;
use mysql::prelude::Queryable;
use mysql::{OptsBuilder, Params, Pool, PoolConstraints, PoolOpts, PooledConn, Row, Value};
use once_cell::sync::OnceCell;
use tracing::info;

use super::{Backend, integral};
use crate::config::DatabaseConfig;
use crate::database::statement::Statement;
use crate::database::value::{SqlRow, SqlValue};
use crate::error::StoreError;

/// The pool is opened on first use.
pub struct MySqlBackend {
    settings: DatabaseConfig,
    pool: OnceCell<Pool>,
}

impl MySqlBackend {
    pub fn new(settings: DatabaseConfig) -> Self {
        Self {
            settings,
            pool: OnceCell::new(),
        }
    }

    fn connection(&self) -> Result<PooledConn, StoreError> {
        let pool = self.pool.get_or_try_init(|| {
            let opts = connect_options(&self.settings);
            let pool = Pool::new(opts)?;
            info!(
                "Opened MySQL pool to {}:{} (max {} connections)",
                self.settings.host, self.settings.port, self.settings.pool_size
            );
            Ok::<_, StoreError>(pool)
        })?;
        Ok(pool.get_conn()?)
    }
}

/// Affected-row counts report matched rows, as on SQLite and Postgres.
///
/// Without `CLIENT_FOUND_ROWS` an UPDATE that rewrites a row with its current
/// values reports zero and would read as a missing row.
fn connect_options(settings: &DatabaseConfig) -> OptsBuilder {
    let max = settings.pool_size as usize;
    let constraints = PoolConstraints::new(1, max).unwrap_or_default();
    OptsBuilder::new()
        .ip_or_hostname(Some(settings.host.clone()))
        .tcp_port(settings.port)
        .user(Some(settings.user.clone()))
        .pass(settings.password.clone())
        .db_name(Some(settings.name.clone()))
        .additional_capabilities(CapabilityFlags::CLIENT_FOUND_ROWS)
        .pool_opts(PoolOpts::default().with_constraints(constraints))
}

fn bind(params: &[SqlValue]) -> Params {
    if params.is_empty() {
        return Params::Empty;
    }
    Params::Positional(
        params
            .iter()
            .map(|value| match value {
                SqlValue::Text(Some(text)) => Value::Bytes(text.as_bytes().to_vec()),
                SqlValue::Text(None) | SqlValue::Timestamp(None) => Value::NULL,
                SqlValue::Int(value) => Value::Int(*value),
                SqlValue::Bool(value) => Value::Int(i64::from(*value)),
                SqlValue::Timestamp(Some(at)) => Value::Date(
                    at.year() as u16,
                    at.month() as u8,
                    at.day() as u8,
                    at.hour() as u8,
                    at.minute() as u8,
                    at.second() as u8,
                    at.nanosecond() / 1_000,
                ),
            })
            .collect(),
    )
}

fn decode(column: &str, value: &Value) -> Result<SqlValue, StoreError> {
    Ok(match value {
        Value::NULL => SqlValue::Text(None),
        Value::Bytes(bytes) => SqlValue::Text(Some(String::from_utf8_lossy(bytes).into_owned())),
        Value::Int(value) => SqlValue::Int(*value),
        Value::UInt(value) => SqlValue::Int(i64::try_from(*value).unwrap_or(i64::MAX)),
        Value::Float(value) => integral(column, f64::from(*value))?,
        Value::Double(value) => integral(column, *value)?,
        Value::Date(year, month, day, hour, minute, second, micros) => SqlValue::Timestamp(
            NaiveDate::from_ymd_opt(i32::from(*year), u32::from(*month), u32::from(*day)).and_then(
                |date| {
                    date.and_hms_micro_opt(
                        u32::from(*hour),
                        u32::from(*minute),
                        u32::from(*second),
                        *micros,
                    )
                },
            ),
        ),
        Value::Time(..) => SqlValue::Text(Some(value.as_sql(true))),
    })
}

fn to_sql_row(row: &Row) -> Result<SqlRow, StoreError> {
    let columns: Vec<String> = row
        .columns_ref()
        .iter()
        .map(|column| column.name_str().into_owned())
        .collect();
    let values = columns
        .iter()
        .enumerate()
        .map(|(index, column)| row.as_ref(index).map_or(Ok(SqlValue::Text(None)), |value| decode(column, value)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SqlRow::new(columns, values))
}

impl Backend for MySqlBackend {
    fn describe(&self) -> String {
        format!(
            "mysql://{}@{}:{}/{}",
            self.settings.user, self.settings.host, self.settings.port, self.settings.name
        )
    }

    fn query(&self, statement: &Statement) -> Result<Vec<SqlRow>, StoreError> {
        let mut conn = self.connection()?;
        let rows: Vec<Row> = conn.exec(statement.sql.as_str(), bind(&statement.params))?;
        rows.iter().map(to_sql_row).collect()
    }

    fn execute(&self, statement: &Statement) -> Result<u64, StoreError> {
        let mut conn = self.connection()?;
        if statement.params.is_empty() {
            conn.query_drop(statement.sql.as_str())?;
        } else {
            conn.exec_drop(statement.sql.as_str(), bind(&statement.params))?;
        }
        Ok(conn.affected_rows())
    }

    fn insert(&self, statement: &Statement) -> Result<i64, StoreError> {
        let mut conn = self.connection()?;
        conn.exec_drop(statement.sql.as_str(), bind(&statement.params))?;
        i64::try_from(conn.last_insert_id())
            .map_err(|_| StoreError::decode("id", "generated key out of range"))
    }
}
