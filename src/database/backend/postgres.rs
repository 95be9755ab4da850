//! PostgreSQL backend over an r2d2 pool.

use chrono::NaiveDateTime;
use once_cell::sync::OnceCell;
use postgres::types::{ToSql, Type};
use postgres::{NoTls, Row};
use r2d2::{Pool, PooledConnection};
use r2d2_postgres::PostgresConnectionManager;
use tracing::info;

use super::Backend;
use crate::config::DatabaseConfig;
use crate::database::statement::Statement;
use crate::database::value::{SqlRow, SqlValue};
use crate::error::StoreError;

type Manager = PostgresConnectionManager<NoTls>;

/// The pool is opened on first use.
pub struct PostgresBackend {
    settings: DatabaseConfig,
    pool: OnceCell<Pool<Manager>>,
}

impl PostgresBackend {
    pub fn new(settings: DatabaseConfig) -> Self {
        Self {
            settings,
            pool: OnceCell::new(),
        }
    }

    fn connection(&self) -> Result<PooledConnection<Manager>, StoreError> {
        let pool = self.pool.get_or_try_init(|| {
            let mut config = postgres::Config::new();
            config
                .host(&self.settings.host)
                .port(self.settings.port)
                .user(&self.settings.user)
                .dbname(&self.settings.name);
            if let Some(password) = &self.settings.password {
                config.password(password);
            }

            let pool = Pool::builder()
                .max_size(self.settings.pool_size)
                .build(PostgresConnectionManager::new(config, NoTls))?;
            info!(
                "Opened PostgreSQL pool to {}:{} (max {} connections)",
                self.settings.host, self.settings.port, self.settings.pool_size
            );
            Ok::<_, StoreError>(pool)
        })?;
        Ok(pool.get()?)
    }
}

fn bind(value: &SqlValue) -> Box<dyn ToSql + Sync + '_> {
    match value {
        SqlValue::Text(text) => Box::new(text.as_deref()),
        SqlValue::Int(value) => Box::new(*value),
        SqlValue::Bool(value) => Box::new(*value),
        SqlValue::Timestamp(at) => Box::new(*at),
    }
}

fn decode(row: &Row, index: usize, ty: &Type) -> Result<SqlValue, StoreError> {
    let value = if *ty == Type::INT8 {
        let value: Option<i64> = row.try_get(index)?;
        value.map_or(SqlValue::Text(None), SqlValue::Int)
    } else if *ty == Type::INT4 {
        let value: Option<i32> = row.try_get(index)?;
        value.map_or(SqlValue::Text(None), |v| SqlValue::Int(i64::from(v)))
    } else if *ty == Type::INT2 {
        let value: Option<i16> = row.try_get(index)?;
        value.map_or(SqlValue::Text(None), |v| SqlValue::Int(i64::from(v)))
    } else if *ty == Type::BOOL {
        let value: Option<bool> = row.try_get(index)?;
        value.map_or(SqlValue::Text(None), SqlValue::Bool)
    } else if *ty == Type::TIMESTAMP {
        let value: Option<NaiveDateTime> = row.try_get(index)?;
        SqlValue::Timestamp(value)
    } else {
        let value: Option<String> = row.try_get(index)?;
        SqlValue::Text(value)
    };
    Ok(value)
}

fn to_sql_row(row: &Row) -> Result<SqlRow, StoreError> {
    let columns = row.columns();
    let names = columns.iter().map(|c| c.name().to_string()).collect();
    let values = columns
        .iter()
        .enumerate()
        .map(|(index, column)| decode(row, index, column.type_()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SqlRow::new(names, values))
}

impl Backend for PostgresBackend {
    fn describe(&self) -> String {
        format!(
            "postgres://{}@{}:{}/{}",
            self.settings.user, self.settings.host, self.settings.port, self.settings.name
        )
    }

    fn query(&self, statement: &Statement) -> Result<Vec<SqlRow>, StoreError> {
        let bound: Vec<_> = statement.params.iter().map(bind).collect();
        let params: Vec<&(dyn ToSql + Sync)> = bound.iter().map(|p| p.as_ref()).collect();

        let mut conn = self.connection()?;
        conn.query(statement.sql.as_str(), &params)?
            .iter()
            .map(to_sql_row)
            .collect()
    }

    fn execute(&self, statement: &Statement) -> Result<u64, StoreError> {
        let bound: Vec<_> = statement.params.iter().map(bind).collect();
        let params: Vec<&(dyn ToSql + Sync)> = bound.iter().map(|p| p.as_ref()).collect();

        let mut conn = self.connection()?;
        Ok(conn.execute(statement.sql.as_str(), &params)?)
    }

    fn insert(&self, statement: &Statement) -> Result<i64, StoreError> {
        let bound: Vec<_> = statement.params.iter().map(bind).collect();
        let params: Vec<&(dyn ToSql + Sync)> = bound.iter().map(|p| p.as_ref()).collect();

        let mut conn = self.connection()?;
        let row = conn.query_one(statement.sql.as_str(), &params)?;
        Ok(row.try_get("id")?)
    }
}
