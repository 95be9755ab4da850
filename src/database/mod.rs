//! Database module exports.

mod backend;
mod controller;
mod loader;
mod statement;
mod value;

pub use backend::{Backend, MySqlBackend, PostgresBackend, SqliteBackend};
pub use controller::DatabaseController;
pub use loader::FromRow;
pub use statement::{
    split_script, Dialect, MySqlStatements, Party, PostgresStatements, SqliteStatements, Statement,
    StatementFactory, Target, COMMENTS, KICKS, PLAYERS,
};
pub use value::{SqlRow, SqlValue, TIMESTAMP_TEXT_FORMAT};

#[cfg(test)]
pub(crate) use controller::tests::{flaky_controller, recording_controller};
