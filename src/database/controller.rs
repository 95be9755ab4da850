//! The database controller.
//!
//! Owns one backend and one statement factory. Every operation exists in two
//! forms: a strict `try_*` form returning [`StoreError`], and a lenient form
//! that logs the failure and returns an empty collection, `None`, or `-1`.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::backend::{Backend, MySqlBackend, PostgresBackend, SqliteBackend};
use super::loader::FromRow;
use super::statement::{Dialect, Party, Statement, StatementFactory, Target, COMMENTS, KICKS};
use crate::cache::RecordStore;
use crate::config::{BackendKind, Config};
use crate::error::StoreError;
use crate::record::{
    BanRecord, CommentRecord, KickRecord, LookupOptions, MutableCommentRecord, MutablePlayerRecord,
    MutableRecord, MutableScopedRecord, MuteRecord, PlayerRecord, Record, ScopeKind, ScopedRecord, Status,
};

pub struct DatabaseController {
    backend: Box<dyn Backend>,
    statements: Box<dyn StatementFactory>,
    schema_ready: Mutex<bool>,
}

impl DatabaseController {
    /// Build the controller for the configured backend.
    ///
    /// Remote pools connect on first use, not here.
    pub fn open(config: &Config) -> Result<Self, StoreError> {
        let database = &config.database;
        let (backend, dialect): (Box<dyn Backend>, Dialect) = match database.backend {
            BackendKind::Sqlite => (Box::new(SqliteBackend::open(&database.path)?), Dialect::Sqlite),
            BackendKind::SqliteEncrypted => {
                let password = database
                    .password
                    .as_deref()
                    .ok_or_else(|| StoreError::Connection("no password for encrypted storage".to_string()))?;
                (
                    Box::new(SqliteBackend::open_encrypted(&database.path, password)?),
                    Dialect::Sqlite,
                )
            }
            BackendKind::Postgres => (
                Box::new(PostgresBackend::new(database.clone())),
                Dialect::Postgres,
            ),
            BackendKind::MySql => (Box::new(MySqlBackend::new(database.clone())), Dialect::MySql),
        };

        let statements = dialect.statements(LookupOptions::with_limit(config.lookup_limit));
        Ok(Self::with_parts(backend, statements))
    }

    pub fn with_parts(backend: Box<dyn Backend>, statements: Box<dyn StatementFactory>) -> Self {
        info!(
            "Database controller using {} ({} dialect)",
            backend.describe(),
            statements.dialect()
        );
        Self {
            backend,
            statements,
            schema_ready: Mutex::new(false),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.statements.dialect()
    }

    /// Create every table. Runs the DDL at most once per controller.
    pub fn init_schema(&self) -> Result<(), StoreError> {
        let mut ready = self.schema_ready.lock();
        if *ready {
            return Ok(());
        }

        let script = super::statement::split_script(self.statements.schema());
        for sql in &script {
            let statement = Statement {
                sql: sql.clone(),
                params: Vec::new(),
                returns_id: false,
            };
            self.backend
                .execute(&statement)
                .map_err(|e| StoreError::Schema(format!("{e} in `{sql}`")))?;
        }

        *ready = true;
        info!("Schema initialized ({} statements)", script.len());
        Ok(())
    }

    fn fetch<T: FromRow>(&self, statement: &Statement) -> Result<Vec<T>, StoreError> {
        debug!("query: {}", statement.sql);
        self.backend
            .query(statement)?
            .iter()
            .map(T::from_row)
            .collect()
    }

    fn fetch_one<T: FromRow>(&self, statement: &Statement) -> Result<Option<T>, StoreError> {
        Ok(self.fetch(statement)?.into_iter().next())
    }

    fn execute(&self, statement: &Statement) -> Result<u64, StoreError> {
        debug!("execute: {}", statement.sql);
        self.backend.execute(statement)
    }

    fn insert(&self, statement: &Statement) -> Result<i64, StoreError> {
        debug!("insert: {}", statement.sql);
        self.backend.insert(statement)
    }

    // Players

    pub fn try_player(&self, uuid: Uuid) -> Result<Option<PlayerRecord>, StoreError> {
        self.fetch_one(&self.statements.player_by_uuid(uuid))
    }

    pub fn try_player_by_username(&self, username: &str) -> Result<Option<PlayerRecord>, StoreError> {
        self.fetch_one(&self.statements.player_by_username(username))
    }

    pub fn try_insert_player(&self, record: &PlayerRecord) -> Result<PlayerRecord, StoreError> {
        self.execute(&self.statements.insert_player(record))?;
        Ok(record.persisted())
    }

    /// Write the narrowest statement covering the player's changes.
    ///
    /// A fresh record is inserted; a loaded record without changes is not
    /// written at all.
    pub fn try_save_player(&self, mutable: &MutablePlayerRecord) -> Result<Arc<PlayerRecord>, StoreError> {
        if !mutable.original().is_loaded() {
            return self.try_insert_player(mutable.current()).map(Arc::new);
        }
        if !mutable.is_modified() {
            return Ok(Arc::clone(mutable.original()));
        }
        match self.execute(&self.statements.update_player(mutable))? {
            0 => Err(StoreError::NotPersisted),
            _ => Ok(mutable.as_immutable()),
        }
    }

    // Bans and mutes

    pub fn try_scoped<K: ScopeKind>(
        &self,
        target: Target<'_>,
        status: Option<Status>,
        options: Option<&LookupOptions>,
    ) -> Result<Vec<ScopedRecord<K>>, StoreError> {
        self.fetch(&self.statements.scoped_lookup::<K>(target, status, options))
    }

    pub fn try_insert_scoped<K: ScopeKind>(&self, record: &ScopedRecord<K>) -> Result<ScopedRecord<K>, StoreError> {
        let id = self.insert(&self.statements.insert_scoped(record))?;
        Ok(record.persisted(id))
    }

    pub fn try_save_scoped<K: ScopeKind>(
        &self,
        mutable: &MutableScopedRecord<K>,
    ) -> Result<Arc<ScopedRecord<K>>, StoreError> {
        if !mutable.original().is_loaded() {
            return self.try_insert_scoped(mutable.current()).map(Arc::new);
        }
        if !mutable.is_modified() {
            return Ok(Arc::clone(mutable.original()));
        }
        match self.execute(&self.statements.update_scoped(mutable))? {
            0 => Err(StoreError::NotPersisted),
            _ => Ok(mutable.as_immutable()),
        }
    }

    // Kicks

    pub fn try_kicks(&self, party: Party, options: Option<&LookupOptions>) -> Result<Vec<KickRecord>, StoreError> {
        self.fetch(&self.statements.kick_lookup(party, options))
    }

    pub fn try_insert_kick(&self, record: &KickRecord) -> Result<KickRecord, StoreError> {
        let id = self.insert(&self.statements.insert_kick(record))?;
        Ok(record.persisted(id))
    }

    // Comments

    pub fn try_comments(
        &self,
        party: Party,
        warning: Option<bool>,
        options: Option<&LookupOptions>,
    ) -> Result<Vec<CommentRecord>, StoreError> {
        self.fetch(&self.statements.comment_lookup(party, warning, options))
    }

    pub fn try_insert_comment(&self, record: &CommentRecord) -> Result<CommentRecord, StoreError> {
        let id = self.insert(&self.statements.insert_comment(record))?;
        Ok(record.persisted(id))
    }

    pub fn try_save_comment(&self, mutable: &MutableCommentRecord) -> Result<Arc<CommentRecord>, StoreError> {
        if !mutable.original().is_loaded() {
            return self.try_insert_comment(mutable.current()).map(Arc::new);
        }
        if !mutable.is_modified() {
            return Ok(Arc::clone(mutable.original()));
        }
        match self.execute(&self.statements.update_comment(mutable))? {
            0 => Err(StoreError::NotPersisted),
            _ => Ok(mutable.as_immutable()),
        }
    }

    // Counts

    /// Rows in `table` belonging to the player or issued by the staff member.
    pub fn try_count(&self, table: &str, party: Party) -> Result<i64, StoreError> {
        let statement = self.statements.count(table, party);
        debug!("query: {}", statement.sql);
        let rows = self.backend.query(&statement)?;
        rows.first().map_or(Ok(0), |row| row.int("count"))
    }

    pub fn try_count_kicks(&self, party: Party) -> Result<i64, StoreError> {
        self.try_count(KICKS, party)
    }

    pub fn try_count_comments(&self, party: Party) -> Result<i64, StoreError> {
        self.try_count(COMMENTS, party)
    }

    pub fn try_count_scoped<K: ScopeKind>(&self, party: Party) -> Result<i64, StoreError> {
        self.try_count(K::TABLE, party)
    }

    // Lenient forms

    pub fn player(&self, uuid: Uuid) -> Option<PlayerRecord> {
        logged("player lookup", self.try_player(uuid)).flatten()
    }

    pub fn player_by_username(&self, username: &str) -> Option<PlayerRecord> {
        logged("player lookup by name", self.try_player_by_username(username)).flatten()
    }

    pub fn scoped<K: ScopeKind>(
        &self,
        target: Target<'_>,
        status: Option<Status>,
        options: Option<&LookupOptions>,
    ) -> Vec<ScopedRecord<K>> {
        logged(&format!("{} lookup", K::TABLE), self.try_scoped(target, status, options)).unwrap_or_default()
    }

    pub fn kicks(&self, party: Party, options: Option<&LookupOptions>) -> Vec<KickRecord> {
        logged("kick lookup", self.try_kicks(party, options)).unwrap_or_default()
    }

    pub fn comments(&self, party: Party, warning: Option<bool>, options: Option<&LookupOptions>) -> Vec<CommentRecord> {
        logged("comment lookup", self.try_comments(party, warning, options)).unwrap_or_default()
    }

    /// Returns `-1` when the count could not be read.
    pub fn count(&self, table: &str, party: Party) -> i64 {
        logged("count", self.try_count(table, party)).unwrap_or(-1)
    }

    /// Returns the generated id, or `-1` on failure.
    pub fn insert_scoped<K: ScopeKind>(&self, record: &ScopedRecord<K>) -> i64 {
        logged("insert", self.try_insert_scoped(record)).map_or(-1, |record| record.id())
    }

    /// Returns the generated id, or `-1` on failure.
    pub fn insert_kick(&self, record: &KickRecord) -> i64 {
        logged("insert", self.try_insert_kick(record)).map_or(-1, |record| record.id())
    }

    /// Returns the generated id, or `-1` on failure.
    pub fn insert_comment(&self, record: &CommentRecord) -> i64 {
        logged("insert", self.try_insert_comment(record)).map_or(-1, |record| record.id())
    }
}

fn logged<T>(operation: &str, result: Result<T, StoreError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            error!("Database {operation} failed: {e}");
            None
        }
    }
}

impl RecordStore for DatabaseController {
    fn load_player(&self, uuid: Uuid) -> Result<Option<PlayerRecord>, StoreError> {
        self.try_player(uuid)
    }

    fn load_bans(&self, target: Target<'_>, status: Option<Status>) -> Result<Vec<BanRecord>, StoreError> {
        self.try_scoped(target, status, None)
    }

    fn load_mutes(&self, target: Target<'_>, status: Option<Status>) -> Result<Vec<MuteRecord>, StoreError> {
        self.try_scoped(target, status, None)
    }

    fn load_kicks(&self, player: Uuid) -> Result<Vec<KickRecord>, StoreError> {
        self.try_kicks(Party::Player(player), None)
    }

    fn load_comments(&self, player: Uuid) -> Result<Vec<CommentRecord>, StoreError> {
        self.try_comments(Party::Player(player), None, None)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::database::statement::SqliteStatements;
    use crate::database::value::SqlRow;
    use crate::record::{Ban, BanBuilder, CommentBuilder, KickBuilder, Modifiable, Mute, MuteBuilder, now};

    /// Wraps an in-memory SQLite backend and records every statement.
    ///
    /// While `offline` is set every call fails with a connection error.
    pub(crate) struct Recording {
        inner: SqliteBackend,
        pub(crate) log: Arc<parking_lot::Mutex<Vec<String>>>,
        pub(crate) offline: Arc<AtomicBool>,
    }

    impl Recording {
        fn record(&self, statement: &Statement) -> Result<(), StoreError> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(StoreError::Connection("database offline".to_string()));
            }
            self.log.lock().push(statement.sql.clone());
            Ok(())
        }
    }

    impl Backend for Recording {
        fn describe(&self) -> String {
            "recording".to_string()
        }

        fn query(&self, statement: &Statement) -> Result<Vec<SqlRow>, StoreError> {
            self.record(statement)?;
            self.inner.query(statement)
        }

        fn execute(&self, statement: &Statement) -> Result<u64, StoreError> {
            self.record(statement)?;
            self.inner.execute(statement)
        }

        fn insert(&self, statement: &Statement) -> Result<i64, StoreError> {
            self.record(statement)?;
            self.inner.insert(statement)
        }
    }

    type StatementLog = Arc<parking_lot::Mutex<Vec<String>>>;

    fn recording() -> (DatabaseController, StatementLog, Arc<AtomicBool>) {
        let log = StatementLog::default();
        let offline = Arc::new(AtomicBool::new(false));
        let backend = Recording {
            inner: SqliteBackend::in_memory().unwrap(),
            log: Arc::clone(&log),
            offline: Arc::clone(&offline),
        };
        let controller = DatabaseController::with_parts(
            Box::new(backend),
            Box::new(SqliteStatements::new(LookupOptions::default())),
        );
        controller.init_schema().unwrap();
        log.lock().clear();
        (controller, log, offline)
    }

    /// A schema-initialized in-memory controller plus its statement log.
    pub(crate) fn recording_controller() -> (DatabaseController, StatementLog) {
        let (controller, log, _) = recording();
        (controller, log)
    }

    /// A schema-initialized in-memory controller that fails while the flag is set.
    pub(crate) fn flaky_controller() -> (DatabaseController, Arc<AtomicBool>) {
        let (controller, _, offline) = recording();
        (controller, offline)
    }

    fn controller() -> DatabaseController {
        recording_controller().0
    }

    #[test]
    fn test_schema_init_is_idempotent() {
        let (controller, log) = recording_controller();
        controller.init_schema().unwrap();
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_ban_round_trip_and_termination() {
        let controller = controller();
        let player = Uuid::new_v4();
        let fresh = BanBuilder::new()
            .player(player)
            .address("10.0.0.7")
            .context("lobby")
            .reason("griefing")
            .expires_after(Duration::days(7))
            .build()
            .unwrap();

        let saved = controller.try_insert_scoped(&fresh).unwrap();
        assert!(saved.id() > 0);
        assert!(saved.is_loaded());

        let found = controller.try_scoped::<Ban>(Target::Player(player), Some(Status::Active), None).unwrap();
        assert_eq!(found, vec![saved.clone()]);
        assert_eq!(found[0].address(), Some("10.0.0.7"));
        assert_eq!(found[0].terminated_at(), fresh.terminated_at());

        let mut mutable = Arc::new(found[0].clone()).to_mutable();
        mutable.terminate_now(None, Some("appeal".to_string()));
        let ended = controller.try_save_scoped(&mutable).unwrap();
        assert_eq!(ended.status(), Status::Ended);

        let active = controller.try_scoped::<Ban>(Target::Address("10.0.0.7"), Some(Status::Active), None).unwrap();
        assert!(active.is_empty());
        let all = controller
            .try_scoped::<Ban>(Target::PlayerOrAddress(Uuid::new_v4(), "10.0.0.7"), None, None)
            .unwrap();
        assert_eq!(all, vec![(*ended).clone()]);
        assert_eq!(all[0].termination_reason(), Some("appeal"));
    }

    #[test]
    fn test_every_record_survives_a_round_trip() {
        let controller = controller();
        let player = Uuid::new_v4();
        let staff = Uuid::new_v4();

        let mute = controller
            .try_insert_scoped(
                &MuteBuilder::new()
                    .player(player)
                    .address("192.168.1.20")
                    .staff(staff)
                    .context("survival")
                    .reason("spam")
                    .expires_after(Duration::hours(2))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        let mutes = controller.try_scoped::<Mute>(Target::Player(player), None, None).unwrap();
        assert_eq!(mutes, vec![mute]);

        let kick = controller
            .try_insert_kick(&KickBuilder::new(player).staff(staff).global(true).reason("afk").build())
            .unwrap();
        assert_eq!(controller.try_kicks(Party::Player(player), None).unwrap(), vec![kick]);

        let comment = controller
            .try_insert_comment(&CommentBuilder::new(player).staff(staff).warning(true).comment("watch chat").build().unwrap())
            .unwrap();
        assert_eq!(controller.try_comments(Party::Player(player), None, None).unwrap(), vec![comment]);

        let mut joined = Arc::new(PlayerRecord::new(player, "Alice", now()).with_last_address("192.168.1.20")).to_mutable();
        joined.set_last_server(Some("survival".to_string()));
        joined.set_playtime(std::time::Duration::from_secs(3_600));
        joined.set_last_leave(Some(now()));
        joined.increment_total_joins();
        let saved = controller.try_save_player(&joined).unwrap();
        assert_eq!(controller.try_player(player).unwrap().as_ref(), Some(&*saved));
    }

    #[test]
    fn test_update_restoring_current_values_still_persists() {
        let controller = controller();
        let saved = controller
            .try_insert_scoped(&BanBuilder::new().player(Uuid::new_v4()).reason("griefing").build().unwrap())
            .unwrap();

        let mut mutable = Arc::new(saved.clone()).to_mutable();
        mutable.set_reason(Some("x-ray".to_string()));
        mutable.set_reason(Some("griefing".to_string()));
        assert!(mutable.is_modified());

        // The row exists, so the update counts as persisted even though no
        // column value changed.
        let committed = controller.try_save_scoped(&mutable).unwrap();
        assert_eq!(*committed, saved);
    }

    #[test]
    fn test_player_insert_then_join_update() {
        let (controller, log) = recording_controller();
        let uuid = Uuid::new_v4();
        let fresh = Arc::new(PlayerRecord::new(uuid, "Alice", now()).with_last_address("10.9.9.9"));

        let saved = controller.try_save_player(&fresh.to_mutable()).unwrap();
        assert!(saved.is_loaded());

        let mut mutable = saved.to_mutable();
        mutable.increment_total_joins();
        controller.try_save_player(&mutable).unwrap();

        let stored = controller.try_player(uuid).unwrap().unwrap();
        assert_eq!(stored.total_joins(), 1);
        assert_eq!(stored.last_address(), Some("10.9.9.9"));

        let log = log.lock();
        assert_eq!(log.len(), 3);
        assert!(log[0].starts_with("INSERT INTO players"));
        assert_eq!(
            log[1],
            "UPDATE players SET username = ?, lastJoin = ?, lastIP = ?, totalJoins = ? WHERE uuid = ?"
        );
    }

    #[test]
    fn test_unchanged_loaded_record_is_not_written() {
        let (controller, log) = recording_controller();
        let saved = controller
            .try_insert_scoped(&MuteBuilder::new().player(Uuid::new_v4()).build().unwrap())
            .unwrap();
        log.lock().clear();

        let committed = controller.try_save_scoped(&Arc::new(saved).to_mutable()).unwrap();

        assert!(committed.is_loaded());
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_kicks_comments_and_counts() {
        let controller = controller();
        let player = Uuid::new_v4();
        let staff = Uuid::new_v4();

        for reason in ["spam", "caps"] {
            controller
                .try_insert_kick(&KickBuilder::new(player).staff(staff).reason(reason).build())
                .unwrap();
        }
        let warning = CommentBuilder::new(player).staff(staff).warning(true).comment("language").build().unwrap();
        let saved = controller.try_insert_comment(&warning).unwrap();
        controller
            .try_insert_comment(&CommentBuilder::new(player).comment("seems fine").build().unwrap())
            .unwrap();

        let kicks = controller.try_kicks(Party::Player(player), None).unwrap();
        assert_eq!(kicks[0].reason(), Some("caps"));
        assert_eq!(controller.count(KICKS, Party::Staff(staff)), 2);
        assert_eq!(controller.try_count_comments(Party::Player(player)).unwrap(), 2);

        let warnings = controller.try_comments(Party::Player(player), Some(true), None).unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].id(), saved.id());

        let mut mutable = Arc::new(saved).to_mutable();
        mutable.set_comment("language, second time");
        controller.try_save_comment(&mutable).unwrap();
        let reloaded = controller.try_comments(Party::Staff(staff), None, None).unwrap();
        assert_eq!(reloaded[0].comment(), "language, second time");
    }

    #[test]
    fn test_update_of_missing_row_is_not_persisted() {
        let controller = controller();
        let ghost = BanBuilder::new().player(Uuid::new_v4()).build().unwrap().persisted(404);
        let mut mutable = Arc::new(ghost).to_mutable();
        mutable.set_reason(Some("edited".to_string()));

        assert!(matches!(
            controller.try_save_scoped(&mutable),
            Err(StoreError::NotPersisted)
        ));
    }
}
