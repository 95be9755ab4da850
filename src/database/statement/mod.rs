//! Statement construction.
//!
//! Query shapes (columns, predicates, minimal-diff selection) are shared by
//! every backend and live in the provided methods of [`StatementFactory`].
//! Dialects only decide placeholder syntax, generated-key retrieval and DDL.

mod dialect;

use uuid::Uuid;

use super::value::SqlValue;
use crate::record::{
    CommentRecord, KickRecord, LookupOptions, MutableCommentRecord, MutablePlayerRecord,
    MutableRecord, MutableScopedRecord, PlayerChanges, PlayerRecord, ScopeKind, ScopedChanges,
    ScopedRecord, Status,
};

pub use dialect::{split_script, Dialect, MySqlStatements, PostgresStatements, SqliteStatements};

pub const PLAYERS: &str = "players";
pub const KICKS: &str = "kicks";
pub const COMMENTS: &str = "comments";

/// A parameterised statement ready for a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
    /// The statement inserts a row whose generated `id` should be returned.
    pub returns_id: bool,
}

/// Whose records a kick, comment or count query selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Player(Uuid),
    Staff(Uuid),
}

/// Which bans or mutes a lookup selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target<'a> {
    Player(Uuid),
    Address(&'a str),
    /// Records bound to the player, the address, or both.
    PlayerOrAddress(Uuid, &'a str),
    Staff(Uuid),
}

impl Party {
    fn predicate(self) -> (&'static str, SqlValue) {
        match self {
            Self::Player(uuid) => ("playerUuid = ?", SqlValue::uuid(uuid)),
            Self::Staff(uuid) => ("staffUuid = ?", SqlValue::uuid(uuid)),
        }
    }
}

impl Target<'_> {
    fn predicate(self) -> (&'static str, Vec<SqlValue>) {
        match self {
            Self::Player(uuid) => ("playerUuid = ?", vec![SqlValue::uuid(uuid)]),
            Self::Address(address) => ("playerIP = ?", vec![SqlValue::text(address)]),
            Self::PlayerOrAddress(uuid, address) => (
                "(playerUuid = ? OR playerIP = ?)",
                vec![SqlValue::uuid(uuid), SqlValue::text(address)],
            ),
            Self::Staff(uuid) => ("staffUuid = ?", vec![SqlValue::uuid(uuid)]),
        }
    }
}

/// Builds every statement the database controller executes.
///
/// Implementors supply the dialect hooks; the provided methods hold the
/// dialect-independent query shapes and write `?` placeholders that
/// [`StatementFactory::render`] rewrites when a dialect needs to.
pub trait StatementFactory: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// DDL script creating every table, `;`-separated.
    fn schema(&self) -> &'static str;

    /// Bound applied to lookups that pass no options.
    fn default_options(&self) -> &LookupOptions;

    /// Rewrite `?` placeholders into the dialect's syntax.
    fn render(&self, sql: String) -> String {
        sql
    }

    /// Clause appended to inserts so the generated id comes back as a row.
    fn generated_key_clause(&self) -> &'static str {
        ""
    }

    fn finish(&self, sql: String, params: Vec<SqlValue>) -> Statement {
        Statement {
            sql: self.render(sql),
            params,
            returns_id: false,
        }
    }

    fn finish_insert(&self, mut sql: String, params: Vec<SqlValue>) -> Statement {
        sql.push_str(self.generated_key_clause());
        Statement {
            returns_id: true,
            ..self.finish(sql, params)
        }
    }

    /// `SELECT * ... WHERE <predicate> [date filter] ORDER BY id LIMIT ? OFFSET ?`
    fn lookup(
        &self,
        table: &str,
        predicate: &str,
        mut params: Vec<SqlValue>,
        date_column: &str,
        options: Option<&LookupOptions>,
    ) -> Statement {
        let options = options.unwrap_or_else(|| self.default_options());
        let mut sql = format!("SELECT * FROM {table} WHERE {predicate}");

        match (options.date_after, options.date_before) {
            (Some(after), Some(before)) => {
                sql.push_str(&format!(" AND {date_column} BETWEEN ? AND ?"));
                params.push(SqlValue::timestamp(after));
                params.push(SqlValue::timestamp(before));
            }
            (None, Some(before)) => {
                sql.push_str(&format!(" AND {date_column} < ?"));
                params.push(SqlValue::timestamp(before));
            }
            (Some(after), None) => {
                sql.push_str(&format!(" AND {date_column} > ?"));
                params.push(SqlValue::timestamp(after));
            }
            (None, None) => {}
        }

        if options.sort_descending {
            sql.push_str(" ORDER BY id DESC");
        } else {
            sql.push_str(" ORDER BY id ASC");
        }
        sql.push_str(" LIMIT ? OFFSET ?");
        params.push(SqlValue::Int(i64::from(options.limit)));
        params.push(SqlValue::Int(i64::from(options.offset)));

        self.finish(sql, params)
    }

    // Players

    fn insert_player(&self, record: &PlayerRecord) -> Statement {
        let sql = format!(
            "INSERT INTO {PLAYERS} (uuid, username, lastIP, firstJoin, lastJoin, lastLeave, lastServer, playtime, totalJoins) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );
        self.finish(
            sql,
            vec![
                SqlValue::uuid(record.uuid()),
                SqlValue::text(record.username()),
                SqlValue::opt_text(record.last_address()),
                SqlValue::timestamp(record.first_join()),
                SqlValue::timestamp(record.last_join()),
                SqlValue::Timestamp(record.last_leave()),
                SqlValue::opt_text(record.last_server()),
                SqlValue::Int(record.playtime_millis()),
                SqlValue::Int(record.total_joins()),
            ],
        )
    }

    /// Narrowest write covering the player's dirty column groups.
    ///
    /// Two or more groups produce the full-row update, one group its own
    /// update, and none an insert.
    fn update_player(&self, mutable: &MutablePlayerRecord) -> Statement {
        let changes = mutable.changes();
        let record = mutable.current();
        let uuid = SqlValue::uuid(record.uuid());

        if changes.is_empty() {
            return self.insert_player(record);
        }

        if changes.bits().count_ones() > 1 {
            let sql = format!(
                "UPDATE {PLAYERS} SET username = ?, lastJoin = ?, lastLeave = ?, lastIP = ?, lastServer = ?, \
                 playtime = ?, totalJoins = ? WHERE uuid = ?"
            );
            return self.finish(
                sql,
                vec![
                    SqlValue::text(record.username()),
                    SqlValue::timestamp(record.last_join()),
                    SqlValue::Timestamp(record.last_leave()),
                    SqlValue::opt_text(record.last_address()),
                    SqlValue::opt_text(record.last_server()),
                    SqlValue::Int(record.playtime_millis()),
                    SqlValue::Int(record.total_joins()),
                    uuid,
                ],
            );
        }

        if changes.contains(PlayerChanges::JOIN_STATS) {
            let sql = format!(
                "UPDATE {PLAYERS} SET username = ?, lastJoin = ?, lastIP = ?, totalJoins = ? WHERE uuid = ?"
            );
            self.finish(
                sql,
                vec![
                    SqlValue::text(record.username()),
                    SqlValue::timestamp(record.last_join()),
                    SqlValue::opt_text(record.last_address()),
                    SqlValue::Int(record.total_joins()),
                    uuid,
                ],
            )
        } else if changes.contains(PlayerChanges::LEAVE_STATS) {
            let sql = format!(
                "UPDATE {PLAYERS} SET lastLeave = ?, lastServer = ?, playtime = ? WHERE uuid = ?"
            );
            self.finish(
                sql,
                vec![
                    SqlValue::Timestamp(record.last_leave()),
                    SqlValue::opt_text(record.last_server()),
                    SqlValue::Int(record.playtime_millis()),
                    uuid,
                ],
            )
        } else {
            let sql = format!("UPDATE {PLAYERS} SET lastServer = ? WHERE uuid = ?");
            self.finish(sql, vec![SqlValue::opt_text(record.last_server()), uuid])
        }
    }

    fn player_by_uuid(&self, uuid: Uuid) -> Statement {
        self.finish(
            format!("SELECT * FROM {PLAYERS} WHERE uuid = ?"),
            vec![SqlValue::uuid(uuid)],
        )
    }

    fn player_by_username(&self, username: &str) -> Statement {
        self.finish(
            format!("SELECT * FROM {PLAYERS} WHERE username = ?"),
            vec![SqlValue::text(username)],
        )
    }

    // Kicks

    fn insert_kick(&self, record: &KickRecord) -> Statement {
        let sql = format!(
            "INSERT INTO {KICKS} (playerUuid, staffUuid, kickDate, isGlobal, reason) VALUES (?, ?, ?, ?, ?)"
        );
        self.finish_insert(
            sql,
            vec![
                SqlValue::uuid(record.player()),
                SqlValue::opt_uuid(record.staff()),
                SqlValue::timestamp(record.kicked_at()),
                SqlValue::Bool(record.is_global()),
                SqlValue::opt_text(record.reason()),
            ],
        )
    }

    fn kick_lookup(&self, party: Party, options: Option<&LookupOptions>) -> Statement {
        let (predicate, param) = party.predicate();
        self.lookup(KICKS, predicate, vec![param], "kickDate", options)
    }

    // Comments

    fn insert_comment(&self, record: &CommentRecord) -> Statement {
        let sql = format!(
            "INSERT INTO {COMMENTS} (playerUuid, staffUuid, dateAdded, isWarning, comment) VALUES (?, ?, ?, ?, ?)"
        );
        self.finish_insert(
            sql,
            vec![
                SqlValue::uuid(record.player()),
                SqlValue::opt_uuid(record.staff()),
                SqlValue::timestamp(record.added_at()),
                SqlValue::Bool(record.is_warning()),
                SqlValue::text(record.comment()),
            ],
        )
    }

    fn update_comment(&self, mutable: &MutableCommentRecord) -> Statement {
        let record = mutable.current();
        if !mutable.is_modified() {
            return self.insert_comment(record);
        }
        let sql = format!("UPDATE {COMMENTS} SET staffUuid = ?, isWarning = ?, comment = ? WHERE id = ?");
        self.finish(
            sql,
            vec![
                SqlValue::opt_uuid(record.staff()),
                SqlValue::Bool(record.is_warning()),
                SqlValue::text(record.comment()),
                SqlValue::Int(record.id()),
            ],
        )
    }

    fn comment_lookup(
        &self,
        party: Party,
        warning: Option<bool>,
        options: Option<&LookupOptions>,
    ) -> Statement {
        let (predicate, param) = party.predicate();
        let mut params = vec![param];
        let predicate = match warning {
            Some(warning) => {
                params.push(SqlValue::Bool(warning));
                format!("{predicate} AND isWarning = ?")
            }
            None => predicate.to_string(),
        };
        self.lookup(COMMENTS, &predicate, params, "dateAdded", options)
    }

    // Counts

    fn count(&self, table: &str, party: Party) -> Statement {
        let (predicate, param) = party.predicate();
        self.finish(
            format!("SELECT COUNT(*) AS count FROM {table} WHERE {predicate}"),
            vec![param],
        )
    }
}

/// Ban and mute shapes, generic over the record kind.
///
/// Kept off the trait so `dyn StatementFactory` stays usable.
impl dyn StatementFactory + '_ {
    pub fn insert_scoped<K: ScopeKind>(&self, record: &ScopedRecord<K>) -> Statement {
        let sql = format!(
            "INSERT INTO {} (status, playerUuid, staffUuid, {}, playerIP, {}, {}, contexts, reason, {}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            K::TABLE,
            K::TERMINATING_STAFF,
            K::ISSUED_AT,
            K::TERMINATED_AT,
            K::TERMINATION_REASON,
        );
        self.finish_insert(
            sql,
            vec![
                SqlValue::text(record.status().as_str()),
                SqlValue::opt_uuid(record.player()),
                SqlValue::opt_uuid(record.staff()),
                SqlValue::opt_uuid(record.terminating_staff()),
                SqlValue::opt_text(record.address()),
                SqlValue::timestamp(record.issued_at()),
                SqlValue::Timestamp(record.terminated_at()),
                SqlValue::opt_text(record.context()),
                SqlValue::opt_text(record.reason()),
                SqlValue::opt_text(record.termination_reason()),
            ],
        )
    }

    /// Termination changes write their four columns together; detail
    /// changes rewrite every mutable column; no changes insert.
    pub fn update_scoped<K: ScopeKind>(&self, mutable: &MutableScopedRecord<K>) -> Statement {
        let changes = mutable.changes();
        let record = mutable.current();

        if changes.is_empty() {
            return self.insert_scoped(record);
        }

        let termination = [
            SqlValue::text(record.status().as_str()),
            SqlValue::opt_uuid(record.terminating_staff()),
            SqlValue::Timestamp(record.terminated_at()),
            SqlValue::opt_text(record.termination_reason()),
        ];

        if changes == ScopedChanges::TERMINATION {
            let sql = format!(
                "UPDATE {} SET status = ?, {} = ?, {} = ?, {} = ? WHERE id = ?",
                K::TABLE,
                K::TERMINATING_STAFF,
                K::TERMINATED_AT,
                K::TERMINATION_REASON,
            );
            let mut params = termination.to_vec();
            params.push(SqlValue::Int(record.id()));
            return self.finish(sql, params);
        }

        let sql = format!(
            "UPDATE {} SET status = ?, {} = ?, {} = ?, {} = ?, staffUuid = ?, playerIP = ?, contexts = ?, reason = ? \
             WHERE id = ?",
            K::TABLE,
            K::TERMINATING_STAFF,
            K::TERMINATED_AT,
            K::TERMINATION_REASON,
        );
        let mut params = termination.to_vec();
        params.extend([
            SqlValue::opt_uuid(record.staff()),
            SqlValue::opt_text(record.address()),
            SqlValue::opt_text(record.context()),
            SqlValue::opt_text(record.reason()),
            SqlValue::Int(record.id()),
        ]);
        self.finish(sql, params)
    }

    pub fn scoped_lookup<K: ScopeKind>(
        &self,
        target: Target<'_>,
        status: Option<Status>,
        options: Option<&LookupOptions>,
    ) -> Statement {
        let (predicate, mut params) = target.predicate();
        let predicate = match status {
            Some(status) => {
                params.push(SqlValue::text(status.as_str()));
                format!("{predicate} AND status = ?")
            }
            None => predicate.to_string(),
        };
        self.lookup(K::TABLE, &predicate, params, K::ISSUED_AT, options)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, NaiveDate};

    use super::*;
    use crate::record::{BanBuilder, CommentBuilder, Modifiable, Mute};

    fn factory() -> Box<dyn StatementFactory> {
        Box::new(SqliteStatements::new(LookupOptions::default()))
    }

    fn loaded_player() -> Arc<PlayerRecord> {
        let joined = NaiveDate::from_ymd_opt(2024, 1, 5)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        Arc::new(PlayerRecord::new(Uuid::new_v4(), "Alice", joined).persisted())
    }

    #[test]
    fn test_leave_stats_touch_only_leave_columns() {
        let mut mutable = loaded_player().to_mutable();
        mutable.add_playtime(std::time::Duration::from_secs(600));
        mutable.set_last_leave(Some(mutable.current().last_join() + Duration::minutes(10)));

        let statement = factory().update_player(&mutable);

        assert_eq!(
            statement.sql,
            "UPDATE players SET lastLeave = ?, lastServer = ?, playtime = ? WHERE uuid = ?"
        );
        assert_eq!(statement.params.len(), 4);
        assert_eq!(statement.params[2], SqlValue::Int(600_000));
    }

    #[test]
    fn test_two_groups_use_full_row_update() {
        let mut mutable = loaded_player().to_mutable();
        mutable.increment_total_joins();
        mutable.set_last_server(Some("survival".to_string()));

        let statement = factory().update_player(&mutable);

        assert!(statement.sql.starts_with(
            "UPDATE players SET username = ?, lastJoin = ?, lastLeave = ?, lastIP = ?, lastServer = ?"
        ));
        assert_eq!(statement.params.len(), 8);
    }

    #[test]
    fn test_dynamic_stats_update() {
        let mut mutable = loaded_player().to_mutable();
        mutable.set_last_server(Some("arena".to_string()));

        let statement = factory().update_player(&mutable);

        assert_eq!(statement.sql, "UPDATE players SET lastServer = ? WHERE uuid = ?");
    }

    #[test]
    fn test_unchanged_player_falls_back_to_insert() {
        let mutable = loaded_player().to_mutable();

        let statement = factory().update_player(&mutable);

        assert!(statement.sql.starts_with("INSERT INTO players"));
        assert!(!statement.returns_id);
    }

    #[test]
    fn test_termination_update_uses_kind_columns() {
        let ban = BanBuilder::new().player(Uuid::new_v4()).build().unwrap();
        let mut mutable = Arc::new(ban.persisted(4)).to_mutable();
        mutable.terminate_now(None, Some("appealed".to_string()));

        let statement = factory().update_scoped(&mutable);

        assert_eq!(
            statement.sql,
            "UPDATE bans SET status = ?, unbanStaffUuid = ?, unbanDate = ?, unbanReason = ? WHERE id = ?"
        );
        assert_eq!(statement.params[0], SqlValue::text("Ended"));
        assert_eq!(statement.params[4], SqlValue::Int(4));
    }

    #[test]
    fn test_fresh_ban_inserts_with_generated_key() {
        let ban = Arc::new(BanBuilder::new().address("10.1.1.1").build().unwrap());

        let statement = factory().update_scoped(&ban.to_mutable());

        assert!(statement.sql.starts_with("INSERT INTO bans (status, playerUuid"));
        assert!(statement.returns_id);
        assert_eq!(statement.params[1], SqlValue::Text(None));
    }

    #[test]
    fn test_date_filter_shapes() {
        let uuid = Uuid::new_v4();
        let before = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let after = before - Duration::days(30);
        let factory = factory();

        let both = factory.scoped_lookup::<Mute>(
            Target::Player(uuid),
            Some(Status::Active),
            Some(&LookupOptions::with_limit(5).after(after).before(before)),
        );
        assert_eq!(
            both.sql,
            "SELECT * FROM mutes WHERE playerUuid = ? AND status = ? AND muteDate BETWEEN ? AND ? \
             ORDER BY id DESC LIMIT ? OFFSET ?"
        );
        assert_eq!(both.params[2], SqlValue::timestamp(after));
        assert_eq!(both.params[3], SqlValue::timestamp(before));
        assert_eq!(both.params[4], SqlValue::Int(5));

        let only_before = factory.kick_lookup(
            Party::Player(uuid),
            Some(&LookupOptions::default().before(before).ascending()),
        );
        assert_eq!(
            only_before.sql,
            "SELECT * FROM kicks WHERE playerUuid = ? AND kickDate < ? ORDER BY id ASC LIMIT ? OFFSET ?"
        );

        let only_after = factory.comment_lookup(
            Party::Staff(uuid),
            Some(true),
            Some(&LookupOptions::default().after(after)),
        );
        assert_eq!(
            only_after.sql,
            "SELECT * FROM comments WHERE staffUuid = ? AND isWarning = ? AND dateAdded > ? \
             ORDER BY id DESC LIMIT ? OFFSET ?"
        );
    }

    #[test]
    fn test_missing_options_apply_default_bound() {
        let statement = factory().scoped_lookup::<crate::record::Ban>(
            Target::PlayerOrAddress(Uuid::new_v4(), "10.0.0.9"),
            None,
            None,
        );

        assert!(statement.sql.starts_with("SELECT * FROM bans WHERE (playerUuid = ? OR playerIP = ?)"));
        assert_eq!(statement.params[2], SqlValue::Int(100));
        assert_eq!(statement.params[3], SqlValue::Int(0));
    }

    #[test]
    fn test_loaded_comment_edit_updates_in_place() {
        let comment = CommentBuilder::new(Uuid::new_v4()).comment("afk farming").build().unwrap();
        let mut mutable = Arc::new(comment.persisted(9)).to_mutable();
        mutable.set_comment("afk farming, second notice");

        let statement = factory().update_comment(&mutable);

        assert_eq!(
            statement.sql,
            "UPDATE comments SET staffUuid = ?, isWarning = ?, comment = ? WHERE id = ?"
        );
    }
}
