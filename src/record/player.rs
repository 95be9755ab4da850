//! Per-player statistics.

use std::sync::Arc;
use std::time::Duration;

use bitflags::bitflags;
use chrono::NaiveDateTime;
use serde::Serialize;
use uuid::Uuid;

use super::{Modifiable, MutableRecord, Record};

bitflags! {
    /// Column groups of the `players` table that a mutation touched.
    ///
    /// Each group has its own narrow UPDATE statement.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct PlayerChanges: u8 {
        /// username, lastJoin, lastIP, totalJoins
        const JOIN_STATS    = 1 << 0;
        /// lastLeave, lastServer, playtime
        const LEAVE_STATS   = 1 << 1;
        /// lastServer
        const DYNAMIC_STATS = 1 << 2;
    }
}

/// Statistics for one player, keyed by UUID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerRecord {
    pub(crate) uuid: Uuid,
    pub(crate) username: String,
    pub(crate) first_join: NaiveDateTime,
    pub(crate) last_join: NaiveDateTime,
    pub(crate) last_leave: Option<NaiveDateTime>,
    /// Milliseconds.
    pub(crate) playtime: i64,
    pub(crate) total_joins: i64,
    pub(crate) last_server: Option<String>,
    pub(crate) last_address: Option<String>,
    #[serde(skip)]
    pub(crate) loaded: bool,
}

impl PlayerRecord {
    /// A fresh record for a player seen for the first time.
    pub fn new(uuid: Uuid, username: impl Into<String>, first_join: NaiveDateTime) -> Self {
        Self {
            uuid,
            username: username.into(),
            first_join,
            last_join: first_join,
            last_leave: None,
            playtime: 0,
            total_joins: 0,
            last_server: None,
            last_address: None,
            loaded: false,
        }
    }

    #[must_use]
    pub fn with_last_address(mut self, address: impl Into<String>) -> Self {
        self.last_address = Some(address.into());
        self
    }

    #[must_use]
    pub fn with_last_server(mut self, server: impl Into<String>) -> Self {
        self.last_server = Some(server.into());
        self
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn first_join(&self) -> NaiveDateTime {
        self.first_join
    }

    pub fn last_join(&self) -> NaiveDateTime {
        self.last_join
    }

    pub fn last_leave(&self) -> Option<NaiveDateTime> {
        self.last_leave
    }

    pub fn playtime(&self) -> Duration {
        Duration::from_millis(self.playtime.max(0) as u64)
    }

    pub fn playtime_millis(&self) -> i64 {
        self.playtime
    }

    pub fn total_joins(&self) -> i64 {
        self.total_joins
    }

    pub fn last_server(&self) -> Option<&str> {
        self.last_server.as_deref()
    }

    pub fn last_address(&self) -> Option<&str> {
        self.last_address.as_deref()
    }

    pub(crate) fn persisted(&self) -> Self {
        Self {
            loaded: true,
            ..self.clone()
        }
    }
}

impl Record for PlayerRecord {
    fn is_loaded(&self) -> bool {
        self.loaded
    }
}

impl Modifiable for PlayerRecord {
    type Mutable = MutablePlayerRecord;

    fn to_mutable(self: &Arc<Self>) -> MutablePlayerRecord {
        MutablePlayerRecord {
            source: Arc::clone(self),
            pending: self.as_ref().clone(),
            changes: PlayerChanges::empty(),
        }
    }
}

/// Working copy of a [`PlayerRecord`].
#[derive(Debug, Clone)]
pub struct MutablePlayerRecord {
    source: Arc<PlayerRecord>,
    pending: PlayerRecord,
    changes: PlayerChanges,
}

impl MutablePlayerRecord {
    /// The record as it currently stands, including unsaved edits.
    pub fn current(&self) -> &PlayerRecord {
        &self.pending
    }

    /// Column groups to write back. Empty for fresh records.
    pub fn changes(&self) -> PlayerChanges {
        if self.source.loaded {
            self.changes
        } else {
            PlayerChanges::empty()
        }
    }

    pub fn set_username(&mut self, username: impl Into<String>) {
        let username = username.into();
        if username != self.pending.username {
            self.pending.username = username;
            self.changes |= PlayerChanges::JOIN_STATS;
        }
    }

    pub fn set_last_join(&mut self, last_join: NaiveDateTime) {
        if last_join != self.pending.last_join {
            self.pending.last_join = last_join;
            self.changes |= PlayerChanges::JOIN_STATS;
        }
    }

    pub fn set_last_address(&mut self, address: Option<String>) {
        if address != self.pending.last_address {
            self.pending.last_address = address;
            self.changes |= PlayerChanges::JOIN_STATS;
        }
    }

    pub fn set_total_joins(&mut self, total_joins: i64) {
        if total_joins != self.pending.total_joins {
            self.pending.total_joins = total_joins;
            self.changes |= PlayerChanges::JOIN_STATS;
        }
    }

    /// Always counts as a change.
    pub fn increment_total_joins(&mut self) {
        self.pending.total_joins += 1;
        self.changes |= PlayerChanges::JOIN_STATS;
    }

    pub fn set_last_leave(&mut self, last_leave: Option<NaiveDateTime>) {
        if last_leave != self.pending.last_leave {
            self.pending.last_leave = last_leave;
            self.changes |= PlayerChanges::LEAVE_STATS;
        }
    }

    pub fn set_playtime(&mut self, playtime: Duration) {
        let millis = saturating_millis(playtime);
        if millis != self.pending.playtime {
            self.pending.playtime = millis;
            self.changes |= PlayerChanges::LEAVE_STATS;
        }
    }

    pub fn add_playtime(&mut self, extra: Duration) {
        let millis = saturating_millis(extra);
        if millis != 0 {
            self.pending.playtime = self.pending.playtime.saturating_add(millis);
            self.changes |= PlayerChanges::LEAVE_STATS;
        }
    }

    pub fn set_last_server(&mut self, server: Option<String>) {
        if server != self.pending.last_server {
            self.pending.last_server = server;
            self.changes |= PlayerChanges::DYNAMIC_STATS;
        }
    }
}

impl MutableRecord for MutablePlayerRecord {
    type Record = PlayerRecord;

    fn original(&self) -> &Arc<PlayerRecord> {
        &self.source
    }

    fn is_modified(&self) -> bool {
        !self.changes().is_empty()
    }

    fn as_immutable(&self) -> Arc<PlayerRecord> {
        if self.changes.is_empty() {
            Arc::clone(&self.source)
        } else {
            Arc::new(self.pending.clone())
        }
    }
}

fn saturating_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
