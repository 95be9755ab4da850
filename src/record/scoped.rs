//! Status-scoped records: bans and mutes.
//!
//! Both share one shape and differ only in the table and column names they
//! persist to, so they are a single generic record parameterised by a
//! [`ScopeKind`] marker.

use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

use bitflags::bitflags;
use chrono::NaiveDateTime;
use serde::Serialize;
use uuid::Uuid;

use super::{Modifiable, MutableRecord, Record, Status, now};

/// Storage layout of one status-scoped record kind.
pub trait ScopeKind: Debug + Clone + Copy + PartialEq + Eq + Default + Send + Sync + 'static {
    /// Lowercase noun used in logs and errors.
    const NAME: &'static str;
    const TABLE: &'static str;
    const ISSUED_AT: &'static str;
    const TERMINATED_AT: &'static str;
    const TERMINATING_STAFF: &'static str;
    const TERMINATION_REASON: &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ban;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mute;

impl ScopeKind for Ban {
    const NAME: &'static str = "ban";
    const TABLE: &'static str = "bans";
    const ISSUED_AT: &'static str = "banDate";
    const TERMINATED_AT: &'static str = "unbanDate";
    const TERMINATING_STAFF: &'static str = "unbanStaffUuid";
    const TERMINATION_REASON: &'static str = "unbanReason";
}

impl ScopeKind for Mute {
    const NAME: &'static str = "mute";
    const TABLE: &'static str = "mutes";
    const ISSUED_AT: &'static str = "muteDate";
    const TERMINATED_AT: &'static str = "unmuteDate";
    const TERMINATING_STAFF: &'static str = "unmuteStaffUuid";
    const TERMINATION_REASON: &'static str = "unmuteReason";
}

pub type BanRecord = ScopedRecord<Ban>;
pub type MuteRecord = ScopedRecord<Mute>;
pub type MutableBanRecord = MutableScopedRecord<Ban>;
pub type MutableMuteRecord = MutableScopedRecord<Mute>;

/// A ban or mute.
///
/// Targets a player, an address, or both. A `None` context means the record
/// applies globally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopedRecord<K: ScopeKind> {
    pub(crate) id: i64,
    pub(crate) status: Status,
    pub(crate) player: Option<Uuid>,
    pub(crate) staff: Option<Uuid>,
    pub(crate) terminating_staff: Option<Uuid>,
    pub(crate) issued_at: NaiveDateTime,
    pub(crate) terminated_at: Option<NaiveDateTime>,
    pub(crate) address: Option<String>,
    pub(crate) context: Option<String>,
    pub(crate) reason: Option<String>,
    pub(crate) termination_reason: Option<String>,
    #[serde(skip)]
    pub(crate) loaded: bool,
    #[serde(skip)]
    pub(crate) kind: PhantomData<K>,
}

impl<K: ScopeKind> ScopedRecord<K> {
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn player(&self) -> Option<Uuid> {
        self.player
    }

    /// `None` when issued by the console.
    pub fn staff(&self) -> Option<Uuid> {
        self.staff
    }

    pub fn terminating_staff(&self) -> Option<Uuid> {
        self.terminating_staff
    }

    pub fn issued_at(&self) -> NaiveDateTime {
        self.issued_at
    }

    /// Scheduled expiry, or the moment the record was ended.
    pub fn terminated_at(&self) -> Option<NaiveDateTime> {
        self.terminated_at
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn termination_reason(&self) -> Option<&str> {
        self.termination_reason.as_deref()
    }

    pub fn is_temporary(&self) -> bool {
        self.terminated_at.is_some()
    }

    /// Still marked active although its expiry has passed.
    pub fn is_lapsed_at(&self, now: NaiveDateTime) -> bool {
        self.status.is_active() && self.terminated_at.is_some_and(|expiry| expiry <= now)
    }

    pub(crate) fn persisted(&self, id: i64) -> Self {
        Self {
            id,
            loaded: true,
            ..self.clone()
        }
    }
}

impl<K: ScopeKind> Record for ScopedRecord<K> {
    fn is_loaded(&self) -> bool {
        self.loaded
    }
}

impl<K: ScopeKind> Modifiable for ScopedRecord<K> {
    type Mutable = MutableScopedRecord<K>;

    fn to_mutable(self: &Arc<Self>) -> MutableScopedRecord<K> {
        MutableScopedRecord {
            source: Arc::clone(self),
            pending: self.as_ref().clone(),
            changes: ScopedChanges::empty(),
        }
    }
}

bitflags! {
    /// Column groups of a ban or mute row that a mutation touched.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ScopedChanges: u8 {
        /// status, terminating staff, termination date, termination reason
        const TERMINATION = 1 << 0;
        /// staff, address, context, reason
        const DETAILS     = 1 << 1;
    }
}

/// Working copy of a ban or mute.
#[derive(Debug, Clone)]
pub struct MutableScopedRecord<K: ScopeKind> {
    source: Arc<ScopedRecord<K>>,
    pending: ScopedRecord<K>,
    changes: ScopedChanges,
}

impl<K: ScopeKind> MutableScopedRecord<K> {
    pub fn current(&self) -> &ScopedRecord<K> {
        &self.pending
    }

    /// Column groups to write back. Empty for fresh records.
    pub fn changes(&self) -> ScopedChanges {
        if self.source.loaded {
            self.changes
        } else {
            ScopedChanges::empty()
        }
    }

    pub fn id(&self) -> i64 {
        self.pending.id
    }

    pub fn set_staff(&mut self, staff: Option<Uuid>) {
        if staff != self.pending.staff {
            self.pending.staff = staff;
            self.changes |= ScopedChanges::DETAILS;
        }
    }

    pub fn set_address(&mut self, address: Option<String>) {
        if address != self.pending.address {
            self.pending.address = address;
            self.changes |= ScopedChanges::DETAILS;
        }
    }

    pub fn set_context(&mut self, context: Option<String>) {
        if context != self.pending.context {
            self.pending.context = context;
            self.changes |= ScopedChanges::DETAILS;
        }
    }

    pub fn set_reason(&mut self, reason: Option<String>) {
        if reason != self.pending.reason {
            self.pending.reason = reason;
            self.changes |= ScopedChanges::DETAILS;
        }
    }

    /// Schedule expiry at `expiry` and derive the status from it.
    ///
    /// Prior termination staff and reason are cleared either way.
    pub fn set_auto_expiry(&mut self, expiry: NaiveDateTime) {
        let status = if expiry <= now() {
            Status::Expired
        } else {
            Status::Active
        };
        self.set_termination(status, Some(expiry), None, None);
    }

    /// End the record immediately. Overwrites any earlier termination.
    pub fn terminate_now(&mut self, staff: Option<Uuid>, reason: Option<String>) {
        self.pending.status = Status::Ended;
        self.pending.terminated_at = Some(now());
        self.pending.terminating_staff = staff;
        self.pending.termination_reason = reason;
        self.changes |= ScopedChanges::TERMINATION;
    }

    /// Make the record active again with no expiry.
    pub fn reinstate(&mut self) {
        self.set_termination(Status::Active, None, None, None);
    }

    /// Move an active record whose expiry has passed to [`Status::Expired`].
    ///
    /// Returns whether anything changed.
    pub fn expire_if_lapsed(&mut self, at: NaiveDateTime) -> bool {
        if !self.pending.is_lapsed_at(at) {
            return false;
        }
        self.pending.status = Status::Expired;
        self.changes |= ScopedChanges::TERMINATION;
        true
    }

    fn set_termination(
        &mut self,
        status: Status,
        terminated_at: Option<NaiveDateTime>,
        staff: Option<Uuid>,
        reason: Option<String>,
    ) {
        let record = &mut self.pending;
        if record.status == status
            && record.terminated_at == terminated_at
            && record.terminating_staff == staff
            && record.termination_reason == reason
        {
            return;
        }
        record.status = status;
        record.terminated_at = terminated_at;
        record.terminating_staff = staff;
        record.termination_reason = reason;
        self.changes |= ScopedChanges::TERMINATION;
    }
}

impl<K: ScopeKind> MutableRecord for MutableScopedRecord<K> {
    type Record = ScopedRecord<K>;

    fn original(&self) -> &Arc<ScopedRecord<K>> {
        &self.source
    }

    fn is_modified(&self) -> bool {
        !self.changes().is_empty()
    }

    fn as_immutable(&self) -> Arc<ScopedRecord<K>> {
        if self.changes.is_empty() {
            Arc::clone(&self.source)
        } else {
            Arc::new(self.pending.clone())
        }
    }
}
