//! Builders for fresh records.
//!
//! Validation happens in `build()`, before any I/O.

use std::marker::PhantomData;

use chrono::NaiveDateTime;
use uuid::Uuid;

use super::{
    Ban, CommentRecord, KickRecord, Mute, ScopeKind, ScopedRecord, Status, UNSAVED_ID, now,
};
use crate::error::BuildError;

pub type BanBuilder = ScopedBuilder<Ban>;
pub type MuteBuilder = ScopedBuilder<Mute>;

/// Builder for bans and mutes.
#[derive(Debug, Clone)]
pub struct ScopedBuilder<K: ScopeKind> {
    player: Option<Uuid>,
    address: Option<String>,
    staff: Option<Uuid>,
    issued_at: NaiveDateTime,
    expiry: Option<NaiveDateTime>,
    context: Option<String>,
    reason: Option<String>,
    kind: PhantomData<K>,
}

impl<K: ScopeKind> Default for ScopedBuilder<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ScopeKind> ScopedBuilder<K> {
    /// Issued now, permanent, global, by the console.
    pub fn new() -> Self {
        Self {
            player: None,
            address: None,
            staff: None,
            issued_at: now(),
            expiry: None,
            context: None,
            reason: None,
            kind: PhantomData,
        }
    }

    #[must_use]
    pub fn player(mut self, player: Uuid) -> Self {
        self.player = Some(player);
        self
    }

    #[must_use]
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    #[must_use]
    pub fn staff(mut self, staff: Uuid) -> Self {
        self.staff = Some(staff);
        self
    }

    #[must_use]
    pub fn issued_at(mut self, issued_at: NaiveDateTime) -> Self {
        self.issued_at = issued_at;
        self
    }

    #[must_use]
    pub fn expires_at(mut self, expiry: NaiveDateTime) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// Expire `duration` after the issue date.
    #[must_use]
    pub fn expires_after(mut self, duration: chrono::Duration) -> Self {
        self.expiry = Some(self.issued_at + duration);
        self
    }

    #[must_use]
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    #[must_use]
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn build(self) -> Result<ScopedRecord<K>, BuildError> {
        if self.player.is_none() && self.address.is_none() {
            return Err(BuildError::MissingTarget(K::NAME));
        }
        if let Some(expiry) = self.expiry {
            if expiry < self.issued_at {
                return Err(BuildError::ExpiryBeforeIssue {
                    kind: K::NAME,
                    issued: self.issued_at,
                    expiry,
                });
            }
        }

        let status = match self.expiry {
            Some(expiry) if expiry <= now() => Status::Expired,
            _ => Status::Active,
        };

        Ok(ScopedRecord {
            id: UNSAVED_ID,
            status,
            player: self.player,
            staff: self.staff,
            terminating_staff: None,
            issued_at: self.issued_at,
            terminated_at: self.expiry,
            address: self.address,
            context: self.context,
            reason: self.reason,
            termination_reason: None,
            loaded: false,
            kind: PhantomData,
        })
    }
}

/// Builder for kicks.
#[derive(Debug, Clone)]
pub struct KickBuilder {
    player: Uuid,
    staff: Option<Uuid>,
    kicked_at: NaiveDateTime,
    global: bool,
    reason: Option<String>,
}

impl KickBuilder {
    pub fn new(player: Uuid) -> Self {
        Self {
            player,
            staff: None,
            kicked_at: now(),
            global: false,
            reason: None,
        }
    }

    #[must_use]
    pub fn staff(mut self, staff: Uuid) -> Self {
        self.staff = Some(staff);
        self
    }

    #[must_use]
    pub fn kicked_at(mut self, kicked_at: NaiveDateTime) -> Self {
        self.kicked_at = kicked_at;
        self
    }

    #[must_use]
    pub fn global(mut self, global: bool) -> Self {
        self.global = global;
        self
    }

    #[must_use]
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn build(self) -> KickRecord {
        KickRecord {
            id: UNSAVED_ID,
            player: self.player,
            staff: self.staff,
            kicked_at: self.kicked_at,
            global: self.global,
            reason: self.reason,
            loaded: false,
        }
    }
}

/// Builder for comments and warnings.
#[derive(Debug, Clone)]
pub struct CommentBuilder {
    player: Uuid,
    staff: Option<Uuid>,
    added_at: NaiveDateTime,
    warning: bool,
    comment: Option<String>,
}

impl CommentBuilder {
    pub fn new(player: Uuid) -> Self {
        Self {
            player,
            staff: None,
            added_at: now(),
            warning: false,
            comment: None,
        }
    }

    #[must_use]
    pub fn staff(mut self, staff: Uuid) -> Self {
        self.staff = Some(staff);
        self
    }

    #[must_use]
    pub fn added_at(mut self, added_at: NaiveDateTime) -> Self {
        self.added_at = added_at;
        self
    }

    #[must_use]
    pub fn warning(mut self, warning: bool) -> Self {
        self.warning = warning;
        self
    }

    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn build(self) -> Result<CommentRecord, BuildError> {
        let comment = self
            .comment
            .filter(|text| !text.trim().is_empty())
            .ok_or(BuildError::MissingField("comment text"))?;

        Ok(CommentRecord {
            id: UNSAVED_ID,
            player: self.player,
            staff: self.staff,
            added_at: self.added_at,
            warning: self.warning,
            comment,
            loaded: false,
        })
    }
}
