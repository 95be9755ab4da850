//! Staff comments and warnings attached to a player.

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;
use uuid::Uuid;

use super::{Modifiable, MutableRecord, Record};
use crate::error::StateError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentRecord {
    pub(crate) id: i64,
    pub(crate) player: Uuid,
    pub(crate) staff: Option<Uuid>,
    pub(crate) added_at: NaiveDateTime,
    pub(crate) warning: bool,
    pub(crate) comment: String,
    #[serde(skip)]
    pub(crate) loaded: bool,
}

impl CommentRecord {
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn player(&self) -> Uuid {
        self.player
    }

    pub fn staff(&self) -> Option<Uuid> {
        self.staff
    }

    pub fn added_at(&self) -> NaiveDateTime {
        self.added_at
    }

    pub fn is_warning(&self) -> bool {
        self.warning
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub(crate) fn persisted(&self, id: i64) -> Self {
        Self {
            id,
            loaded: true,
            ..self.clone()
        }
    }
}

impl Record for CommentRecord {
    fn is_loaded(&self) -> bool {
        self.loaded
    }
}

impl Modifiable for CommentRecord {
    type Mutable = MutableCommentRecord;

    fn to_mutable(self: &Arc<Self>) -> MutableCommentRecord {
        MutableCommentRecord {
            source: Arc::clone(self),
            pending: self.as_ref().clone(),
            changed: false,
        }
    }
}

/// Working copy of a [`CommentRecord`].
#[derive(Debug, Clone)]
pub struct MutableCommentRecord {
    source: Arc<CommentRecord>,
    pending: CommentRecord,
    changed: bool,
}

impl MutableCommentRecord {
    pub fn current(&self) -> &CommentRecord {
        &self.pending
    }

    /// The warning flag is fixed once the comment is persisted.
    pub fn can_switch_warning_mode(&self) -> bool {
        !self.source.loaded
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        let comment = comment.into();
        if comment != self.pending.comment {
            self.pending.comment = comment;
            self.changed = true;
        }
    }

    pub fn set_staff(&mut self, staff: Option<Uuid>) {
        if staff != self.pending.staff {
            self.pending.staff = staff;
            self.changed = true;
        }
    }

    pub fn set_warning(&mut self, warning: bool) -> Result<(), StateError> {
        if !self.can_switch_warning_mode() {
            return Err(StateError::WarningFlagLocked(self.source.id));
        }
        if warning != self.pending.warning {
            self.pending.warning = warning;
            self.changed = true;
        }
        Ok(())
    }
}

impl MutableRecord for MutableCommentRecord {
    type Record = CommentRecord;

    fn original(&self) -> &Arc<CommentRecord> {
        &self.source
    }

    fn is_modified(&self) -> bool {
        self.changed && self.source.loaded
    }

    fn as_immutable(&self) -> Arc<CommentRecord> {
        if self.changed {
            Arc::new(self.pending.clone())
        } else {
            Arc::clone(&self.source)
        }
    }
}
