//! Kick records. Immutable once built.

use chrono::NaiveDateTime;
use serde::Serialize;
use uuid::Uuid;

use super::Record;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KickRecord {
    pub(crate) id: i64,
    pub(crate) player: Uuid,
    pub(crate) staff: Option<Uuid>,
    pub(crate) kicked_at: NaiveDateTime,
    /// Network-wide rather than a single server.
    pub(crate) global: bool,
    pub(crate) reason: Option<String>,
    #[serde(skip)]
    pub(crate) loaded: bool,
}

impl KickRecord {
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn player(&self) -> Uuid {
        self.player
    }

    pub fn staff(&self) -> Option<Uuid> {
        self.staff
    }

    pub fn kicked_at(&self) -> NaiveDateTime {
        self.kicked_at
    }

    pub fn is_global(&self) -> bool {
        self.global
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub(crate) fn persisted(&self, id: i64) -> Self {
        Self {
            id,
            loaded: true,
            ..self.clone()
        }
    }
}

impl Record for KickRecord {
    fn is_loaded(&self) -> bool {
        self.loaded
    }
}
