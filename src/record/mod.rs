//! Record model.
//!
//! Every record is an immutable value shared behind an [`Arc`]. Loaded
//! records are changed through a paired mutable record that keeps the
//! pristine source, a working copy and a set of dirty flags:
//!
//! ```ignore
//! let mut mutable = record.to_mutable();
//! mutable.increment_total_joins();
//! if mutable.is_modified() {
//!     manager.commit_player(&mutable)?;
//! }
//! ```

mod builder;
mod comment;
mod kick;
mod lookup;
mod player;
mod scoped;
mod status;

use std::sync::Arc;

use chrono::NaiveDateTime;

pub use builder::{BanBuilder, CommentBuilder, KickBuilder, MuteBuilder, ScopedBuilder};
pub use comment::{CommentRecord, MutableCommentRecord};
pub use kick::KickRecord;
pub use lookup::{DEFAULT_LOOKUP_LIMIT, LookupOptions};
pub use player::{MutablePlayerRecord, PlayerChanges, PlayerRecord};
pub use scoped::{
    Ban, BanRecord, Mute, MuteRecord, MutableBanRecord, MutableMuteRecord, MutableScopedRecord,
    ScopeKind, ScopedChanges, ScopedRecord,
};
pub use status::Status;

/// Identity placeholder for records that were never persisted.
pub const UNSAVED_ID: i64 = -1;

/// Current wall-clock time in the server's local timezone.
pub fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// Behaviour shared by every record variant.
pub trait Record: Send + Sync + 'static {
    /// Whether the record was read from, or written to, the store.
    fn is_loaded(&self) -> bool;
}

/// Records that can be edited through a mutable handle.
///
/// Kicks are immutable and do not implement this.
pub trait Modifiable: Record + Sized {
    type Mutable: MutableRecord<Record = Self>;

    /// Start editing a copy of this record. The source is never touched.
    fn to_mutable(self: &Arc<Self>) -> Self::Mutable;
}

/// A working copy of a record with change tracking.
pub trait MutableRecord {
    type Record;

    /// The record this handle was created from.
    fn original(&self) -> &Arc<Self::Record>;

    /// Whether a diff should be written back.
    ///
    /// Always `false` when the source was never persisted, since fresh records
    /// are inserted whole rather than diffed.
    fn is_modified(&self) -> bool;

    /// The source itself when nothing changed, otherwise a snapshot of the
    /// working copy.
    fn as_immutable(&self) -> Arc<Self::Record>;
}
