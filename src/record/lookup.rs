//! Pagination and date-range options for uncached history queries.

use chrono::NaiveDateTime;

/// Default number of rows a lookup may return when no options are given.
pub const DEFAULT_LOOKUP_LIMIT: u32 = 100;

/// Options for ad-hoc history lookups.
///
/// Passing options to a lookup bypasses the record cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupOptions {
    pub limit: u32,
    pub offset: u32,
    /// Newest first when `true`.
    pub sort_descending: bool,
    pub date_before: Option<NaiveDateTime>,
    pub date_after: Option<NaiveDateTime>,
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self::with_limit(DEFAULT_LOOKUP_LIMIT)
    }
}

impl LookupOptions {
    pub fn with_limit(limit: u32) -> Self {
        Self {
            limit,
            offset: 0,
            sort_descending: true,
            date_before: None,
            date_after: None,
        }
    }

    #[must_use]
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    /// Oldest first.
    #[must_use]
    pub fn ascending(mut self) -> Self {
        self.sort_descending = false;
        self
    }

    #[must_use]
    pub fn before(mut self, date: NaiveDateTime) -> Self {
        self.date_before = Some(date);
        self
    }

    #[must_use]
    pub fn after(mut self, date: NaiveDateTime) -> Self {
        self.date_after = Some(date);
        self
    }
}
