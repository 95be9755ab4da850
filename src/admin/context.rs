//! Context matching for scoped records.

/// Decides whether a record's context applies to the context being checked.
pub trait ContextMatcher: Send + Sync {
    fn matches(&self, record_context: &str, requested: &str) -> bool;
}

/// Compares contexts ignoring case, so `Lobby` and `lobby` are one context.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaseInsensitive;

impl ContextMatcher for CaseInsensitive {
    fn matches(&self, record_context: &str, requested: &str) -> bool {
        record_context.eq_ignore_ascii_case(requested)
    }
}

/// Exact, case-sensitive comparison.
#[derive(Debug, Clone, Copy, Default)]
pub struct Exact;

impl ContextMatcher for Exact {
    fn matches(&self, record_context: &str, requested: &str) -> bool {
        record_context == requested
    }
}

impl<F> ContextMatcher for F
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    fn matches(&self, record_context: &str, requested: &str) -> bool {
        self(record_context, requested)
    }
}
