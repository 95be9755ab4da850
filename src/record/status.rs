//! Lifecycle status of bans and mutes.

use serde::{Deserialize, Serialize};

/// Status of a status-scoped record.
///
/// Stored in the `status` column as `"Active"`, `"Expired"` or `"Ended"`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
pub enum Status {
    #[default]
    Active,
    Expired,
    Ended,
}

impl Status {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "expired" => Some(Self::Expired),
            "ended" => Some(Self::Ended),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Expired => "Expired",
            Self::Ended => "Ended",
        }
    }

    /// Expired and ended records are no longer enforced.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
