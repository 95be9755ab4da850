//! Cache module - relationship-aware record caching with Moka.
//!
//! ## Architecture
//!
//! - `TypedCache` - thin typed wrapper over a Moka cache
//! - `registry` - the closed set of cache groups, their loaders and relatives
//! - `RecordCache` - keyed by (group, referrer); loads on miss, invalidates
//!   relatives together, and infuses new records into cached collections
//!
//! ## Usage
//!
//! ```ignore
//! let bans = cache.request(BAN_BY_UUID, &player)?;
//!
//! // After committing a change to one of those bans
//! cache.invalidate_with_relatives(BAN_BY_UUID, &player);
//! ```

mod config;
mod record_cache;
mod registry;
mod typed;

pub use config::CacheConfig;
pub use record_cache::RecordCache;
pub use registry::{
    ACTIVE_BAN_BY_ADDR, ACTIVE_BAN_BY_UUID, ACTIVE_MUTE_BY_ADDR, ACTIVE_MUTE_BY_UUID, BAN_BY_ADDR,
    BAN_BY_UUID, ByAddr, ByUuid, COMMENT_BY_UUID, CacheGroup, CacheKey, CachedRecord, GroupType,
    KICK_BY_UUID, Loaded, MUTE_BY_ADDR, MUTE_BY_UUID, PLAYER_BY_UUID, RecordStore, Referrer,
    ReferrerKind, ScopeGroups,
};
pub use typed::TypedCache;
