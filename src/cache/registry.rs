//! Cache group registry.
//!
//! The set of cache groups is closed. Each [`CacheGroup`] names its loader and
//! its relatives in the tables below; [`GroupType`] constants pair a group with
//! its referrer and record types so lookups are checked at compile time.

use std::marker::PhantomData;
use std::sync::Arc;

use uuid::Uuid;

use crate::database::Target;
use crate::error::StoreError;
use crate::record::{
    Ban, BanRecord, CommentRecord, KickRecord, Mute, MuteRecord, PlayerRecord, Record, ScopeKind, ScopedRecord, Status,
};

/// What the cache loaders need from the database.
pub trait RecordStore: Send + Sync {
    fn load_player(&self, uuid: Uuid) -> Result<Option<PlayerRecord>, StoreError>;

    fn load_bans(&self, target: Target<'_>, status: Option<Status>) -> Result<Vec<BanRecord>, StoreError>;

    fn load_mutes(&self, target: Target<'_>, status: Option<Status>) -> Result<Vec<MuteRecord>, StoreError>;

    fn load_kicks(&self, player: Uuid) -> Result<Vec<KickRecord>, StoreError>;

    fn load_comments(&self, player: Uuid) -> Result<Vec<CommentRecord>, StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheGroup {
    PlayerByUuid,
    BanByUuid,
    ActiveBanByUuid,
    BanByAddr,
    ActiveBanByAddr,
    MuteByUuid,
    ActiveMuteByUuid,
    MuteByAddr,
    ActiveMuteByAddr,
    KickByUuid,
    CommentByUuid,
}

/// The value a group is keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Referrer {
    Uuid(Uuid),
    Addr(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub group: CacheGroup,
    pub referrer: Referrer,
}

/// A cached load result.
#[derive(Debug, Clone)]
pub enum Loaded {
    Player(Option<Arc<PlayerRecord>>),
    Bans(Vec<Arc<BanRecord>>),
    Mutes(Vec<Arc<MuteRecord>>),
    Kicks(Vec<Arc<KickRecord>>),
    Comments(Vec<Arc<CommentRecord>>),
}

impl CacheGroup {
    pub const ALL: [CacheGroup; 11] = [
        Self::PlayerByUuid,
        Self::BanByUuid,
        Self::ActiveBanByUuid,
        Self::BanByAddr,
        Self::ActiveBanByAddr,
        Self::MuteByUuid,
        Self::ActiveMuteByUuid,
        Self::MuteByAddr,
        Self::ActiveMuteByAddr,
        Self::KickByUuid,
        Self::CommentByUuid,
    ];

    /// Groups holding a related view of the same referrer's records.
    pub fn relatives(self) -> &'static [CacheGroup] {
        match self {
            Self::BanByUuid => &[Self::ActiveBanByUuid],
            Self::ActiveBanByUuid => &[Self::BanByUuid],
            Self::BanByAddr => &[Self::ActiveBanByAddr],
            Self::ActiveBanByAddr => &[Self::BanByAddr],
            Self::MuteByUuid => &[Self::ActiveMuteByUuid],
            Self::ActiveMuteByUuid => &[Self::MuteByUuid],
            Self::MuteByAddr => &[Self::ActiveMuteByAddr],
            Self::ActiveMuteByAddr => &[Self::MuteByAddr],
            Self::PlayerByUuid | Self::KickByUuid | Self::CommentByUuid => &[],
        }
    }

    /// Only records in the `Active` status belong to this group.
    pub fn active_only(self) -> bool {
        matches!(
            self,
            Self::ActiveBanByUuid | Self::ActiveBanByAddr | Self::ActiveMuteByUuid | Self::ActiveMuteByAddr
        )
    }

    /// Run this group's loader.
    pub(crate) fn load(self, store: &dyn RecordStore, referrer: &Referrer) -> Result<Loaded, StoreError> {
        let active = self.active_only().then_some(Status::Active);
        match (self, referrer) {
            (Self::PlayerByUuid, Referrer::Uuid(uuid)) => {
                Ok(Loaded::Player(store.load_player(*uuid)?.map(Arc::new)))
            }
            (Self::BanByUuid | Self::ActiveBanByUuid, Referrer::Uuid(uuid)) => {
                Ok(Loaded::Bans(shared(store.load_bans(Target::Player(*uuid), active)?)))
            }
            (Self::BanByAddr | Self::ActiveBanByAddr, Referrer::Addr(address)) => {
                Ok(Loaded::Bans(shared(store.load_bans(Target::Address(address), active)?)))
            }
            (Self::MuteByUuid | Self::ActiveMuteByUuid, Referrer::Uuid(uuid)) => {
                Ok(Loaded::Mutes(shared(store.load_mutes(Target::Player(*uuid), active)?)))
            }
            (Self::MuteByAddr | Self::ActiveMuteByAddr, Referrer::Addr(address)) => {
                Ok(Loaded::Mutes(shared(store.load_mutes(Target::Address(address), active)?)))
            }
            (Self::KickByUuid, Referrer::Uuid(uuid)) => Ok(Loaded::Kicks(shared(store.load_kicks(*uuid)?))),
            (Self::CommentByUuid, Referrer::Uuid(uuid)) => {
                Ok(Loaded::Comments(shared(store.load_comments(*uuid)?)))
            }
            (group, referrer) => Err(StoreError::Statement(format!(
                "cache group {group:?} cannot be keyed by {referrer:?}"
            ))),
        }
    }
}

fn shared<T>(records: Vec<T>) -> Vec<Arc<T>> {
    records.into_iter().map(Arc::new).collect()
}

/// Referrer key kinds.
pub trait ReferrerKind {
    type Key: ?Sized;

    fn referrer(key: &Self::Key) -> Referrer;
}

/// Groups keyed by player UUID.
#[derive(Debug, Clone, Copy)]
pub struct ByUuid;

/// Groups keyed by network address.
#[derive(Debug, Clone, Copy)]
pub struct ByAddr;

impl ReferrerKind for ByUuid {
    type Key = Uuid;

    fn referrer(key: &Uuid) -> Referrer {
        Referrer::Uuid(*key)
    }
}

impl ReferrerKind for ByAddr {
    type Key = str;

    fn referrer(key: &str) -> Referrer {
        Referrer::Addr(key.to_string())
    }
}

/// Records that can sit in a cache group.
pub trait CachedRecord: Record + Sized {
    fn wrap(records: Vec<Arc<Self>>) -> Loaded;

    fn unwrap(loaded: Loaded) -> Option<Vec<Arc<Self>>>;

    /// Whether the record belongs in `active_only` groups.
    fn is_active(&self) -> bool {
        true
    }
}

impl CachedRecord for PlayerRecord {
    fn wrap(records: Vec<Arc<Self>>) -> Loaded {
        Loaded::Player(records.into_iter().next())
    }

    fn unwrap(loaded: Loaded) -> Option<Vec<Arc<Self>>> {
        match loaded {
            Loaded::Player(player) => Some(player.into_iter().collect()),
            _ => None,
        }
    }
}

macro_rules! cached_collection {
    ($record:ty, $variant:ident) => {
        impl CachedRecord for $record {
            fn wrap(records: Vec<Arc<Self>>) -> Loaded {
                Loaded::$variant(records)
            }

            fn unwrap(loaded: Loaded) -> Option<Vec<Arc<Self>>> {
                match loaded {
                    Loaded::$variant(records) => Some(records),
                    _ => None,
                }
            }
        }
    };
}

cached_collection!(KickRecord, Kicks);
cached_collection!(CommentRecord, Comments);

/// The cache groups holding one scope kind's records.
pub trait ScopeGroups: ScopeKind {
    const BY_UUID: GroupType<ByUuid, ScopedRecord<Self>>;
    const ACTIVE_BY_UUID: GroupType<ByUuid, ScopedRecord<Self>>;
    const BY_ADDR: GroupType<ByAddr, ScopedRecord<Self>>;
    const ACTIVE_BY_ADDR: GroupType<ByAddr, ScopedRecord<Self>>;

    fn wrap(records: Vec<Arc<ScopedRecord<Self>>>) -> Loaded;

    fn unwrap(loaded: Loaded) -> Option<Vec<Arc<ScopedRecord<Self>>>>;
}

impl ScopeGroups for Ban {
    const BY_UUID: GroupType<ByUuid, BanRecord> = BAN_BY_UUID;
    const ACTIVE_BY_UUID: GroupType<ByUuid, BanRecord> = ACTIVE_BAN_BY_UUID;
    const BY_ADDR: GroupType<ByAddr, BanRecord> = BAN_BY_ADDR;
    const ACTIVE_BY_ADDR: GroupType<ByAddr, BanRecord> = ACTIVE_BAN_BY_ADDR;

    fn wrap(records: Vec<Arc<BanRecord>>) -> Loaded {
        Loaded::Bans(records)
    }

    fn unwrap(loaded: Loaded) -> Option<Vec<Arc<BanRecord>>> {
        match loaded {
            Loaded::Bans(records) => Some(records),
            _ => None,
        }
    }
}

impl ScopeGroups for Mute {
    const BY_UUID: GroupType<ByUuid, MuteRecord> = MUTE_BY_UUID;
    const ACTIVE_BY_UUID: GroupType<ByUuid, MuteRecord> = ACTIVE_MUTE_BY_UUID;
    const BY_ADDR: GroupType<ByAddr, MuteRecord> = MUTE_BY_ADDR;
    const ACTIVE_BY_ADDR: GroupType<ByAddr, MuteRecord> = ACTIVE_MUTE_BY_ADDR;

    fn wrap(records: Vec<Arc<MuteRecord>>) -> Loaded {
        Loaded::Mutes(records)
    }

    fn unwrap(loaded: Loaded) -> Option<Vec<Arc<MuteRecord>>> {
        match loaded {
            Loaded::Mutes(records) => Some(records),
            _ => None,
        }
    }
}

impl<K: ScopeGroups> CachedRecord for ScopedRecord<K> {
    fn wrap(records: Vec<Arc<Self>>) -> Loaded {
        K::wrap(records)
    }

    fn unwrap(loaded: Loaded) -> Option<Vec<Arc<Self>>> {
        K::unwrap(loaded)
    }

    fn is_active(&self) -> bool {
        self.status().is_active()
    }
}

/// A cache group together with its referrer and record types.
pub struct GroupType<R, V> {
    group: CacheGroup,
    marker: PhantomData<fn(R) -> V>,
}

impl<R, V> GroupType<R, V> {
    const fn new(group: CacheGroup) -> Self {
        Self {
            group,
            marker: PhantomData,
        }
    }

    pub fn group(&self) -> CacheGroup {
        self.group
    }
}

impl<R, V> Clone for GroupType<R, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R, V> Copy for GroupType<R, V> {}

impl<R, V> std::fmt::Debug for GroupType<R, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("GroupType").field(&self.group).finish()
    }
}

pub const PLAYER_BY_UUID: GroupType<ByUuid, PlayerRecord> = GroupType::new(CacheGroup::PlayerByUuid);
pub const BAN_BY_UUID: GroupType<ByUuid, BanRecord> = GroupType::new(CacheGroup::BanByUuid);
pub const ACTIVE_BAN_BY_UUID: GroupType<ByUuid, BanRecord> = GroupType::new(CacheGroup::ActiveBanByUuid);
pub const BAN_BY_ADDR: GroupType<ByAddr, BanRecord> = GroupType::new(CacheGroup::BanByAddr);
pub const ACTIVE_BAN_BY_ADDR: GroupType<ByAddr, BanRecord> = GroupType::new(CacheGroup::ActiveBanByAddr);
pub const MUTE_BY_UUID: GroupType<ByUuid, MuteRecord> = GroupType::new(CacheGroup::MuteByUuid);
pub const ACTIVE_MUTE_BY_UUID: GroupType<ByUuid, MuteRecord> = GroupType::new(CacheGroup::ActiveMuteByUuid);
pub const MUTE_BY_ADDR: GroupType<ByAddr, MuteRecord> = GroupType::new(CacheGroup::MuteByAddr);
pub const ACTIVE_MUTE_BY_ADDR: GroupType<ByAddr, MuteRecord> = GroupType::new(CacheGroup::ActiveMuteByAddr);
pub const KICK_BY_UUID: GroupType<ByUuid, KickRecord> = GroupType::new(CacheGroup::KickByUuid);
pub const COMMENT_BY_UUID: GroupType<ByUuid, CommentRecord> = GroupType::new(CacheGroup::CommentByUuid);
