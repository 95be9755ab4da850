//! The record cache.

use std::sync::Arc;

use tracing::debug;

use super::registry::{CacheKey, CachedRecord, GroupType, Loaded, RecordStore, ReferrerKind};
use super::{CacheConfig, TypedCache};
use crate::error::StoreError;

/// Relationship-aware cache in front of a [`RecordStore`].
///
/// Misses load through the group's loader, once per key no matter how many
/// threads ask. Load failures are returned to the callers and never cached.
/// When built disabled, every request goes straight to the store.
#[derive(Clone)]
pub struct RecordCache {
    store: Arc<dyn RecordStore>,
    entries: Option<TypedCache<CacheKey, Loaded>>,
}

impl RecordCache {
    pub fn new(store: Arc<dyn RecordStore>, config: CacheConfig) -> Self {
        Self {
            store,
            entries: Some(TypedCache::new("records", config)),
        }
    }

    pub fn disabled(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            entries: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.entries.is_some()
    }

    fn key<R: ReferrerKind, V>(group: GroupType<R, V>, referrer: &R::Key) -> CacheKey {
        CacheKey {
            group: group.group(),
            referrer: R::referrer(referrer),
        }
    }

    fn load(&self, key: CacheKey) -> Result<Loaded, StoreError> {
        let Some(entries) = &self.entries else {
            return key.group.load(self.store.as_ref(), &key.referrer);
        };

        let store = Arc::clone(&self.store);
        let (group, referrer) = (key.group, key.referrer.clone());
        entries
            .get_or_try_insert_with(key, move || {
                debug!("Cache miss for {group:?} {referrer:?}");
                group.load(store.as_ref(), &referrer)
            })
            .map_err(Arc::unwrap_or_clone)
    }

    /// The cached collection for `referrer`, loading it on a miss.
    pub fn request<R: ReferrerKind, V: CachedRecord>(
        &self,
        group: GroupType<R, V>,
        referrer: &R::Key,
    ) -> Result<Vec<Arc<V>>, StoreError> {
        let loaded = self.load(Self::key(group, referrer))?;
        V::unwrap(loaded).ok_or_else(|| mismatch(group))
    }

    /// The cached singleton for `referrer`, loading it on a miss.
    pub fn request_singleton<R: ReferrerKind, V: CachedRecord>(
        &self,
        group: GroupType<R, V>,
        referrer: &R::Key,
    ) -> Result<Option<Arc<V>>, StoreError> {
        Ok(self.request(group, referrer)?.into_iter().next())
    }

    /// Force-set an entry.
    pub fn insert<R: ReferrerKind, V: CachedRecord>(
        &self,
        group: GroupType<R, V>,
        referrer: &R::Key,
        records: Vec<Arc<V>>,
    ) {
        if let Some(entries) = &self.entries {
            entries.insert(Self::key(group, referrer), V::wrap(records));
        }
    }

    pub fn insert_singleton<R: ReferrerKind, V: CachedRecord>(
        &self,
        group: GroupType<R, V>,
        referrer: &R::Key,
        record: Arc<V>,
    ) {
        self.insert(group, referrer, vec![record]);
    }

    /// Remove exactly one entry.
    pub fn invalidate<R: ReferrerKind, V>(&self, group: GroupType<R, V>, referrer: &R::Key) {
        if let Some(entries) = &self.entries {
            entries.invalidate(&Self::key(group, referrer));
        }
    }

    /// Remove the entry and every relative entry for the same referrer.
    pub fn invalidate_with_relatives<R: ReferrerKind, V>(&self, group: GroupType<R, V>, referrer: &R::Key) {
        let Some(entries) = &self.entries else {
            return;
        };
        let key = Self::key(group, referrer);
        for relative in key.group.relatives() {
            entries.invalidate(&CacheKey {
                group: *relative,
                referrer: key.referrer.clone(),
            });
        }
        entries.invalidate(&key);
    }

    /// Prepend a freshly created record to the group's cached collection and
    /// to every relative's, each only if already cached.
    ///
    /// Groups restricted to active records skip records that are not active.
    pub fn infuse_if_collection_present<R: ReferrerKind, V: CachedRecord>(
        &self,
        group: GroupType<R, V>,
        referrer: &R::Key,
        record: Arc<V>,
    ) {
        let Some(entries) = &self.entries else {
            return;
        };
        let key = Self::key(group, referrer);
        let groups = std::iter::once(key.group).chain(key.group.relatives().iter().copied());

        for target in groups {
            if target.active_only() && !record.is_active() {
                continue;
            }
            let key = CacheKey {
                group: target,
                referrer: key.referrer.clone(),
            };
            let record = Arc::clone(&record);
            let infused = entries.update_if_present(key, move |loaded| {
                match V::unwrap(loaded.clone()) {
                    Some(mut records) => {
                        records.insert(0, record);
                        V::wrap(records)
                    }
                    None => loaded,
                }
            });
            if infused {
                debug!("Infused new record into {target:?}");
            }
        }
    }
}

fn mismatch<R, V>(group: GroupType<R, V>) -> StoreError {
    StoreError::decode("cache", format!("payload does not match {:?}", group.group()))
}

impl std::fmt::Debug for RecordCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordCache")
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    use uuid::Uuid;

    use super::*;
    use crate::cache::registry::{
        ACTIVE_BAN_BY_UUID, BAN_BY_ADDR, BAN_BY_UUID, KICK_BY_UUID, PLAYER_BY_UUID,
    };
    use crate::database::Target;
    use crate::record::{
        BanBuilder, BanRecord, CommentRecord, KickRecord, MuteRecord, PlayerRecord, Status, now,
    };

    /// Counts loads; optionally fails the first few.
    #[derive(Default)]
    struct CountingStore {
        loads: AtomicUsize,
        failures_left: AtomicUsize,
        bans: parking_lot::Mutex<Vec<BanRecord>>,
    }

    impl CountingStore {
        fn tick(&self) -> Result<(), StoreError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            let failing = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if failing {
                return Err(StoreError::Connection("database offline".to_string()));
            }
            Ok(())
        }
    }

    impl RecordStore for CountingStore {
        fn load_player(&self, uuid: Uuid) -> Result<Option<PlayerRecord>, StoreError> {
            self.tick()?;
            Ok(Some(PlayerRecord::new(uuid, "Steve", now())))
        }

        fn load_bans(&self, target: Target<'_>, status: Option<Status>) -> Result<Vec<BanRecord>, StoreError> {
            self.tick()?;
            let bans = self.bans.lock();
            Ok(bans
                .iter()
                .filter(|ban| match target {
                    Target::Player(uuid) => ban.player() == Some(uuid),
                    Target::Address(address) => ban.address() == Some(address),
                    _ => false,
                })
                .filter(|ban| status.is_none_or(|status| ban.status() == status))
                .cloned()
                .collect())
        }

        fn load_mutes(&self, _: Target<'_>, _: Option<Status>) -> Result<Vec<MuteRecord>, StoreError> {
            self.tick()?;
            Ok(Vec::new())
        }

        fn load_kicks(&self, _: Uuid) -> Result<Vec<KickRecord>, StoreError> {
            self.tick()?;
            Ok(Vec::new())
        }

        fn load_comments(&self, _: Uuid) -> Result<Vec<CommentRecord>, StoreError> {
            self.tick()?;
            Ok(Vec::new())
        }
    }

    fn cache(store: &Arc<CountingStore>) -> RecordCache {
        RecordCache::new(Arc::clone(store) as Arc<dyn RecordStore>, CacheConfig::default())
    }

    fn ban(player: Uuid) -> BanRecord {
        BanBuilder::new().player(player).build().unwrap().persisted(1)
    }

    #[test]
    fn test_concurrent_misses_load_once() {
        let store = Arc::new(CountingStore::default());
        let cache = cache(&store);
        let player = Uuid::new_v4();
        let barrier = Barrier::new(8);

        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    barrier.wait();
                    cache.request_singleton(PLAYER_BY_UUID, &player).unwrap()
                });
            }
        });

        assert_eq!(store.loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let store = Arc::new(CountingStore::default());
        store.failures_left.store(1, Ordering::SeqCst);
        let cache = cache(&store);
        let player = Uuid::new_v4();

        assert!(matches!(
            cache.request(KICK_BY_UUID, &player),
            Err(StoreError::Connection(_))
        ));
        assert!(cache.request(KICK_BY_UUID, &player).unwrap().is_empty());
        assert_eq!(store.loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_invalidate_with_relatives_clears_active_view() {
        let store = Arc::new(CountingStore::default());
        let cache = cache(&store);
        let player = Uuid::new_v4();
        store.bans.lock().push(ban(player));

        assert_eq!(cache.request(BAN_BY_UUID, &player).unwrap().len(), 1);
        assert_eq!(cache.request(ACTIVE_BAN_BY_UUID, &player).unwrap().len(), 1);
        assert_eq!(store.loads.load(Ordering::SeqCst), 2);

        cache.invalidate_with_relatives(BAN_BY_UUID, &player);
        cache.request(ACTIVE_BAN_BY_UUID, &player).unwrap();
        cache.request(BAN_BY_UUID, &player).unwrap();
        assert_eq!(store.loads.load(Ordering::SeqCst), 4);

        cache.invalidate(BAN_BY_UUID, &player);
        cache.request(ACTIVE_BAN_BY_UUID, &player).unwrap();
        assert_eq!(store.loads.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_invalidate_with_relatives_spares_other_players() {
        let store = Arc::new(CountingStore::default());
        let cache = cache(&store);
        let (alex, steve) = (Uuid::new_v4(), Uuid::new_v4());
        store.bans.lock().extend([ban(alex), ban(steve)]);

        for player in [&alex, &steve] {
            cache.request(BAN_BY_UUID, player).unwrap();
            cache.request(ACTIVE_BAN_BY_UUID, player).unwrap();
        }
        assert_eq!(store.loads.load(Ordering::SeqCst), 4);

        cache.invalidate_with_relatives(BAN_BY_UUID, &alex);

        assert_eq!(cache.request(BAN_BY_UUID, &steve).unwrap().len(), 1);
        assert_eq!(cache.request(ACTIVE_BAN_BY_UUID, &steve).unwrap().len(), 1);
        assert_eq!(store.loads.load(Ordering::SeqCst), 4);

        cache.request(ACTIVE_BAN_BY_UUID, &alex).unwrap();
        assert_eq!(store.loads.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_entries_reload_after_ttl() {
        let store = Arc::new(CountingStore::default());
        let config = CacheConfig::with_capacity(100).ttl(Duration::from_millis(100));
        let cache = RecordCache::new(Arc::clone(&store) as Arc<dyn RecordStore>, config);
        let player = Uuid::new_v4();

        cache.request_singleton(PLAYER_BY_UUID, &player).unwrap();
        cache.request_singleton(PLAYER_BY_UUID, &player).unwrap();
        assert_eq!(store.loads.load(Ordering::SeqCst), 1);

        thread::sleep(Duration::from_millis(250));
        assert!(cache.request_singleton(PLAYER_BY_UUID, &player).unwrap().is_some());
        assert_eq!(store.loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_infuse_only_touches_present_collections() {
        let store = Arc::new(CountingStore::default());
        let cache = cache(&store);
        let player = Uuid::new_v4();
        store.bans.lock().push(ban(player));

        assert_eq!(cache.request(BAN_BY_UUID, &player).unwrap().len(), 1);

        let newest = Arc::new(BanBuilder::new().player(player).reason("x-ray").build().unwrap().persisted(2));
        cache.infuse_if_collection_present(BAN_BY_UUID, &player, Arc::clone(&newest));

        let bans = cache.request(BAN_BY_UUID, &player).unwrap();
        assert_eq!(bans.len(), 2);
        assert_eq!(bans[0].id(), 2);
        assert_eq!(store.loads.load(Ordering::SeqCst), 1);

        // The active view was never cached, so it loads fresh from the store.
        assert_eq!(cache.request(ACTIVE_BAN_BY_UUID, &player).unwrap().len(), 1);
        assert_eq!(store.loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_infuse_skips_active_view_for_inactive_record() {
        let store = Arc::new(CountingStore::default());
        let cache = cache(&store);
        let address = "10.4.4.4";
        cache.insert(BAN_BY_ADDR, address, Vec::new());
        cache.insert(crate::cache::registry::ACTIVE_BAN_BY_ADDR, address, Vec::new());

        let mut ended = BanBuilder::new().address(address).build().unwrap().persisted(3);
        ended.status = Status::Ended;
        cache.infuse_if_collection_present(BAN_BY_ADDR, address, Arc::new(ended));

        assert_eq!(cache.request(BAN_BY_ADDR, address).unwrap().len(), 1);
        assert!(cache.request(crate::cache::registry::ACTIVE_BAN_BY_ADDR, address).unwrap().is_empty());
        assert_eq!(store.loads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_disabled_cache_always_reads_through() {
        let store = Arc::new(CountingStore::default());
        let cache = RecordCache::disabled(Arc::clone(&store) as Arc<dyn RecordStore>);
        let player = Uuid::new_v4();

        cache.insert_singleton(PLAYER_BY_UUID, &player, Arc::new(PlayerRecord::new(player, "Alex", now())));
        cache.request_singleton(PLAYER_BY_UUID, &player).unwrap();
        cache.request_singleton(PLAYER_BY_UUID, &player).unwrap();

        assert!(!cache.is_enabled());
        assert_eq!(store.loads.load(Ordering::SeqCst), 2);
    }
}
