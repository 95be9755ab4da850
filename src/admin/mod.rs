//! Admin manager - lookups and commits over the record cache and database.
//!
//! Reads favour availability: a failed load is logged and surfaces as an
//! empty collection or `None`. Commits return the [`StoreError`] so callers
//! can tell whether a punishment was actually recorded.
//!
//! Bans and mutes whose expiry has passed are reconciled lazily. Whenever an
//! active lookup meets one, it is rewritten as expired and the cached views
//! for its player and address are dropped.

mod context;

use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{debug, error, info};
use uuid::Uuid;

pub use context::{CaseInsensitive, ContextMatcher, Exact};

use crate::cache::{
    CacheConfig, CachedRecord, GroupType, RecordCache, RecordStore, ReferrerKind, ScopeGroups, COMMENT_BY_UUID,
    KICK_BY_UUID, PLAYER_BY_UUID,
};
use crate::config::{CacheSettings, Config};
use crate::database::{DatabaseController, Party, Target};
use crate::error::StoreError;
use crate::record::{
    Ban, BanRecord, CommentRecord, KickRecord, LookupOptions, Modifiable, MutableBanRecord, MutableCommentRecord,
    MutableMuteRecord, MutablePlayerRecord, MutableRecord, MutableScopedRecord, Mute, MuteRecord, PlayerRecord,
    Record, ScopedRecord, Status, now,
};

/// Entry point for moderation lookups and commits.
pub struct AdminManager {
    database: Arc<DatabaseController>,
    cache: RecordCache,
    matcher: Box<dyn ContextMatcher>,
}

impl AdminManager {
    pub fn new(database: Arc<DatabaseController>, settings: &CacheSettings) -> Self {
        let store = Arc::clone(&database) as Arc<dyn RecordStore>;
        let cache = if settings.enabled {
            RecordCache::new(store, CacheConfig::from(settings))
        } else {
            info!("Record cache disabled, every lookup reads the database");
            RecordCache::disabled(store)
        };

        Self {
            database,
            cache,
            matcher: Box::new(CaseInsensitive),
        }
    }

    /// Open the configured database, create its schema and wrap it.
    pub fn open(config: &Config) -> Result<Self, StoreError> {
        let database = DatabaseController::open(config)?;
        database.init_schema()?;
        Ok(Self::new(Arc::new(database), &config.cache))
    }

    /// Replace the context matcher.
    #[must_use]
    pub fn with_matcher(mut self, matcher: impl ContextMatcher + 'static) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    pub fn database(&self) -> &Arc<DatabaseController> {
        &self.database
    }

    pub fn cache(&self) -> &RecordCache {
        &self.cache
    }

    // Active punishments

    /// The first active ban on the player that applies in `in_context`.
    ///
    /// Global bans apply when `include_globals` is set or no context is
    /// requested.
    pub fn get_active_ban(&self, player: Uuid, in_context: Option<&str>, include_globals: bool) -> Option<Arc<BanRecord>> {
        self.active_in_context(Ban::ACTIVE_BY_UUID, &player, in_context, include_globals)
    }

    pub fn get_active_ban_by_address(
        &self,
        address: &str,
        in_context: Option<&str>,
        include_globals: bool,
    ) -> Option<Arc<BanRecord>> {
        self.active_in_context(Ban::ACTIVE_BY_ADDR, address, in_context, include_globals)
    }

    /// Checks the player first, then the address.
    pub fn get_active_ban_for(
        &self,
        player: Uuid,
        address: &str,
        in_context: Option<&str>,
        include_globals: bool,
    ) -> Option<Arc<BanRecord>> {
        self.get_active_ban(player, in_context, include_globals)
            .or_else(|| self.get_active_ban_by_address(address, in_context, include_globals))
    }

    pub fn get_active_mute(
        &self,
        player: Uuid,
        in_context: Option<&str>,
        include_globals: bool,
    ) -> Option<Arc<MuteRecord>> {
        self.active_in_context(Mute::ACTIVE_BY_UUID, &player, in_context, include_globals)
    }

    pub fn get_active_mute_by_address(
        &self,
        address: &str,
        in_context: Option<&str>,
        include_globals: bool,
    ) -> Option<Arc<MuteRecord>> {
        self.active_in_context(Mute::ACTIVE_BY_ADDR, address, in_context, include_globals)
    }

    /// Checks the player first, then the address.
    pub fn get_active_mute_for(
        &self,
        player: Uuid,
        address: &str,
        in_context: Option<&str>,
        include_globals: bool,
    ) -> Option<Arc<MuteRecord>> {
        self.get_active_mute(player, in_context, include_globals)
            .or_else(|| self.get_active_mute_by_address(address, in_context, include_globals))
    }

    // History

    /// Cached when `options` is `None`, read straight from the database otherwise.
    pub fn get_ban_records(&self, player: Uuid, options: Option<&LookupOptions>) -> Vec<Arc<BanRecord>> {
        self.history(Ban::BY_UUID, &player, Target::Player(player), options)
    }

    pub fn get_ban_records_by_address(&self, address: &str, options: Option<&LookupOptions>) -> Vec<Arc<BanRecord>> {
        self.history(Ban::BY_ADDR, address, Target::Address(address), options)
    }

    /// Bans on the player, the address, or both. Never cached.
    pub fn get_ban_records_for(
        &self,
        player: Uuid,
        address: &str,
        options: Option<&LookupOptions>,
    ) -> Vec<Arc<BanRecord>> {
        self.uncached_scoped(Target::PlayerOrAddress(player, address), None, options)
    }

    /// Never cached.
    pub fn get_ban_records_by_status(
        &self,
        target: Target<'_>,
        status: Status,
        options: Option<&LookupOptions>,
    ) -> Vec<Arc<BanRecord>> {
        self.uncached_scoped(target, Some(status), options)
    }

    pub fn get_mute_records(&self, player: Uuid, options: Option<&LookupOptions>) -> Vec<Arc<MuteRecord>> {
        self.history(Mute::BY_UUID, &player, Target::Player(player), options)
    }

    pub fn get_mute_records_by_address(&self, address: &str, options: Option<&LookupOptions>) -> Vec<Arc<MuteRecord>> {
        self.history(Mute::BY_ADDR, address, Target::Address(address), options)
    }

    pub fn get_mute_records_for(
        &self,
        player: Uuid,
        address: &str,
        options: Option<&LookupOptions>,
    ) -> Vec<Arc<MuteRecord>> {
        self.uncached_scoped(Target::PlayerOrAddress(player, address), None, options)
    }

    pub fn get_mute_records_by_status(
        &self,
        target: Target<'_>,
        status: Status,
        options: Option<&LookupOptions>,
    ) -> Vec<Arc<MuteRecord>> {
        self.uncached_scoped(target, Some(status), options)
    }

    pub fn get_kick_records(&self, player: Uuid, options: Option<&LookupOptions>) -> Vec<Arc<KickRecord>> {
        match options {
            None => self.cached(KICK_BY_UUID, &player),
            Some(options) => shared(self.database.kicks(Party::Player(player), Some(options))),
        }
    }

    /// Kicks that were (or were not) network-wide.
    pub fn get_kick_records_by_type(
        &self,
        player: Uuid,
        global: bool,
        options: Option<&LookupOptions>,
    ) -> Vec<Arc<KickRecord>> {
        let mut kicks = self.get_kick_records(player, options);
        kicks.retain(|kick| kick.is_global() == global);
        kicks
    }

    pub fn get_comment_records(&self, player: Uuid, options: Option<&LookupOptions>) -> Vec<Arc<CommentRecord>> {
        match options {
            None => self.cached(COMMENT_BY_UUID, &player),
            Some(options) => shared(self.database.comments(Party::Player(player), None, Some(options))),
        }
    }

    /// Warnings when `warning` is set, plain comments otherwise.
    pub fn get_comment_records_by_type(
        &self,
        player: Uuid,
        warning: bool,
        options: Option<&LookupOptions>,
    ) -> Vec<Arc<CommentRecord>> {
        match options {
            None => {
                let mut comments = self.cached(COMMENT_BY_UUID, &player);
                comments.retain(|comment| comment.is_warning() == warning);
                comments
            }
            Some(options) => shared(self.database.comments(Party::Player(player), Some(warning), Some(options))),
        }
    }

    // Players

    pub fn get_player_record(&self, player: Uuid) -> Option<Arc<PlayerRecord>> {
        self.cache
            .request_singleton(PLAYER_BY_UUID, &player)
            .unwrap_or_else(|e| {
                error!("Failed to load player {player}: {e}");
                None
            })
    }

    /// Resolved against the database; usernames are not a cache key.
    pub fn get_player_record_by_name(&self, username: &str) -> Option<Arc<PlayerRecord>> {
        self.database.player_by_username(username).map(Arc::new)
    }

    /// The stored record, or a fresh one seeded into the cache.
    ///
    /// A fresh record is only written once it is committed. A failed load is
    /// returned as is and seeds nothing, so an existing player is never
    /// mistaken for a new one.
    pub fn get_or_init_player_record(&self, player: Uuid, username: &str) -> Result<Arc<PlayerRecord>, StoreError> {
        if let Some(record) = self.cache.request_singleton(PLAYER_BY_UUID, &player)? {
            return Ok(record);
        }

        debug!("Initializing player record for {username} ({player})");
        let record = Arc::new(PlayerRecord::new(player, username, now()));
        self.cache.insert_singleton(PLAYER_BY_UUID, &player, Arc::clone(&record));
        Ok(record)
    }

    // Commits

    pub fn commit_player(&self, mutable: &MutablePlayerRecord) -> Result<Arc<PlayerRecord>, StoreError> {
        let saved = self.database.try_save_player(mutable)?;
        self.cache.insert_singleton(PLAYER_BY_UUID, &saved.uuid(), Arc::clone(&saved));
        Ok(saved)
    }

    /// Insert a fresh ban or write the changes to a loaded one.
    pub fn commit_ban(&self, mutable: &MutableBanRecord) -> Result<Arc<BanRecord>, StoreError> {
        self.commit_scoped(mutable)
    }

    /// Insert a fresh mute or write the changes to a loaded one.
    pub fn commit_mute(&self, mutable: &MutableMuteRecord) -> Result<Arc<MuteRecord>, StoreError> {
        self.commit_scoped(mutable)
    }

    pub fn commit_kick(&self, record: &KickRecord) -> Result<Arc<KickRecord>, StoreError> {
        let saved = Arc::new(self.database.try_insert_kick(record)?);
        self.cache
            .infuse_if_collection_present(KICK_BY_UUID, &saved.player(), Arc::clone(&saved));
        Ok(saved)
    }

    pub fn commit_comment(&self, mutable: &MutableCommentRecord) -> Result<Arc<CommentRecord>, StoreError> {
        let fresh = !mutable.original().is_loaded();
        let saved = self.database.try_save_comment(mutable)?;
        let player = saved.player();
        if fresh {
            self.cache
                .infuse_if_collection_present(COMMENT_BY_UUID, &player, Arc::clone(&saved));
        } else if mutable.is_modified() {
            self.cache.invalidate(COMMENT_BY_UUID, &player);
        }
        Ok(saved)
    }

    // Lifting punishments

    /// End every active ban on the player. Returns how many were ended.
    pub fn unban_everywhere(&self, player: Uuid, staff: Option<Uuid>, reason: Option<&str>) -> usize {
        self.lift_all::<Ban>(player, staff, reason, |_| true)
    }

    /// End the player's active bans whose context matches any of `contexts`.
    pub fn unban_in_contexts(
        &self,
        player: Uuid,
        staff: Option<Uuid>,
        reason: Option<&str>,
        contexts: &[&str],
    ) -> usize {
        self.lift_all::<Ban>(player, staff, reason, |record| self.in_any_context(record, contexts))
    }

    /// End the player's active global ban, if any.
    pub fn unban_global_only(&self, player: Uuid, staff: Option<Uuid>, reason: Option<&str>) -> bool {
        self.get_active_ban(player, None, true)
            .is_some_and(|record| self.lift(&record, staff, reason))
    }

    pub fn unmute_everywhere(&self, player: Uuid, staff: Option<Uuid>, reason: Option<&str>) -> usize {
        self.lift_all::<Mute>(player, staff, reason, |_| true)
    }

    pub fn unmute_in_contexts(
        &self,
        player: Uuid,
        staff: Option<Uuid>,
        reason: Option<&str>,
        contexts: &[&str],
    ) -> usize {
        self.lift_all::<Mute>(player, staff, reason, |record| self.in_any_context(record, contexts))
    }

    pub fn unmute_global_only(&self, player: Uuid, staff: Option<Uuid>, reason: Option<&str>) -> bool {
        self.get_active_mute(player, None, true)
            .is_some_and(|record| self.lift(&record, staff, reason))
    }

    // Counts

    /// Bans on the player, or issued by the staff member. `-1` on failure.
    pub fn count_bans(&self, party: Party) -> i64 {
        self.count::<Ban>(party)
    }

    pub fn count_mutes(&self, party: Party) -> i64 {
        self.count::<Mute>(party)
    }

    pub fn count_kicks(&self, party: Party) -> i64 {
        self.database.try_count_kicks(party).unwrap_or_else(|e| {
            error!("Failed to count kicks for {party:?}: {e}");
            -1
        })
    }

    pub fn count_comments(&self, party: Party) -> i64 {
        self.database.try_count_comments(party).unwrap_or_else(|e| {
            error!("Failed to count comments for {party:?}: {e}");
            -1
        })
    }

    fn count<K: ScopeGroups>(&self, party: Party) -> i64 {
        self.database.try_count_scoped::<K>(party).unwrap_or_else(|e| {
            error!("Failed to count {} for {party:?}: {e}", K::TABLE);
            -1
        })
    }

    // Internals

    fn cached<R: ReferrerKind, V: CachedRecord>(&self, group: GroupType<R, V>, referrer: &R::Key) -> Vec<Arc<V>> {
        self.cache.request(group, referrer).unwrap_or_else(|e| {
            error!("Failed to load {:?}: {e}", group.group());
            Vec::new()
        })
    }

    fn history<R: ReferrerKind, K: ScopeGroups>(
        &self,
        group: GroupType<R, ScopedRecord<K>>,
        referrer: &R::Key,
        target: Target<'_>,
        options: Option<&LookupOptions>,
    ) -> Vec<Arc<ScopedRecord<K>>> {
        match options {
            None => self.cached(group, referrer),
            Some(options) => self.uncached_scoped(target, None, Some(options)),
        }
    }

    fn uncached_scoped<K: ScopeGroups>(
        &self,
        target: Target<'_>,
        status: Option<Status>,
        options: Option<&LookupOptions>,
    ) -> Vec<Arc<ScopedRecord<K>>> {
        shared(self.database.scoped::<K>(target, status, options))
    }

    fn active_in_context<R: ReferrerKind, K: ScopeGroups>(
        &self,
        group: GroupType<R, ScopedRecord<K>>,
        referrer: &R::Key,
        in_context: Option<&str>,
        include_globals: bool,
    ) -> Option<Arc<ScopedRecord<K>>> {
        let at = now();
        for record in self.cached(group, referrer) {
            if record.is_lapsed_at(at) {
                self.expire(&record, at);
                continue;
            }
            if self.applies(&record, in_context, include_globals) {
                return Some(record);
            }
        }
        None
    }

    fn applies<K: ScopeGroups>(&self, record: &ScopedRecord<K>, in_context: Option<&str>, include_globals: bool) -> bool {
        match (record.context(), in_context) {
            (None, _) => include_globals || in_context.is_none(),
            (Some(context), Some(requested)) => self.matcher.matches(context, requested),
            (Some(_), None) => false,
        }
    }

    fn in_any_context<K: ScopeGroups>(&self, record: &ScopedRecord<K>, contexts: &[&str]) -> bool {
        record
            .context()
            .is_some_and(|context| contexts.iter().any(|requested| self.matcher.matches(context, requested)))
    }

    /// Rewrite a lapsed record as expired.
    fn expire<K: ScopeGroups>(&self, record: &Arc<ScopedRecord<K>>, at: NaiveDateTime) {
        let mut mutable = record.to_mutable();
        if !mutable.expire_if_lapsed(at) {
            return;
        }
        match self.database.try_save_scoped(&mutable) {
            Ok(_) => info!("{} #{} expired", K::NAME, record.id()),
            Err(e) => error!("Failed to expire {} #{}: {e}", K::NAME, record.id()),
        }
        self.invalidate_views(record);
    }

    fn lift_all<K: ScopeGroups>(
        &self,
        player: Uuid,
        staff: Option<Uuid>,
        reason: Option<&str>,
        filter: impl Fn(&ScopedRecord<K>) -> bool,
    ) -> usize {
        let at = now();
        let mut lifted = 0;
        for record in self.uncached_scoped::<K>(Target::Player(player), Some(Status::Active), None) {
            if record.is_lapsed_at(at) {
                self.expire(&record, at);
                continue;
            }
            if filter(record.as_ref()) && self.lift(&record, staff, reason) {
                lifted += 1;
            }
        }
        lifted
    }

    /// End one record now. Failures are logged.
    fn lift<K: ScopeGroups>(&self, record: &Arc<ScopedRecord<K>>, staff: Option<Uuid>, reason: Option<&str>) -> bool {
        let mut mutable = record.to_mutable();
        mutable.terminate_now(staff, reason.map(str::to_string));
        match self.commit_scoped(&mutable) {
            Ok(_) => true,
            Err(e) => {
                error!("Failed to end {} #{}: {e}", K::NAME, record.id());
                false
            }
        }
    }

    fn commit_scoped<K: ScopeGroups>(
        &self,
        mutable: &MutableScopedRecord<K>,
    ) -> Result<Arc<ScopedRecord<K>>, StoreError> {
        let fresh = !mutable.original().is_loaded();
        let saved = self.database.try_save_scoped(mutable)?;

        if fresh {
            if let Some(player) = saved.player() {
                self.cache
                    .infuse_if_collection_present(K::BY_UUID, &player, Arc::clone(&saved));
            }
            if let Some(address) = saved.address() {
                self.cache
                    .infuse_if_collection_present(K::BY_ADDR, address, Arc::clone(&saved));
            }
        } else if mutable.is_modified() {
            // The player or address may have moved, so drop both sides.
            self.invalidate_views(mutable.original());
            self.invalidate_views(&saved);
        }
        Ok(saved)
    }

    fn invalidate_views<K: ScopeGroups>(&self, record: &ScopedRecord<K>) {
        if let Some(player) = record.player() {
            self.cache.invalidate_with_relatives(K::BY_UUID, &player);
        }
        if let Some(address) = record.address() {
            self.cache.invalidate_with_relatives(K::BY_ADDR, address);
        }
    }
}

impl std::fmt::Debug for AdminManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminManager")
            .field("dialect", &self.database.dialect())
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

fn shared<T>(records: Vec<T>) -> Vec<Arc<T>> {
    records.into_iter().map(Arc::new).collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use chrono::Duration;

    use super::*;
    use crate::database::{flaky_controller, recording_controller};
    use crate::record::{BanBuilder, CommentBuilder, KickBuilder, MuteBuilder};

    fn manager() -> AdminManager {
        AdminManager::new(Arc::new(recording_controller().0), &CacheSettings::default())
    }

    fn ban_in(manager: &AdminManager, player: Uuid, context: Option<&str>) -> Arc<BanRecord> {
        let mut builder = BanBuilder::new().player(player).reason("griefing");
        if let Some(context) = context {
            builder = builder.context(context);
        }
        let fresh = Arc::new(builder.build().unwrap());
        manager.commit_ban(&fresh.to_mutable()).unwrap()
    }

    #[test]
    fn test_join_increments_issue_one_join_update() {
        let (controller, log) = recording_controller();
        let manager = AdminManager::new(Arc::new(controller), &CacheSettings::default());
        let alice = Uuid::new_v4();

        let fresh = manager.get_or_init_player_record(alice, "Alice").unwrap();
        assert!(!fresh.is_loaded());
        assert_eq!(fresh.last_join(), fresh.first_join());
        assert_eq!(fresh.total_joins(), 0);

        manager.commit_player(&fresh.to_mutable()).unwrap();
        let stored = manager.get_player_record(alice).unwrap();
        assert!(stored.is_loaded());

        let mut mutable = stored.to_mutable();
        mutable.increment_total_joins();
        mutable.increment_total_joins();
        manager.commit_player(&mutable).unwrap();

        let reloaded = manager.database().try_player(alice).unwrap().unwrap();
        assert_eq!(reloaded.total_joins(), 2);
        assert_eq!(manager.get_player_record(alice).unwrap().total_joins(), 2);

        let updates: Vec<String> = log
            .lock()
            .iter()
            .filter(|sql| sql.starts_with("UPDATE players"))
            .cloned()
            .collect();
        assert_eq!(
            updates,
            ["UPDATE players SET username = ?, lastJoin = ?, lastIP = ?, totalJoins = ? WHERE uuid = ?"]
        );
    }

    #[test]
    fn test_context_ban_applies_only_in_its_context() {
        let manager = manager();
        let player = Uuid::new_v4();
        ban_in(&manager, player, Some("lobby"));

        let active = manager.get_active_ban(player, Some("lobby"), false).unwrap();
        assert_eq!(active.context(), Some("lobby"));
        assert!(manager.get_active_ban(player, Some("LOBBY"), false).is_some());
        assert!(manager.get_active_ban(player, Some("arena"), false).is_none());
        assert!(manager.get_active_ban(player, None, true).is_none());

        let mut mutable = active.to_mutable();
        mutable.terminate_now(None, Some("appeal accepted".to_string()));
        manager.commit_ban(&mutable).unwrap();

        assert!(manager.get_active_ban(player, Some("lobby"), false).is_none());
        assert_eq!(manager.get_ban_records(player, None)[0].status(), Status::Ended);
    }

    #[test]
    fn test_global_ban_applies_when_globals_included() {
        let manager = manager();
        let player = Uuid::new_v4();
        ban_in(&manager, player, None);

        assert!(manager.get_active_ban(player, None, false).is_some());
        assert!(manager.get_active_ban(player, Some("arena"), true).is_some());
        assert!(manager.get_active_ban(player, Some("arena"), false).is_none());
    }

    #[test]
    fn test_address_ban_found_after_player_miss() {
        let manager = manager();
        let player = Uuid::new_v4();
        let address = "192.0.2.14";
        let fresh = Arc::new(MuteBuilder::new().address(address).build().unwrap());
        manager.commit_mute(&fresh.to_mutable()).unwrap();

        assert!(manager.get_active_mute(player, None, true).is_none());
        let found = manager.get_active_mute_for(player, address, None, true).unwrap();
        assert_eq!(found.address(), Some(address));
        assert_eq!(manager.get_mute_records_for(player, address, None).len(), 1);
    }

    #[test]
    fn test_new_ban_is_infused_into_cached_history() {
        let manager = manager();
        let player = Uuid::new_v4();
        assert!(manager.get_ban_records(player, None).is_empty());
        assert!(manager.get_active_ban(player, None, true).is_none());

        let saved = ban_in(&manager, player, None);

        let history = manager.get_ban_records(player, None);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id(), saved.id());
        assert_eq!(manager.get_active_ban(player, None, true).unwrap().id(), saved.id());
    }

    #[test]
    fn test_lapsed_ban_is_expired_on_lookup() {
        let manager = manager();
        let player = Uuid::new_v4();
        let issued = now() - Duration::hours(2);
        let mut lapsed = BanBuilder::new()
            .player(player)
            .issued_at(issued)
            .expires_at(issued + Duration::hours(1))
            .build()
            .unwrap();
        lapsed.status = Status::Active;
        manager.database().try_insert_scoped(&lapsed).unwrap();

        assert!(manager.get_active_ban(player, None, true).is_none());

        let expired = manager.get_ban_records_by_status(Target::Player(player), Status::Expired, None);
        assert_eq!(expired.len(), 1);
        assert!(manager
            .get_ban_records_by_status(Target::Player(player), Status::Active, None)
            .is_empty());
    }

    #[test]
    fn test_unban_by_context_then_global_then_everywhere() {
        let manager = manager();
        let player = Uuid::new_v4();
        let staff = Uuid::new_v4();
        ban_in(&manager, player, Some("lobby"));
        ban_in(&manager, player, Some("arena"));
        ban_in(&manager, player, None);

        assert_eq!(manager.unban_in_contexts(player, Some(staff), Some("served"), &["Arena"]), 1);
        assert!(manager.get_active_ban(player, Some("arena"), false).is_none());

        assert!(manager.unban_global_only(player, Some(staff), None));
        assert!(!manager.unban_global_only(player, Some(staff), None));

        assert_eq!(manager.unban_everywhere(player, None, None), 1);
        assert!(manager.get_active_ban(player, Some("lobby"), true).is_none());
        assert_eq!(manager.count_bans(Party::Player(player)), 3);
        assert_eq!(
            manager
                .get_ban_records_by_status(Target::Player(player), Status::Ended, None)
                .len(),
            3
        );
    }

    #[test]
    fn test_unmute_everywhere_counts_only_active() {
        let manager = manager();
        let player = Uuid::new_v4();
        for context in ["lobby", "arena"] {
            let fresh = Arc::new(MuteBuilder::new().player(player).context(context).build().unwrap());
            manager.commit_mute(&fresh.to_mutable()).unwrap();
        }

        assert_eq!(manager.unmute_in_contexts(player, None, None, &["lobby", "skyblock"]), 1);
        assert_eq!(manager.unmute_everywhere(player, None, None), 1);
        assert_eq!(manager.unmute_everywhere(player, None, None), 0);
        assert!(!manager.unmute_global_only(player, None, None));
    }

    #[test]
    fn test_kicks_and_comments_by_type() {
        let manager = manager();
        let player = Uuid::new_v4();
        let staff = Uuid::new_v4();
        assert!(manager.get_kick_records(player, None).is_empty());

        manager
            .commit_kick(&KickBuilder::new(player).staff(staff).global(true).build())
            .unwrap();
        manager
            .commit_kick(&KickBuilder::new(player).staff(staff).reason("afk").build())
            .unwrap();

        assert_eq!(manager.get_kick_records(player, None).len(), 2);
        assert_eq!(manager.get_kick_records_by_type(player, true, None).len(), 1);
        let local = manager.get_kick_records_by_type(player, false, Some(&LookupOptions::with_limit(5)));
        assert_eq!(local[0].reason(), Some("afk"));
        assert_eq!(manager.count_kicks(Party::Staff(staff)), 2);

        let warning = Arc::new(CommentBuilder::new(player).warning(true).comment("spam").build().unwrap());
        let saved = manager.commit_comment(&warning.to_mutable()).unwrap();
        let note = Arc::new(CommentBuilder::new(player).comment("friendly").build().unwrap());
        manager.commit_comment(&note.to_mutable()).unwrap();

        assert_eq!(manager.get_comment_records_by_type(player, true, None).len(), 1);
        assert_eq!(manager.get_comment_records(player, None).len(), 2);

        let mut mutable = saved.to_mutable();
        assert!(mutable.set_warning(false).is_err());
        mutable.set_comment("spam in chat");
        manager.commit_comment(&mutable).unwrap();

        let warnings = manager.get_comment_records_by_type(player, true, Some(&LookupOptions::default()));
        assert_eq!(warnings[0].comment(), "spam in chat");
        assert_eq!(manager.count_comments(Party::Player(player)), 2);
    }

    #[test]
    fn test_player_lookup_by_name() {
        let manager = manager();
        let steve = Uuid::new_v4();
        let fresh = manager.get_or_init_player_record(steve, "Steve").unwrap();
        manager.commit_player(&fresh.to_mutable()).unwrap();

        assert_eq!(manager.get_player_record_by_name("Steve").unwrap().uuid(), steve);
        assert!(manager.get_player_record_by_name("Herobrine").is_none());
    }

    #[test]
    fn test_failed_player_load_seeds_nothing() {
        let (controller, offline) = flaky_controller();
        let manager = AdminManager::new(Arc::new(controller), &CacheSettings::default());
        let steve = Uuid::new_v4();
        let stored = manager
            .database()
            .try_insert_player(&PlayerRecord::new(steve, "Steve", now()))
            .unwrap();

        offline.store(true, Ordering::SeqCst);
        assert!(matches!(
            manager.get_or_init_player_record(steve, "Steve"),
            Err(StoreError::Connection(_))
        ));

        offline.store(false, Ordering::SeqCst);
        let found = manager.get_or_init_player_record(steve, "Steve").unwrap();
        assert!(found.is_loaded());
        assert_eq!(*found, stored);
    }

    #[test]
    fn test_disabled_cache_still_serves_lookups() {
        let settings = CacheSettings {
            enabled: false,
            ..CacheSettings::default()
        };
        let manager = AdminManager::new(Arc::new(recording_controller().0), &settings);
        let player = Uuid::new_v4();
        ban_in(&manager, player, None);

        assert!(!manager.cache().is_enabled());
        assert!(manager.get_active_ban(player, None, false).is_some());
        assert!(manager.unban_global_only(player, None, None));
        assert!(manager.get_active_ban(player, None, false).is_none());
    }
}
