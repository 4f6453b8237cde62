//! Tiered cache facade
//!
//! Orchestrates the three tier stores behind one API: multi-tier lookup
//! with a configurable search order, write-through gated by the
//! sensitivity policy, prefix-based bulk eviction, full flush, and
//! statistics. Writes and deletes are mirrored onto the sync channel;
//! inbound events from sibling contexts land in the volatile tier and
//! fan out through the subscription registry.
//!
//! There is no hidden global instance: the cache is constructed once at
//! application start and passed around as an `Arc` handle.

use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{CacheConfig, TtlPreset};
use crate::entry::{now_ms, CacheEntry};
use crate::error::CacheError;
use crate::policy::{is_sensitive_key, resolve_target_tier};
use crate::store::{FileStore, MemoryStore, SearchStrategy, Tier, TierStore};
use crate::subscribe::{Callback, Subscription, SubscriptionRegistry};
use crate::sync::{SyncAction, SyncChannel, SyncEvent, SyncTransport};

// ============================================================================
// Statistics
// ============================================================================

/// Diagnostic counts, best-effort for the durable tiers
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub volatile_count: usize,
    pub durable_session_count: usize,
    pub durable_profile_count: usize,
    pub total: usize,
    pub hits: u64,
    pub misses: u64,
    pub expirations: u64,
}

// ============================================================================
// Facade
// ============================================================================

struct CacheInner {
    volatile: Arc<dyn TierStore>,
    session: Arc<dyn TierStore>,
    profile: Arc<dyn TierStore>,
    registry: Arc<SubscriptionRegistry>,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
}

impl CacheInner {
    fn store(&self, tier: Tier) -> &dyn TierStore {
        match tier {
            Tier::Volatile => self.volatile.as_ref(),
            Tier::DurableSession => self.session.as_ref(),
            Tier::DurableProfile => self.profile.as_ref(),
        }
    }

    /// Apply an event propagated from a sibling context
    ///
    /// Inbound sets overwrite the local volatile entry unconditionally
    /// (last-writer-wins); inbound deletes remove it. Only the volatile
    /// tier is touched, so the sensitivity invariant holds by
    /// construction on this path.
    fn apply_remote(&self, event: SyncEvent) {
        match event.action {
            SyncAction::Set => {
                if let Some(entry) = event.entry {
                    debug!(key = %event.key, origin = %event.origin, "Applying remote set");
                    self.volatile.set(&event.key, entry.clone());
                    self.registry.notify(&event.key, Some(&entry));
                }
            }
            SyncAction::Delete => {
                if self.volatile.delete(&event.key) {
                    debug!(key = %event.key, origin = %event.origin, "Applying remote delete");
                    self.registry.notify(&event.key, None);
                }
            }
        }
    }
}

/// Multi-tier cache with cross-context sync and sensitive-data isolation
pub struct TieredCache {
    inner: Arc<CacheInner>,
    channel: SyncChannel,
}

impl TieredCache {
    /// Create a cache wired to the given sync transport
    pub fn new(config: CacheConfig, transport: Arc<dyn SyncTransport>) -> Arc<Self> {
        let inner = Arc::new(CacheInner {
            volatile: Arc::new(MemoryStore::new()),
            session: Arc::new(FileStore::open(Tier::DurableSession, &config.session_path)),
            profile: Arc::new(FileStore::open(Tier::DurableProfile, &config.profile_path)),
            registry: Arc::new(SubscriptionRegistry::new()),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        });

        let inbound = inner.clone();
        let channel = SyncChannel::new(transport, Arc::new(move |event| inbound.apply_remote(event)));

        info!(context = %channel.context_id(), "Tiered cache initialized");
        Arc::new(Self { inner, channel })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Look a key up with the default strategy
    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_with(key, self.inner.config.default_strategy)
    }

    /// Walk tiers in `strategy` order, returning the first live hit
    ///
    /// The hit is promoted into every tier ahead of where it was found
    /// (durable promotion still passes the sensitivity gate). Expired
    /// entries encountered on the way are lazily evicted and count as
    /// misses.
    pub fn get_with(&self, key: &str, strategy: SearchStrategy) -> Option<Value> {
        self.get_entry_with(key, strategy).map(|e| e.data)
    }

    /// Typed lookup with the default strategy
    pub fn get_as<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.get_entry_with(key, self.inner.config.default_strategy) {
            Some(entry) => entry.decode(key).map(Some),
            None => Ok(None),
        }
    }

    fn get_entry_with(&self, key: &str, strategy: SearchStrategy) -> Option<CacheEntry> {
        let now = now_ms();
        for &tier in strategy.tiers() {
            let Some(entry) = self.inner.store(tier).get(key) else {
                continue;
            };

            if entry.is_expired_at(now) {
                // Lazy eviction: physically present, logically absent
                self.inner.store(tier).delete(key);
                self.inner.expirations.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            self.inner.hits.fetch_add(1, Ordering::Relaxed);
            self.promote(key, &entry, tier, strategy);
            debug!(key = key, tier = tier.as_str(), "Cache hit");
            return Some(entry);
        }

        self.inner.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key = key, "Cache miss");
        None
    }

    /// Copy a hit into every tier ahead of where it was found, and always
    /// into the volatile tier
    fn promote(&self, key: &str, entry: &CacheEntry, found_in: Tier, strategy: SearchStrategy) {
        let higher = strategy.higher_priority_than(found_in);
        for &target in higher {
            if target == Tier::Volatile
                || resolve_target_tier(target, false, key, self.inner.config.dev_mode) == target
            {
                self.inner.store(target).set(key, entry.clone());
            }
        }
        if found_in != Tier::Volatile && !higher.contains(&Tier::Volatile) {
            self.inner.volatile.set(key, entry.clone());
        }
    }

    /// Raw read of one tier, bypassing expiry and promotion (diagnostics)
    pub fn peek(&self, tier: Tier, key: &str) -> Option<CacheEntry> {
        self.inner.store(tier).get(key)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Write a value with an explicit TTL
    ///
    /// Always writes a volatile copy; additionally writes the tier the
    /// sensitivity policy resolves from `tier`/`sensitive`. The change
    /// is broadcast to sibling contexts and fanned out to local
    /// subscribers.
    pub fn set(&self, key: &str, value: Value, ttl: Duration, tier: Tier, sensitive: bool) {
        let entry = CacheEntry::new(value, ttl);

        self.inner.volatile.set(key, entry.clone());

        let effective = resolve_target_tier(tier, sensitive, key, self.inner.config.dev_mode);
        if effective != Tier::Volatile {
            self.inner.store(effective).set(key, entry.clone());
        }

        self.channel.send(key, Some(entry.clone()), SyncAction::Set);
        self.inner.registry.notify(key, Some(&entry));
    }

    /// Write a value with a named TTL preset
    pub fn set_with_preset(
        &self,
        key: &str,
        value: Value,
        preset: TtlPreset,
        tier: Tier,
        sensitive: bool,
    ) {
        self.set(key, value, preset.duration(), tier, sensitive);
    }

    /// Serialize and write a typed value
    pub fn set_typed<T: serde::Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
        tier: Tier,
        sensitive: bool,
    ) -> Result<(), CacheError> {
        let value = serde_json::to_value(value)?;
        self.set(key, value, ttl, tier, sensitive);
        Ok(())
    }

    // ========================================================================
    // Eviction
    // ========================================================================

    /// Remove a key from every tier
    ///
    /// Idempotent: deleting an absent key is a no-op that neither
    /// broadcasts nor notifies.
    pub fn delete(&self, key: &str) -> bool {
        let mut removed = false;
        for tier in [Tier::Volatile, Tier::DurableSession, Tier::DurableProfile] {
            removed |= self.inner.store(tier).delete(key);
        }

        if removed {
            self.channel.send(key, None, SyncAction::Delete);
            self.inner.registry.notify(key, None);
        }
        removed
    }

    /// Remove every key starting with `prefix` from all tiers
    ///
    /// Scoped invalidation, e.g. everything tied to one school. Each
    /// removed key goes through the normal delete path (broadcast +
    /// subscriber fan-out).
    pub fn delete_by_prefix(&self, prefix: &str) -> usize {
        let mut keys: Vec<String> = Vec::new();
        for tier in [Tier::Volatile, Tier::DurableSession, Tier::DurableProfile] {
            for key in self.inner.store(tier).keys() {
                if key.starts_with(prefix) && !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }

        let mut removed = 0;
        for key in &keys {
            if self.delete(key) {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(prefix = prefix, removed = removed, "Prefix eviction");
        }
        removed
    }

    /// Empty every tier unconditionally (session teardown only)
    pub fn clear(&self) {
        for tier in [Tier::Volatile, Tier::DurableSession, Tier::DurableProfile] {
            self.inner.store(tier).clear();
        }
        info!("Cache cleared across all tiers");
    }

    /// Remove sensitive keys from the volatile tier only
    ///
    /// Lighter-weight purge than logout, for idle-but-signed-in states.
    pub fn clear_sensitive(&self) -> usize {
        let keys: Vec<String> = self
            .inner
            .volatile
            .keys()
            .into_iter()
            .filter(|k| is_sensitive_key(k))
            .collect();

        let mut removed = 0;
        for key in &keys {
            if self.inner.volatile.delete(key) {
                self.inner.registry.notify(key, None);
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed = removed, "Sensitive entries purged from volatile tier");
        }
        removed
    }

    /// Eagerly evict expired entries from every tier
    pub fn sweep_expired(&self) -> usize {
        let mut removed = 0;
        for tier in [Tier::Volatile, Tier::DurableSession, Tier::DurableProfile] {
            removed += self.inner.store(tier).sweep_expired();
        }
        if removed > 0 {
            self.inner
                .expirations
                .fetch_add(removed as u64, Ordering::Relaxed);
        }
        removed
    }

    // ========================================================================
    // Subscriptions & sync lifecycle
    // ========================================================================

    /// Register a listener for every change to `key`
    pub fn subscribe(&self, key: &str, callback: Callback) -> Subscription {
        self.inner.registry.subscribe(key, callback)
    }

    /// Detach the sync channel ahead of a host suspend
    pub fn suspend_sync(&self) {
        self.channel.suspend();
    }

    /// Re-attach the sync channel after the host resumes
    pub fn resume_sync(&self) {
        self.channel.resume();
    }

    /// Permanently detach the sync channel (logout)
    pub fn close_sync(&self) {
        self.channel.close();
    }

    pub fn sync_open(&self) -> bool {
        self.channel.is_open()
    }

    // ========================================================================
    // Statistics & internals
    // ========================================================================

    /// Diagnostic counts; durable counts may undercount silently-evicted
    /// records
    pub fn stats(&self) -> CacheStats {
        let volatile_count = self.inner.volatile.len();
        let durable_session_count = self.inner.session.len();
        let durable_profile_count = self.inner.profile.len();

        CacheStats {
            volatile_count,
            durable_session_count,
            durable_profile_count,
            total: volatile_count + durable_session_count + durable_profile_count,
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            expirations: self.inner.expirations.load(Ordering::Relaxed),
        }
    }

    /// Write an entry back verbatim, bypassing policy and broadcast
    ///
    /// Used by the lifecycle manager to restore preserved preference
    /// records unchanged after a wipe.
    pub(crate) fn restore_entry(&self, tier: Tier, key: &str, entry: CacheEntry) {
        self.inner.store(tier).set(key, entry);
    }
}

/// Spawn a background task that periodically sweeps expired entries
pub fn spawn_sweep_task(cache: Arc<TieredCache>, interval: Duration) -> tokio::task::JoinHandle<()> {
    info!(interval_secs = interval.as_secs(), "Cache sweep task started");
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let removed = cache.sweep_expired();
            if removed > 0 {
                debug!(removed = removed, "Periodic cache sweep completed");
            }
        }
    })
}
