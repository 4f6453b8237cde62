//! Per-key subscription registry
//!
//! Listeners are notified on every change to their key, whether the
//! change originated locally or was applied from a sibling context.
//! Notification iterates over a snapshot of the listener list with no
//! map guard held, so a callback may freely subscribe, unsubscribe, or
//! mutate the cache without corrupting the in-progress loop. A
//! panicking subscriber is logged and skipped; the rest still run.

use dashmap::DashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

use crate::entry::CacheEntry;

/// Subscriber callback, invoked with the new entry or `None` on delete
pub type Callback = Arc<dyn Fn(&str, Option<&CacheEntry>) + Send + Sync>;

/// Registry of per-key listener lists
#[derive(Default)]
pub struct SubscriptionRegistry {
    listeners: DashMap<String, Vec<(u64, Callback)>>,
    next_id: AtomicU64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for a key
    ///
    /// The returned guard unsubscribes on drop.
    pub fn subscribe(self: &Arc<Self>, key: &str, callback: Callback) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .entry(key.to_string())
            .or_default()
            .push((id, callback));
        debug!(key = key, id = id, "Subscriber registered");

        Subscription {
            registry: Arc::downgrade(self),
            key: key.to_string(),
            id,
        }
    }

    /// Notify every listener registered for `key`
    pub fn notify(&self, key: &str, entry: Option<&CacheEntry>) {
        // Snapshot first: callbacks may re-enter the registry
        let snapshot: Vec<(u64, Callback)> = match self.listeners.get(key) {
            Some(list) => list.clone(),
            None => return,
        };

        for (id, callback) in snapshot {
            let result = catch_unwind(AssertUnwindSafe(|| callback(key, entry)));
            if result.is_err() {
                warn!(key = key, id = id, "Subscriber panicked during notification");
            }
        }
    }

    /// Number of listeners registered for a key
    pub fn listener_count(&self, key: &str) -> usize {
        self.listeners.get(key).map(|l| l.len()).unwrap_or(0)
    }

    fn remove(&self, key: &str, id: u64) {
        if let Some(mut list) = self.listeners.get_mut(key) {
            list.retain(|(entry_id, _)| *entry_id != id);
            if list.is_empty() {
                drop(list);
                self.listeners.remove_if(key, |_, l| l.is_empty());
            }
        }
    }
}

/// RAII subscription guard; dropping it unsubscribes
pub struct Subscription {
    registry: Weak<SubscriptionRegistry>,
    key: String,
    id: u64,
}

impl Subscription {
    /// Explicitly unsubscribe
    pub fn cancel(self) {}

    /// Key this subscription listens on
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.key, self.id);
            debug!(key = %self.key, id = self.id, "Subscriber removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    fn entry(v: i64) -> CacheEntry {
        CacheEntry::new(json!(v), Duration::from_secs(60))
    }

    #[test]
    fn test_notify_registered_key_only() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let hits = Arc::new(AtomicUsize::new(0));

        let hits_cb = hits.clone();
        let _sub = registry.subscribe(
            "grades:c1:s1",
            Arc::new(move |_, _| {
                hits_cb.fetch_add(1, Ordering::SeqCst);
            }),
        );

        registry.notify("grades:c1:s1", Some(&entry(1)));
        registry.notify("classes:s1", Some(&entry(2)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_on_drop() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let hits = Arc::new(AtomicUsize::new(0));

        let hits_cb = hits.clone();
        let sub = registry.subscribe(
            "k:1",
            Arc::new(move |_, _| {
                hits_cb.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert_eq!(registry.listener_count("k:1"), 1);

        drop(sub);
        assert_eq!(registry.listener_count("k:1"), 0);
        registry.notify("k:1", None);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_panicking_subscriber_isolated() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let hits = Arc::new(AtomicUsize::new(0));

        let _bad = registry.subscribe(
            "k:1",
            Arc::new(|_, _| panic!("subscriber bug")),
        );
        let hits_cb = hits.clone();
        let _good = registry.subscribe(
            "k:1",
            Arc::new(move |_, _| {
                hits_cb.fetch_add(1, Ordering::SeqCst);
            }),
        );

        registry.notify("k:1", Some(&entry(7)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reentrant_subscribe_during_notify() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let late_subs: Arc<Mutex<Vec<Subscription>>> = Arc::new(Mutex::new(Vec::new()));

        let registry_cb = registry.clone();
        let late_cb = late_subs.clone();
        let _sub = registry.subscribe(
            "k:1",
            Arc::new(move |_, _| {
                // Subscribing to the same key mid-notification must not deadlock
                let sub = registry_cb.subscribe("k:1", Arc::new(|_, _| {}));
                late_cb.lock().unwrap().push(sub);
            }),
        );

        registry.notify("k:1", Some(&entry(1)));
        assert_eq!(registry.listener_count("k:1"), 2);
    }

    #[test]
    fn test_delete_notification_carries_absent() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let saw_absent = Arc::new(AtomicUsize::new(0));

        let saw = saw_absent.clone();
        let _sub = registry.subscribe(
            "k:1",
            Arc::new(move |_, entry| {
                if entry.is_none() {
                    saw.fetch_add(1, Ordering::SeqCst);
                }
            }),
        );

        registry.notify("k:1", None);
        assert_eq!(saw_absent.load(Ordering::SeqCst), 1);
    }
}
