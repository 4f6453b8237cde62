//! Volatile tier store
//!
//! Process-memory map backing the volatile tier. All operations are O(1)
//! on a `DashMap`; nothing survives the process.

use dashmap::DashMap;
use tracing::debug;

use crate::entry::{now_ms, CacheEntry};
use crate::store::{Tier, TierStore};

/// In-process memory store for the volatile tier
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl TierStore for MemoryStore {
    fn tier(&self) -> Tier {
        Tier::Volatile
    }

    fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.get(key).map(|e| e.clone())
    }

    fn set(&self, key: &str, entry: CacheEntry) {
        self.entries.insert(key.to_string(), entry);
    }

    fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn sweep_expired(&self) -> usize {
        let now = now_ms();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.is_expired_at(now))
            .map(|e| e.key().clone())
            .collect();

        let mut removed = 0;
        for key in &expired {
            if self.entries.remove(key).is_some() {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(removed = removed, "Swept expired volatile entries");
        }
        removed
    }
}
