//! Durable tier store
//!
//! File-backed map modeling a durable browser medium. The whole store is
//! one JSON document (`{key -> entry}`), held in memory and flushed
//! write-through on every mutation. Two instances at distinct paths back
//! the durable-session and durable-profile tiers.
//!
//! Failure semantics: a failed flush is logged and the in-memory image
//! kept, so the caller sees "write did not happen durably, volatile copy
//! still exists". Corrupt or foreign records found at load time are
//! skipped as if absent, never surfaced as errors.

use dashmap::DashMap;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::entry::{now_ms, CacheEntry};
use crate::store::{Tier, TierStore};

/// File-backed store for a durable tier
pub struct FileStore {
    tier: Tier,
    path: PathBuf,
    entries: DashMap<String, CacheEntry>,
}

impl FileStore {
    /// Open a durable store, loading and sweeping any existing records
    ///
    /// Malformed records are dropped with a warning; expired records are
    /// eagerly evicted (the on-boot sweep).
    pub fn open(tier: Tier, path: impl AsRef<Path>) -> Self {
        let store = Self {
            tier,
            path: path.as_ref().to_path_buf(),
            entries: DashMap::new(),
        };
        store.load();
        let swept = store.sweep_expired();
        if swept > 0 {
            debug!(tier = tier.as_str(), swept = swept, "On-boot expiry sweep");
        }
        store
    }

    fn load(&self) {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                warn!(tier = self.tier.as_str(), path = %self.path.display(), error = %e,
                      "Durable medium unreadable, starting cold");
                return;
            }
        };

        // The document itself may be foreign or truncated; treat as empty
        let doc: BTreeMap<String, Value> = match serde_json::from_slice(&raw) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(tier = self.tier.as_str(), error = %e,
                      "Durable document malformed, starting cold");
                return;
            }
        };

        let mut skipped = 0usize;
        for (key, value) in doc {
            match serde_json::from_value::<CacheEntry>(value) {
                Ok(entry) => {
                    self.entries.insert(key, entry);
                }
                Err(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!(
                tier = self.tier.as_str(),
                skipped = skipped,
                "Skipped foreign/corrupt durable records"
            );
        }
    }

    /// Serialize the full map back to the medium
    ///
    /// Flush failures degrade to a volatile-only effect.
    fn flush(&self) {
        let snapshot: BTreeMap<String, CacheEntry> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        let raw = match serde_json::to_vec(&snapshot) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(tier = self.tier.as_str(), error = %e, "Durable serialization failed");
                return;
            }
        };

        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(tier = self.tier.as_str(), error = %e, "Durable directory unavailable");
                return;
            }
        }

        // Write to a sibling temp file then rename, so a crash mid-flush
        // never leaves a truncated document behind
        let tmp = self.path.with_extension("tmp");
        if let Err(e) = std::fs::write(&tmp, raw) {
            warn!(tier = self.tier.as_str(), path = %tmp.display(), error = %e,
                  "Durable flush failed, keeping in-memory image");
            return;
        }
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            warn!(tier = self.tier.as_str(), path = %self.path.display(), error = %e,
                  "Durable flush failed, keeping in-memory image");
        }
    }
}

impl TierStore for FileStore {
    fn tier(&self) -> Tier {
        self.tier
    }

    fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.get(key).map(|e| e.clone())
    }

    fn set(&self, key: &str, entry: CacheEntry) {
        self.entries.insert(key.to_string(), entry);
        self.flush();
    }

    fn delete(&self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.flush();
        }
        removed
    }

    fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&self) {
        self.entries.clear();
        self.flush();
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
            self.flush();
            debug!(
                tier = self.tier.as_str(),
                removed = removed,
                "Swept expired durable entries"
            );
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn temp_store(dir: &tempfile::TempDir) -> FileStore {
        FileStore::open(Tier::DurableProfile, dir.path().join("profile.json"))
    }

    #[test]
    fn test_round_trip_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = temp_store(&dir);
            store.set(
                "classes:school-42",
                CacheEntry::new(json!({"rooms": 12}), Duration::from_secs(1800)),
            );
        }

        let reopened = temp_store(&dir);
        let entry = reopened.get("classes:school-42").expect("survives reopen");
        assert_eq!(entry.data, json!({"rooms": 12}));
    }

    #[test]
    fn test_corrupt_records_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");
        std::fs::write(
            &path,
            r#"{
                "good:key": {"data": 1, "written_at": 9999999999999, "ttl_ms": 60000},
                "foreign:key": {"someOtherApp": true},
                "broken:key": "not an object"
            }"#,
        )
        .unwrap();

        let store = FileStore::open(Tier::DurableProfile, &path);
        assert!(store.get("good:key").is_some());
        assert!(store.get("foreign:key").is_none());
        assert!(store.get("broken:key").is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_whole_document_foreign() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");
        std::fs::write(&path, b"\x00\x01 definitely not json").unwrap();

        let store = FileStore::open(Tier::DurableProfile, &path);
        assert!(store.is_empty());
    }

    #[test]
    fn test_on_boot_sweep() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = temp_store(&dir);
            store.set(
                "stale:a",
                CacheEntry::with_written_at(json!(1), Duration::from_secs(1), now_ms() - 60_000),
            );
            store.set("live:b", CacheEntry::new(json!(2), Duration::from_secs(600)));
        }

        let reopened = temp_store(&dir);
        assert!(reopened.get("stale:a").is_none());
        assert!(reopened.get("live:b").is_some());
    }

    #[test]
    fn test_flush_replaces_document_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");
        {
            let store = FileStore::open(Tier::DurableProfile, &path);
            store.set("classes:s1", CacheEntry::new(json!(1), Duration::from_secs(600)));
        }

        // Leftover temp file from an interrupted flush must not shadow
        // or corrupt the real document
        std::fs::write(path.with_extension("tmp"), b"half-written garbage").unwrap();
        let store = FileStore::open(Tier::DurableProfile, &path);
        assert_eq!(store.get("classes:s1").unwrap().data, json!(1));

        store.set("classes:s2", CacheEntry::new(json!(2), Duration::from_secs(600)));
        assert!(!path.with_extension("tmp").exists());

        let reopened = FileStore::open(Tier::DurableProfile, &path);
        assert_eq!(reopened.len(), 2);
    }

    #[test]
    fn test_flush_failure_keeps_memory_image() {
        // Point the store at a path whose parent is a file: flushes fail
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file, not a dir").unwrap();

        let store = FileStore::open(Tier::DurableSession, blocker.join("session.json"));
        store.set("schedule:c1", CacheEntry::new(json!("mon"), Duration::from_secs(60)));

        // Durable write failed silently; in-process copy still serves reads
        assert_eq!(store.get("schedule:c1").unwrap().data, json!("mon"));
    }
}
