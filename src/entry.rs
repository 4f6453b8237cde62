//! Cache entry model
//!
//! The unit of storage across all tiers: an opaque JSON payload plus its
//! write instant and time-to-live. Entries are never mutated in place; a
//! refresh replaces the whole entry.
//!
//! The durable on-disk record format is exactly this struct JSON-encoded,
//! so a durable tier can be reconstructed without any external state.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::error::CacheError;

/// A single cache entry: opaque value, write timestamp, validity window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    /// Opaque payload, not interpreted by the cache
    pub data: Value,
    /// Write/refresh instant, epoch milliseconds UTC
    pub written_at: i64,
    /// Validity window in milliseconds from `written_at`
    pub ttl_ms: i64,
}

impl CacheEntry {
    /// Create an entry written now with the given TTL
    pub fn new(data: Value, ttl: Duration) -> Self {
        Self {
            data,
            written_at: now_ms(),
            ttl_ms: ttl_to_ms(ttl),
        }
    }

    /// Create an entry with an explicit write instant (durable reload, tests)
    pub fn with_written_at(data: Value, ttl: Duration, written_at: i64) -> Self {
        Self {
            data,
            written_at,
            ttl_ms: ttl_to_ms(ttl),
        }
    }

    /// Instant past which the entry is logically absent, epoch millis
    pub fn expires_at_ms(&self) -> i64 {
        self.written_at.saturating_add(self.ttl_ms)
    }

    /// Whether the entry is expired at the given instant
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms > self.expires_at_ms()
    }

    /// Whether the entry is expired now
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_ms())
    }

    /// Remaining validity, zero if already expired
    pub fn remaining(&self) -> Duration {
        let left = self.expires_at_ms().saturating_sub(now_ms());
        Duration::from_millis(left.max(0) as u64)
    }

    /// Decode the payload into a concrete type
    pub fn decode<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<T, CacheError> {
        serde_json::from_value(self.data.clone()).map_err(|source| CacheError::Decode {
            key: key.to_string(),
            source,
        })
    }
}

/// Current instant as epoch milliseconds UTC
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

// Oversized durations saturate instead of wrapping negative
fn ttl_to_ms(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fresh_entry_not_expired() {
        let entry = CacheEntry::new(json!({"v": 1}), Duration::from_secs(60));
        assert!(!entry.is_expired());
        assert!(entry.remaining() > Duration::from_secs(55));
    }

    #[test]
    fn test_backdated_entry_expired() {
        let written = now_ms() - 120_000; // 2 minutes ago
        let entry = CacheEntry::with_written_at(json!(42), Duration::from_secs(60), written);
        assert!(entry.is_expired());
        assert_eq!(entry.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_expiry_boundary() {
        let entry = CacheEntry::with_written_at(json!(null), Duration::from_millis(1000), 5000);
        // Logically absent strictly after written_at + ttl
        assert!(!entry.is_expired_at(6000));
        assert!(entry.is_expired_at(6001));
    }

    #[test]
    fn test_oversized_ttl_saturates() {
        let entry = CacheEntry::new(json!(1), Duration::MAX);
        assert_eq!(entry.ttl_ms, i64::MAX);
        assert!(!entry.is_expired());
        assert!(entry.remaining() > Duration::from_secs(3600));
    }

    #[test]
    fn test_durable_record_round_trip() {
        let entry = CacheEntry::new(json!({"name": "4B", "seats": 28}), Duration::from_secs(900));
        let raw = serde_json::to_string(&entry).unwrap();
        let restored: CacheEntry = serde_json::from_str(&raw).unwrap();
        assert_eq!(restored, entry);
    }

    #[test]
    fn test_decode_typed() {
        #[derive(serde::Deserialize)]
        struct Score {
            v: u32,
        }
        let entry = CacheEntry::new(json!({"v": 15}), Duration::from_secs(120));
        let score: Score = entry.decode("grades:c1:s1").unwrap();
        assert_eq!(score.v, 15);

        let err = entry.decode::<Vec<String>>("grades:c1:s1");
        assert!(err.is_err());
    }
}
