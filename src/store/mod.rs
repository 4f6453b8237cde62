//! Tier stores
//!
//! Three storage tiers with differing survivability sit behind one
//! `TierStore` trait: the facade never knows which concrete medium it is
//! talking to. Durable-medium failures are absorbed here and logged;
//! the caller only ever observes a degraded (volatile-only) effect.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::entry::CacheEntry;

/// Storage tier, ordered by survivability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Process/tab lifetime only
    Volatile,
    /// Survives reloads of the same tab, not a browser restart
    DurableSession,
    /// Survives restarts, bounded by user/OS eviction policy
    DurableProfile,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Volatile => "volatile",
            Tier::DurableSession => "durable-session",
            Tier::DurableProfile => "durable-profile",
        }
    }
}

/// Ordered permutation of the three tiers defining lookup precedence
///
/// A `get` walks tiers in this order; the first live hit wins and is
/// promoted into every tier ahead of where it was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchStrategy(pub [Tier; 3]);

impl SearchStrategy {
    /// Memory first, then tab-scoped, then profile-scoped (default)
    pub const VOLATILE_FIRST: SearchStrategy =
        SearchStrategy([Tier::Volatile, Tier::DurableSession, Tier::DurableProfile]);

    /// Tab-scoped medium checked before memory
    pub const SESSION_FIRST: SearchStrategy =
        SearchStrategy([Tier::DurableSession, Tier::Volatile, Tier::DurableProfile]);

    /// Profile-scoped medium checked first (cold-start reads)
    pub const PROFILE_FIRST: SearchStrategy =
        SearchStrategy([Tier::DurableProfile, Tier::Volatile, Tier::DurableSession]);

    /// Tiers in lookup order
    pub fn tiers(&self) -> &[Tier; 3] {
        &self.0
    }

    /// Tiers that precede `tier` in this strategy (promotion targets)
    pub fn higher_priority_than(&self, tier: Tier) -> &[Tier] {
        let pos = self.0.iter().position(|t| *t == tier).unwrap_or(0);
        &self.0[..pos]
    }
}

impl Default for SearchStrategy {
    fn default() -> Self {
        Self::VOLATILE_FIRST
    }
}

/// Uniform contract over one storage medium, oblivious to the others
///
/// Implementations are thread-safe and never propagate medium failures:
/// a failed durable write is logged and the in-process image kept, so
/// the worst case is a cold record after restart.
pub trait TierStore: Send + Sync {
    /// Which tier this store backs
    fn tier(&self) -> Tier;

    /// Fetch the raw entry, expired or not (expiry is the caller's call)
    fn get(&self, key: &str) -> Option<CacheEntry>;

    /// Insert or replace an entry
    fn set(&self, key: &str, entry: CacheEntry);

    /// Remove an entry, reporting whether it was present
    fn delete(&self, key: &str) -> bool;

    /// Snapshot of all stored keys (prefix sweeps, stats)
    fn keys(&self) -> Vec<String>;

    /// Number of stored entries, best-effort
    fn len(&self) -> usize;

    /// Whether the store holds no entries
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry unconditionally
    fn clear(&self);

    /// Eagerly remove expired entries, returning how many were dropped
    fn sweep_expired(&self) -> usize;
}
