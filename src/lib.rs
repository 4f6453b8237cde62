//! # campus-cache-core
//!
//! Multi-tier cache with cross-context synchronization and a
//! sensitive-data isolation policy, plus the session-lifecycle cleanup
//! that consumes it.
//!
//! Three tier stores with differing survivability sit behind one
//! facade: a volatile in-process map, a tab-scoped durable medium, and
//! a profile-scoped durable medium. Reads walk the tiers in a
//! configurable order and promote hits upward; writes always land in
//! the volatile tier and reach a durable tier only if the sensitivity
//! policy allows it - regulated/personal data never touches a durable
//! medium. Mutations are mirrored to sibling contexts over a pluggable
//! sync transport and fanned out to per-key subscribers.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use campus_cache_core::{
//!     CacheConfig, LocalBus, NoopHooks, SessionLifecycle, Tier, TieredCache,
//! };
//!
//! let cache = TieredCache::new(CacheConfig::from_env(), Arc::new(LocalBus::new()));
//! cache.set(
//!     "classes:school-42",
//!     serde_json::json!(["4A", "4B"]),
//!     Duration::from_secs(900),
//!     Tier::DurableProfile,
//!     false,
//! );
//!
//! let lifecycle = SessionLifecycle::new(cache.clone(), Arc::new(NoopHooks));
//! lifecycle.start_idle_watch();
//! ```
//!
//! Nothing in this crate is fatal to the host: durable-medium failures,
//! corrupt records, panicking subscribers, and sync delivery failures
//! all degrade to a colder cache, never an error surfaced to the UI.

pub mod cache;
pub mod config;
pub mod entry;
pub mod error;
pub mod keys;
pub mod lifecycle;
pub mod policy;
pub mod store;
pub mod subscribe;
pub mod sync;

pub use cache::{spawn_sweep_task, CacheStats, TieredCache};
pub use config::{CacheConfig, TtlPreset};
pub use entry::CacheEntry;
pub use error::CacheError;
pub use keys::ResourceKey;
pub use lifecycle::{IdleTimer, NoopHooks, SessionHooks, SessionLifecycle};
pub use policy::{is_sensitive_key, SENSITIVE_KINDS};
pub use store::{FileStore, MemoryStore, SearchStrategy, Tier, TierStore};
pub use subscribe::{Subscription, SubscriptionRegistry};
pub use sync::{LocalBus, SyncAction, SyncChannel, SyncEvent, SyncTransport};
