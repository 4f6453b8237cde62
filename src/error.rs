//! Error types for cache operations
//!
//! Almost nothing in this crate is fatal: durable-medium failures and
//! corrupt records are absorbed at the tier-store boundary and logged.
//! Only payload-decode failures ever reach a caller.

use thiserror::Error;

/// Error types surfaced by the cache API
#[derive(Debug, Error)]
pub enum CacheError {
    /// Value could not be serialized into an entry payload
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Cached payload does not match the requested type
    #[error("payload decode failed for key {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}
