//! Sensitive-data isolation policy
//!
//! Classifies keys by their resource-kind prefix and forces writes of
//! regulated/personal data into the volatile tier, whatever tier the
//! caller asked for. Advisory in, mandatory out: callers may mis-tag a
//! write, but this policy is the sole authority on what reaches a
//! durable medium.

use tracing::warn;

use crate::keys::kind_of;
use crate::store::Tier;

/// Resource kinds whose entries must never land in a durable tier
pub const SENSITIVE_KINDS: &[&str] = &[
    "students",
    "student-details",
    "teachers",
    "teacher-details",
    "grades",
    "grade-details",
    "payments",
    "payment-details",
];

/// Whether a key's resource-kind prefix denotes sensitive data
///
/// Only the kind segment is inspected, never the value.
pub fn is_sensitive_key(key: &str) -> bool {
    let kind = kind_of(key);
    SENSITIVE_KINDS.contains(&kind)
}

/// Resolve the tier a write is actually allowed to reach
///
/// Forced to `Volatile` if the caller flags the write sensitive or the
/// key prefix matches the sensitive list. The override is silent in
/// production; `dev_mode` emits a diagnostic warning.
pub fn resolve_target_tier(requested: Tier, sensitive: bool, key: &str, dev_mode: bool) -> Tier {
    if requested == Tier::Volatile {
        return Tier::Volatile;
    }
    if sensitive || is_sensitive_key(key) {
        if dev_mode {
            warn!(
                key = key,
                requested = requested.as_str(),
                "Sensitive write forced to volatile tier"
            );
        }
        return Tier::Volatile;
    }
    requested
}
