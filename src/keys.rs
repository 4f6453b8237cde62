//! Cache key convention
//!
//! Keys are namespaced as `<kind>:<scope>[:<subscope>]`, e.g.
//! `classes:school-42` or `grades:c1:s1`. The kind prefix is what the
//! sensitivity policy classifies on, and prefix-based invalidation
//! (`delete_by_prefix`) relies on the same shape.

use std::fmt;

/// Structured cache key following the `<kind>:<scope>[:<subscope>]` convention
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    /// Resource kind, e.g. "classes", "grades", "students"
    pub kind: String,
    /// Scope identifier, e.g. a school or class id
    pub scope: String,
    /// Optional sub-scope, e.g. a student id within a class
    pub subscope: Option<String>,
}

impl ResourceKey {
    /// Create a key without a sub-scope
    pub fn new(kind: &str, scope: &str) -> Self {
        Self {
            kind: kind.to_string(),
            scope: scope.to_string(),
            subscope: None,
        }
    }

    /// Create a key with a sub-scope
    pub fn with_subscope(kind: &str, scope: &str, subscope: &str) -> Self {
        Self {
            kind: kind.to_string(),
            scope: scope.to_string(),
            subscope: Some(subscope.to_string()),
        }
    }

    /// Convert to the storage key string
    pub fn to_storage_key(&self) -> String {
        match &self.subscope {
            Some(sub) => format!("{}:{}:{}", self.kind, self.scope, sub),
            None => format!("{}:{}", self.kind, self.scope),
        }
    }

    /// Prefix that invalidates every key under a kind+scope pair
    pub fn invalidation_prefix(kind: &str, scope: &str) -> String {
        format!("{kind}:{scope}:")
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_storage_key())
    }
}

/// Extract the resource-kind segment of a storage key
///
/// Keys without a `:` separator are treated as their own kind.
pub fn kind_of(key: &str) -> &str {
    key.split(':').next().unwrap_or(key)
}
