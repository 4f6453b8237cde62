//! Cache configuration
//!
//! Struct defaults with environment-variable overrides, plus the fixed
//! table of named TTL presets collaborators pick from instead of
//! inventing ad hoc durations.

use std::path::PathBuf;
use std::time::Duration;

use crate::store::SearchStrategy;

/// Named TTL presets for collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlPreset {
    /// Stable reference data (school structure, room lists)
    Reference,
    /// Listings that change within a workday
    Listing,
    /// Transactional data (grades being entered, payment status)
    Transactional,
    /// Near-realtime views
    Volatile,
}

impl TtlPreset {
    pub fn duration(&self) -> Duration {
        match self {
            TtlPreset::Reference => Duration::from_secs(30 * 60),
            TtlPreset::Listing => Duration::from_secs(15 * 60),
            TtlPreset::Transactional => Duration::from_secs(5 * 60),
            TtlPreset::Volatile => Duration::from_secs(2 * 60),
        }
    }
}

/// Configuration for the tiered cache and session lifecycle
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Backing file for the durable-session tier
    pub session_path: PathBuf,
    /// Backing file for the durable-profile tier
    pub profile_path: PathBuf,
    /// Interval of the periodic eager expiry sweep
    pub sweep_interval: Duration,
    /// Idle threshold before forced sign-out (default: 30 minutes)
    pub idle_threshold: Duration,
    /// Non-sensitive UI preference keys preserved across logout
    pub preserved_keys: Vec<String>,
    /// Default tier lookup order
    pub default_strategy: SearchStrategy,
    /// Emit diagnostics for silently-corrected sensitivity overrides
    pub dev_mode: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            session_path: PathBuf::from("cache-session.json"),
            profile_path: PathBuf::from("cache-profile.json"),
            sweep_interval: Duration::from_secs(60),
            idle_threshold: Duration::from_secs(30 * 60),
            preserved_keys: vec![
                "ui:theme".to_string(),
                "ui:language".to_string(),
                "ui:sidebar".to_string(),
            ],
            default_strategy: SearchStrategy::VOLATILE_FIRST,
            dev_mode: false,
        }
    }
}

impl CacheConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("CACHE_SESSION_PATH") {
            config.session_path = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("CACHE_PROFILE_PATH") {
            config.profile_path = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("CACHE_SWEEP_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                config.sweep_interval = Duration::from_secs(secs.max(1));
            }
        }

        if let Ok(val) = std::env::var("CACHE_IDLE_MINUTES") {
            if let Ok(mins) = val.parse::<u64>() {
                config.idle_threshold = Duration::from_secs(mins.max(1) * 60);
            }
        }

        if let Ok(val) = std::env::var("CACHE_DEV_MODE") {
            config.dev_mode = val == "1" || val.eq_ignore_ascii_case("true");
        }

        config
    }
}
