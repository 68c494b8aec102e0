//! Configuration Module
//!
//! Handles loading the cache configuration from environment variables.

use std::env;
use std::path::PathBuf;

/// Default location of the backing store file.
pub const DEFAULT_DB_PATH: &str = "time-cached-db.json";

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path of the JSON file backing the cache store
    pub db_path: PathBuf,
    /// Compute uncached instead of failing when the store is unavailable
    pub degrade_on_store_error: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `TIMECACHE_DB` - Store file path (default: time-cached-db.json)
    /// - `TIMECACHE_DEGRADE` - Degrade to uncached calls on store errors (default: false)
    pub fn from_env() -> Self {
        Self {
            db_path: env::var("TIMECACHE_DB")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            degrade_on_store_error: env::var("TIMECACHE_DEGRADE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        }
    }

    /// Returns a copy of this config pointing at another store file.
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    /// Returns a copy of this config with the degrade policy set.
    pub fn with_degrade(mut self, degrade: bool) -> Self {
        self.degrade_on_store_error = degrade;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            degrade_on_store_error: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.db_path, PathBuf::from(DEFAULT_DB_PATH));
        assert!(!config.degrade_on_store_error);
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("TIMECACHE_DB");
        env::remove_var("TIMECACHE_DEGRADE");

        let config = Config::from_env();
        assert_eq!(config.db_path, PathBuf::from(DEFAULT_DB_PATH));
        assert!(!config.degrade_on_store_error);
    }

    #[test]
    fn test_config_builders() {
        let config = Config::default()
            .with_db_path("/tmp/other.json")
            .with_degrade(true);
        assert_eq!(config.db_path, PathBuf::from("/tmp/other.json"));
        assert!(config.degrade_on_store_error);
    }
}
