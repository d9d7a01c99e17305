//! Cache configuration.

use std::time::Duration;

use serde::Deserialize;

// Default values for cache configuration
const DEFAULT_SNAPSHOT_TTL_SECS: u64 = 86_400;
const DEFAULT_LOCK_TTL_SECS: u64 = 5;

/// Snapshot cache configuration from `larpwright.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the snapshot cache. When off, reads build fresh every time
    /// and patches are no-ops.
    pub enabled: bool,
    /// Time-to-live for cached snapshots, in seconds.
    pub snapshot_ttl_secs: u64,
    /// Expiry for the best-effort patch lock, in seconds.
    pub lock_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            snapshot_ttl_secs: DEFAULT_SNAPSHOT_TTL_SECS,
            lock_ttl_secs: DEFAULT_LOCK_TTL_SECS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            snapshot_ttl_secs: settings.snapshot_ttl_secs,
            lock_ttl_secs: settings.lock_ttl_secs,
        }
    }
}

impl CacheConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn snapshot_ttl(&self) -> Duration {
        Duration::from_secs(self.snapshot_ttl_secs)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.snapshot_ttl_secs, 86_400);
        assert_eq!(config.lock_ttl_secs, 5);
    }

    #[test]
    fn ttl_conversion() {
        let config = CacheConfig {
            snapshot_ttl_secs: 60,
            lock_ttl_secs: 3,
            ..Default::default()
        };
        assert_eq!(config.snapshot_ttl(), Duration::from_secs(60));
        assert_eq!(config.lock_ttl(), Duration::from_secs(3));
    }
}
