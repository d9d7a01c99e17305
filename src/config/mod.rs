//! Configuration layer: typed settings with layered precedence (file → env).

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "larpwright";
const DEFAULT_SNAPSHOT_TTL_SECS: u64 = 86_400;
const DEFAULT_LOCK_TTL_SECS: u64 = 5;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Top-level settings for the snapshot cache engine.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
}

impl Settings {
    /// Load settings from `config/default`, an optional `larpwright` file in
    /// the working directory, and `LARPWRIGHT_`-prefixed environment
    /// variables, in increasing precedence.
    pub fn load() -> Result<Self, SettingsError> {
        let config = Config::builder()
            .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
            .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false))
            .add_source(Environment::with_prefix("LARPWRIGHT").separator("__"))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: LogLevel,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
        }
    }
}

/// Snapshot cache settings; see [`crate::cache::CacheConfig`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub snapshot_ttl_secs: u64,
    pub lock_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            snapshot_ttl_secs: DEFAULT_SNAPSHOT_TTL_SECS,
            lock_ttl_secs: DEFAULT_LOCK_TTL_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = Settings::default();
        assert_eq!(settings.logging.level, LogLevel::Info);
        assert_eq!(settings.logging.format, LogFormat::Compact);
        assert!(settings.cache.enabled);
        assert_eq!(settings.cache.snapshot_ttl_secs, 86_400);
        assert_eq!(settings.cache.lock_ttl_secs, 5);
    }

    #[test]
    fn cache_config_bridge() {
        let settings = CacheSettings {
            enabled: false,
            snapshot_ttl_secs: 120,
            lock_ttl_secs: 2,
        };
        let config = crate::cache::CacheConfig::from(&settings);
        assert!(!config.enabled);
        assert_eq!(config.snapshot_ttl_secs, 120);
        assert_eq!(config.lock_ttl_secs, 2);
    }

    #[test]
    fn log_level_filters() {
        assert_eq!(LevelFilter::from(LogLevel::Debug), LevelFilter::DEBUG);
        assert_eq!(LevelFilter::from(LogLevel::Error), LevelFilter::ERROR);
    }
}
