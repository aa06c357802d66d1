//! Configuration module for the National ID service

use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};
use std::path::PathBuf;
use std::time::Duration;

/// Owner assigned to seed keys that don't name one
pub const DEFAULT_OWNER: &str = "default";

/// Key provisioned when no seed keys are configured
pub const DEMO_KEY: (&str, &str) = ("demo-key-123", "Demo account");

/// Main application settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub api: ApiSettings,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Which `UsageStore` implementation backs the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// File-backed SQLite, survives restarts
    Sqlite,
    /// Process memory, lost on restart
    Memory,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Sqlite => "sqlite",
            StorageBackend::Memory => "memory",
        }
    }
}

/// Usage store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub path: PathBuf,
    pub backend: StorageBackend,
}

/// API key and rate limit configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    pub rate_limit_per_minute: u32,
    /// Comma separated `key:owner` pairs
    #[serde(default)]
    pub default_keys: String,
}

/// A key provisioned at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedKey {
    pub key: String,
    pub owner: String,
}

impl SeedKey {
    pub fn new(key: impl Into<String>, owner: impl Into<String>) -> Self {
        Self { key: key.into(), owner: owner.into() }
    }
}

/// Rate limiting parameters handed to the authenticator and to provisioning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests admitted per key per window
    pub requests_per_minute: u32,
    pub window: Duration,
}

impl RateLimitConfig {
    pub fn per_minute(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
            window: Duration::from_secs(60),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::per_minute(60)
    }
}

/// Parse `key:owner,key2:owner2,key3` into seed keys.
///
/// An item without `:` or with an empty owner gets [`DEFAULT_OWNER`]. Blank
/// items are skipped. If nothing remains the demo key is returned.
pub fn parse_seed_keys(value: &str) -> Vec<SeedKey> {
    let keys: Vec<SeedKey> = value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .filter_map(|item| {
            let (key, owner) = match item.split_once(':') {
                Some((key, owner)) => (key.trim(), owner.trim()),
                None => (item, ""),
            };
            if key.is_empty() {
                return None;
            }
            let owner = if owner.is_empty() { DEFAULT_OWNER } else { owner };
            Some(SeedKey::new(key, owner))
        })
        .collect();

    if keys.is_empty() {
        vec![SeedKey::new(DEMO_KEY.0, DEMO_KEY.1)]
    } else {
        keys
    }
}

impl Settings {
    /// Load configuration from files and environment variables
    ///
    /// Configuration priority (highest to lowest):
    /// 1. Environment variables (NATIONAL_ID_API__RATE_LIMIT_PER_MINUTE, etc.)
    /// 2. config/local.toml (gitignored)
    /// 3. config/default.toml
    /// 4. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"));

        let builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("database.path", "data/app.db")?
            .set_default("database.backend", "sqlite")?
            .set_default("api.rate_limit_per_minute", 60)?
            .set_default("api.default_keys", "")?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                Environment::with_prefix("NATIONAL_ID")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
            );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.api.rate_limit_per_minute == 0 {
            return Err(ConfigError::Message(
                "api.rate_limit_per_minute must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig::per_minute(self.api.rate_limit_per_minute)
    }

    pub fn seed_keys(&self) -> Vec<SeedKey> {
        parse_seed_keys(&self.api.default_keys)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            server: ServerSettings {
                host: "0.0.0.0".to_string(),
                port: 8080,
                workers: None,
            },
            database: DatabaseSettings {
                path: PathBuf::from("data/app.db"),
                backend: StorageBackend::Sqlite,
            },
            api: ApiSettings {
                rate_limit_per_minute: 60,
                default_keys: String::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_owner_pairs() {
        let keys = parse_seed_keys("test-key:Test User, rate-key:Rate User");
        assert_eq!(
            keys,
            vec![
                SeedKey::new("test-key", "Test User"),
                SeedKey::new("rate-key", "Rate User"),
            ]
        );
    }

    #[test]
    fn test_parse_missing_owner_uses_default() {
        let keys = parse_seed_keys("bare-key,empty-owner:");
        assert_eq!(
            keys,
            vec![
                SeedKey::new("bare-key", DEFAULT_OWNER),
                SeedKey::new("empty-owner", DEFAULT_OWNER),
            ]
        );
    }

    #[test]
    fn test_parse_owner_may_contain_colon() {
        let keys = parse_seed_keys("k:Team: Billing");
        assert_eq!(keys, vec![SeedKey::new("k", "Team: Billing")]);
    }

    #[test]
    fn test_parse_skips_blank_items() {
        let keys = parse_seed_keys(" , a:A ,, ");
        assert_eq!(keys, vec![SeedKey::new("a", "A")]);
    }

    #[test]
    fn test_parse_empty_falls_back_to_demo_key() {
        for value in ["", "  ", ",,", ":orphan-owner"] {
            assert_eq!(
                parse_seed_keys(value),
                vec![SeedKey::new("demo-key-123", "Demo account")],
                "{value:?}"
            );
        }
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.rate_limit(), RateLimitConfig::per_minute(60));
        assert_eq!(settings.rate_limit().window, Duration::from_secs(60));
        assert_eq!(settings.database.backend, StorageBackend::Sqlite);
        assert_eq!(settings.bind_addr(), "0.0.0.0:8080");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_zero_rate_limit_rejected() {
        let mut settings = Settings::default();
        settings.api.rate_limit_per_minute = 0;
        assert!(settings.validate().is_err());
    }
}
