//! Configuration for kvlock clients

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix, e.g. `KVLOCK__LOCK__LEASE_MS=5000`
pub const ENV_PREFIX: &str = "KVLOCK";

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Backing store connection
    #[serde(default)]
    pub store: StoreConfig,

    /// Lock protocol tuning
    #[serde(default)]
    pub lock: LockConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            store: StoreConfig::default(),
            lock: LockConfig::default(),
        }
    }
}

/// Backing store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store URL (`redis://host:port/db`)
    #[serde(default = "default_url")]
    pub url: String,

    /// Upper bound on a single store command
    #[serde(default = "default_command_timeout")]
    pub command_timeout_ms: u64,

    /// Upper bound on establishing the connection
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

fn default_url() -> String {
    "redis://127.0.0.1:6379/0".to_string()
}
fn default_command_timeout() -> u64 {
    2_000
}
fn default_connect_timeout() -> u64 {
    5_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            command_timeout_ms: default_command_timeout(),
            connect_timeout_ms: default_connect_timeout(),
        }
    }
}

impl StoreConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Lock protocol configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// Default lease length
    #[serde(default = "default_lease_ms")]
    pub lease_ms: u64,

    /// Guard band before expiry inside which release refuses to delete
    #[serde(default = "default_safety_margin")]
    pub safety_margin_ms: u64,

    /// Backoff unit; attempt `i` sleeps `(i + 1) * unit`
    #[serde(default = "default_backoff_unit")]
    pub backoff_unit_ms: u64,

    /// Attempts made by the bounded retry driver
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Write a random holder token next to the expiry
    #[serde(default = "default_true")]
    pub fencing: bool,

    /// Use store-side compare-and-swap when the adapter offers it
    #[serde(default = "default_true")]
    pub conditional_writes: bool,
}

fn default_lease_ms() -> u64 {
    30_000
}
fn default_safety_margin() -> u64 {
    100
}
fn default_backoff_unit() -> u64 {
    1
}
fn default_max_attempts() -> u32 {
    50
}
fn default_true() -> bool {
    true
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lease_ms: default_lease_ms(),
            safety_margin_ms: default_safety_margin(),
            backoff_unit_ms: default_backoff_unit(),
            max_attempts: default_max_attempts(),
            fencing: true,
            conditional_writes: true,
        }
    }
}

impl LockConfig {
    pub fn lease(&self) -> Duration {
        Duration::from_millis(self.lease_ms)
    }

    pub fn safety_margin(&self) -> Duration {
        Duration::from_millis(self.safety_margin_ms)
    }

    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }
}

impl Config {
    /// Load from an optional TOML file, then apply `KVLOCK__*` environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.store.url.trim().is_empty() {
            return Err(Error::InvalidConfig("store.url cannot be empty".into()));
        }
        if self.store.command_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "store.command_timeout_ms must be positive".into(),
            ));
        }
        if self.store.connect_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "store.connect_timeout_ms must be positive".into(),
            ));
        }
        if self.lock.lease_ms == 0 {
            return Err(Error::InvalidConfig("lock.lease_ms must be positive".into()));
        }
        if self.lock.backoff_unit_ms == 0 {
            return Err(Error::InvalidConfig(
                "lock.backoff_unit_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}
