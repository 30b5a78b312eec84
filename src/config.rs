use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct MailgateConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub accounts: AccountSettings,
    #[serde(default)]
    pub credentials: CredentialConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Sled,
    Memory,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_backend() -> StorageBackend {
    StorageBackend::Sled
}

fn default_db_path() -> String {
    "./data/mailgate".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_db_path(),
        }
    }
}

/// Account provisioning settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AccountSettings {
    /// Mail domain every reserved address lives under
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(default = "default_subscription")]
    pub default_subscription: String,
    #[serde(default = "default_token_ttl")]
    pub activation_token_ttl_hours: i64,
}

fn default_domain() -> String {
    "pgp.st".to_string()
}

fn default_subscription() -> String {
    "beta".to_string()
}

fn default_token_ttl() -> i64 {
    48
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            default_subscription: default_subscription(),
            activation_token_ttl_hours: default_token_ttl(),
        }
    }
}

/// Argon2id cost parameters
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CredentialConfig {
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

fn default_memory_kib() -> u32 {
    19_456
}

fn default_iterations() -> u32 {
    2
}

fn default_parallelism() -> u32 {
    1
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

impl MailgateConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Load `path`, falling back to defaults. A missing file is created
    /// with the defaults. Nothing is logged here since this runs before the
    /// subscriber exists; pass the origin to [`ConfigOrigin::report`] later.
    pub fn load_or_default(path: &str) -> (Self, ConfigOrigin) {
        if Path::new(path).exists() {
            return match Self::load(path) {
                Ok(c) => (c, ConfigOrigin::Loaded),
                Err(e) => (Self::default(), ConfigOrigin::Invalid(e)),
            };
        }

        let config = Self::default();
        let origin = match toml::to_string_pretty(&config) {
            Ok(s) => match std::fs::write(path, s) {
                Ok(()) => ConfigOrigin::Created,
                Err(e) => ConfigOrigin::Unwritable(e.to_string()),
            },
            Err(e) => ConfigOrigin::Unwritable(e.to_string()),
        };
        (config, origin)
    }
}

/// Where the running configuration came from
#[derive(Debug)]
pub enum ConfigOrigin {
    Loaded,
    /// The file exists but could not be read or parsed
    Invalid(ConfigError),
    Created,
    /// The file was missing and writing the defaults failed
    Unwritable(String),
}

impl ConfigOrigin {
    pub fn report(&self, path: &str) {
        match self {
            ConfigOrigin::Loaded => info!("Config loaded from {}", path),
            ConfigOrigin::Invalid(e) => warn!("{} in {}. Using defaults.", e, path),
            ConfigOrigin::Created => info!("Config file not found at '{}'. Created default.", path),
            ConfigOrigin::Unwritable(e) => warn!("Could not write default config to {}: {}", path, e),
        }
    }
}
