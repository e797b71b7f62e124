use std::time::Duration;

use thiserror::Error;

use crate::indexes::{DEFAULT_TTL_SECONDS, MAX_TTL_SECONDS};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub store: StoreConfig,
    pub indexes: IndexConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Embedded,
    Mongo,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub mongodb_uri: String,
    pub database_name: String,
    pub collection_name: String,
    /// Directory for the embedded backend
    pub data_dir: String,
}

#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Activates idx_ttl_cleanup. Off unless a retention policy is wanted.
    pub enable_ttl: bool,
    pub ttl_seconds: u64,
    /// Drop each index before ensuring it
    pub rebuild: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Mongo,
            mongodb_uri: "mongodb://localhost:27017".to_string(),
            database_name: "csv_crud_db".to_string(),
            collection_name: "csv_files".to_string(),
            data_dir: "./data".to_string(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            enable_ttl: false,
            ttl_seconds: DEFAULT_TTL_SECONDS,
            rebuild: false,
        }
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = StoreConfig::default();

        let backend = match std::env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "mongodb".to_string())
            .to_lowercase()
            .as_str()
        {
            "embedded" | "redb" => StoreBackend::Embedded,
            _ => StoreBackend::Mongo,
        };

        let mongodb_uri = std::env::var("MONGODB_URI").unwrap_or(defaults.mongodb_uri);
        let database_name = std::env::var("MONGODB_DATABASE").unwrap_or(defaults.database_name);
        let collection_name = std::env::var("COLLECTION_NAME").unwrap_or(defaults.collection_name);
        let data_dir = std::env::var("DATA_DIR").unwrap_or(defaults.data_dir);

        let ttl_seconds = std::env::var("TTL_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TTL_SECONDS);

        let config = Config {
            store: StoreConfig {
                backend,
                mongodb_uri,
                database_name,
                collection_name,
                data_dir,
            },
            indexes: IndexConfig {
                enable_ttl: env_flag("ENABLE_TTL_INDEX"),
                ttl_seconds,
                rebuild: env_flag("REBUILD_INDEXES"),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.collection_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "COLLECTION_NAME cannot be empty".to_string(),
            ));
        }

        if self.store.database_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "MONGODB_DATABASE cannot be empty".to_string(),
            ));
        }

        if self.store.backend == StoreBackend::Mongo && self.store.mongodb_uri.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "MONGODB_URI is required when STORE_BACKEND=mongodb".to_string(),
            ));
        }

        if self.indexes.ttl_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "TTL_SECONDS must be greater than zero".to_string(),
            ));
        }

        // expireAfterSeconds is stored as a 32-bit integer by the server
        if self.indexes.ttl_seconds > MAX_TTL_SECONDS {
            return Err(ConfigError::ValidationError(format!(
                "TTL_SECONDS must be at most {MAX_TTL_SECONDS}"
            )));
        }

        if self.indexes.rebuild {
            tracing::warn!(
                "REBUILD_INDEXES is set. Every index is dropped before being recreated, \
                 so lookups fall back to collection scans while the run is in progress."
            );
        }

        Ok(())
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.indexes.ttl_seconds)
    }
}
