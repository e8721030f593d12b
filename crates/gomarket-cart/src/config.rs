//! # Cart Configuration
//!
//! Where the cart is persisted and how hard the writer tries.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     GOMARKET_STORAGE_BACKEND=sqlite                                    │
//! │     GOMARKET_STORAGE_KEY=@GoMarketplace                                │
//! │     GOMARKET_DATA_DIR=/var/lib/gomarket                                │
//! │     GOMARKET_MAX_RETRIES=10                                            │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/cart/cart.toml (Linux)                                   │
//! │     ~/Library/Application Support/com.gomarket.cart/cart.toml (macOS)  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     file backend, key "@GoMarketplace", 5 retries                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # cart.toml
//! [storage]
//! backend = "sqlite"   # memory | file | sqlite
//! key = "@GoMarketplace"
//! data_dir = "/var/lib/gomarket"
//!
//! [persistence]
//! max_retries = 5      # 0 = keep retrying until superseded or closed
//! initial_backoff_ms = 100
//! max_backoff_secs = 5
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use gomarket_core::DEFAULT_STORAGE_KEY;
use gomarket_store::{Database, DbConfig, FileStore, MemoryStore, SharedStore};

use crate::error::{CartError, CartResult};

/// File name of the SQLite database inside the data directory.
const SQLITE_FILE_NAME: &str = "cart.db";

/// Subdirectory of the data directory used by the file backend.
const FILE_STORE_DIR: &str = "kv";

// =============================================================================
// Storage Backend
// =============================================================================

/// Which `KeyValueStore` implementation backs the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Process memory only. Nothing survives a restart.
    Memory,

    /// One JSON file per key in the data directory.
    #[default]
    File,

    /// SQLite database in the data directory.
    Sqlite,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Memory => write!(f, "memory"),
            StorageBackend::File => write!(f, "file"),
            StorageBackend::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = CartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "mem" => Ok(StorageBackend::Memory),
            "file" | "json" => Ok(StorageBackend::File),
            "sqlite" | "db" => Ok(StorageBackend::Sqlite),
            other => Err(CartError::Config(format!(
                "Unknown storage backend: '{}'. Valid options: memory, file, sqlite",
                other
            ))),
        }
    }
}

// =============================================================================
// Storage Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Key the whole cart is stored under.
    #[serde(default = "default_storage_key")]
    pub key: String,

    /// Directory for the file and sqlite backends.
    /// Falls back to the platform data directory when unset.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.to_string()
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings {
            backend: StorageBackend::default(),
            key: default_storage_key(),
            data_dir: None,
        }
    }
}

// =============================================================================
// Persistence Settings
// =============================================================================

/// Retry behavior of the background writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceSettings {
    /// Retries after the first failed write before giving up on a revision.
    /// Set to 0 to retry until a newer revision arrives or the store closes.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First retry delay (milliseconds).
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Upper bound for the retry delay (seconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

fn default_max_retries() -> u32 {
    5
}
fn default_initial_backoff() -> u64 {
    100
}
fn default_max_backoff() -> u64 {
    5
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        PersistenceSettings {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

impl PersistenceSettings {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

// =============================================================================
// Main Cart Configuration
// =============================================================================

/// Complete cart configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CartConfig {
    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub persistence: PersistenceSettings,
}

impl CartConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (cart.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> CartResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading cart config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load cart config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> CartResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| CartError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CartError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| CartError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Cart config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> CartResult<()> {
        if self.storage.key.trim().is_empty() {
            return Err(CartError::Config("storage key must not be empty".into()));
        }

        if self.persistence.initial_backoff_ms == 0 {
            return Err(CartError::Config(
                "initial_backoff_ms must be greater than 0".into(),
            ));
        }

        if self.persistence.max_backoff() < self.persistence.initial_backoff() {
            return Err(CartError::Config(format!(
                "max_backoff_secs ({}s) is shorter than initial_backoff_ms ({}ms)",
                self.persistence.max_backoff_secs, self.persistence.initial_backoff_ms
            )));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(backend) = lookup("GOMARKET_STORAGE_BACKEND") {
            match backend.parse() {
                Ok(parsed) => {
                    debug!(backend = %backend, "Overriding storage backend from environment");
                    self.storage.backend = parsed;
                }
                Err(_) => warn!(backend = %backend, "Unknown storage backend in environment"),
            }
        }

        if let Some(key) = lookup("GOMARKET_STORAGE_KEY") {
            debug!(key = %key, "Overriding storage key from environment");
            self.storage.key = key;
        }

        if let Some(dir) = lookup("GOMARKET_DATA_DIR") {
            self.storage.data_dir = Some(PathBuf::from(dir));
        }

        if let Some(retries) = lookup("GOMARKET_MAX_RETRIES") {
            if let Ok(n) = retries.parse::<u32>() {
                self.persistence.max_retries = n;
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "gomarket", "cart")
            .map(|dirs| dirs.config_dir().join("cart.toml"))
    }

    // =========================================================================
    // Storage
    // =========================================================================

    /// Directory the file and sqlite backends write into.
    pub fn data_dir(&self) -> CartResult<PathBuf> {
        if let Some(dir) = &self.storage.data_dir {
            return Ok(dir.clone());
        }

        directories::ProjectDirs::from("com", "gomarket", "cart")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| CartError::Config("No data directory available; set storage.data_dir".into()))
    }

    pub fn storage_key(&self) -> &str {
        &self.storage.key
    }

    /// Opens the configured backend.
    pub async fn open_storage(&self) -> CartResult<SharedStore> {
        let store: SharedStore = match self.storage.backend {
            StorageBackend::Memory => Arc::new(MemoryStore::new()),
            StorageBackend::File => {
                let dir = self.data_dir()?.join(FILE_STORE_DIR);
                Arc::new(FileStore::open(dir)?)
            }
            StorageBackend::Sqlite => {
                let dir = self.data_dir()?;
                std::fs::create_dir_all(&dir).map_err(|e| {
                    CartError::Config(format!("cannot create {}: {}", dir.display(), e))
                })?;
                Arc::new(Database::new(DbConfig::new(dir.join(SQLITE_FILE_NAME))).await?)
            }
        };

        info!(backend = store.backend_name(), key = %self.storage.key, "Storage opened");
        Ok(store)
    }
}
