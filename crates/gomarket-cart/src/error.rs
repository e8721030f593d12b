//! # Cart Error Types
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          CartError                                      │
//! │                                                                         │
//! │  Usage ──────────── handle used after its store closed or dropped      │
//! │                     (the only error a cart operation returns)          │
//! │                                                                         │
//! │  Config ─┬───────── invalid values (validate())                        │
//! │          ├── ConfigLoadFailed (read / parse)                           │
//! │          └── ConfigSaveFailed (serialize / write)                      │
//! │                                                                         │
//! │  Storage ────────── opening a backend failed (StoreError)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Write failures during persistence never appear here: the writer retries,
//! logs, and records them in `PersistStatus`.

use gomarket_store::StoreError;
use thiserror::Error;

/// Result type alias for cart operations.
pub type CartResult<T> = Result<T, CartError>;

/// Message carried by every `CartError::Usage` raised by a stale handle.
pub(crate) const INACTIVE_STORE: &str = "cart handle used outside an active cart store";

#[derive(Debug, Error)]
pub enum CartError {
    // =========================================================================
    // Usage Errors
    // =========================================================================
    /// A handle was used while no live store backs it.
    #[error("Usage error: {0}")]
    Usage(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid cart configuration.
    #[error("Invalid cart configuration: {0}")]
    Config(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// The storage backend could not be opened.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl CartError {
    pub(crate) fn inactive_store() -> Self {
        CartError::Usage(INACTIVE_STORE.to_string())
    }

    /// Returns true for misuse of a cart handle.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, CartError::Usage(_))
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            CartError::Config(_) | CartError::ConfigLoadFailed(_) | CartError::ConfigSaveFailed(_)
        )
    }
}

impl From<std::io::Error> for CartError {
    fn from(err: std::io::Error) -> Self {
        CartError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for CartError {
    fn from(err: toml::de::Error) -> Self {
        CartError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for CartError {
    fn from(err: toml::ser::Error) -> Self {
        CartError::ConfigSaveFailed(err.to_string())
    }
}
