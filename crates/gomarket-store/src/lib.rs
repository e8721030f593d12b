//! # gomarket-store: Key-Value Storage for GoMarket
//!
//! The cart treats device storage as an external key-value store:
//! `get(key) -> Option<String>` and `set(key, String)`. This crate defines
//! that contract and ships three backends for it.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        GoMarket Storage Flow                            │
//! │                                                                         │
//! │  CartStore persistence writer                                          │
//! │       │  store.set("@GoMarketplace", "[...]")                           │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  gomarket-store (THIS CRATE)                    │   │
//! │  │                                                                 │   │
//! │  │              trait KeyValueStore (kv.rs)                        │   │
//! │  │        ┌──────────────┼──────────────────┐                      │   │
//! │  │        ▼              ▼                  ▼                      │   │
//! │  │  ┌───────────┐  ┌────────────┐  ┌──────────────────────┐       │   │
//! │  │  │MemoryStore│  │ FileStore  │  │ Database (pool.rs)   │       │   │
//! │  │  │ HashMap   │  │ one file   │  │ SqlitePool +         │       │   │
//! │  │  │ (tests)   │  │ per key    │  │ kv_store table       │       │   │
//! │  │  └───────────┘  └────────────┘  └──────────────────────┘       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`kv`] - The `KeyValueStore` trait
//! - [`memory`] - In-memory backend with write fault injection
//! - [`file`] - Directory of JSON files, atomic writes
//! - [`pool`] - SQLite connection pool (`Database`, `DbConfig`)
//! - [`migrations`] - Embedded database migrations
//! - [`repository`] - SQL for the `kv_store` table
//! - [`error`] - Storage error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gomarket_store::{Database, DbConfig, KeyValueStore};
//!
//! let db = Database::new(DbConfig::new("path/to/cart.db")).await?;
//! db.set("@GoMarketplace", "[]").await?;
//! assert_eq!(db.get("@GoMarketplace").await?.as_deref(), Some("[]"));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod file;
pub mod kv;
pub mod memory;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{StoreError, StoreResult};
pub use file::FileStore;
pub use kv::{KeyValueStore, SharedStore};
pub use memory::MemoryStore;
pub use pool::{Database, DbConfig};
pub use repository::kv::KvRepository;
