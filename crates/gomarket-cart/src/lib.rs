//! # gomarket-cart: Cart Store for GoMarket
//!
//! Keeps the shopping cart in memory, hands out handles to UI code and
//! mirrors every change into one key of a local key-value store.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Cart Store Architecture                         │
//! │                                                                         │
//! │   UI code                                                              │
//! │     │ CartHandle::add_to_cart / increment / decrement / products       │
//! │     ▼                                                                   │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 CartStore (store.rs)                             │  │
//! │  │                                                                  │  │
//! │  │  load() once at start ◄── KeyValueStore::get(key)                │  │
//! │  │  CartState (gomarket-core) behind a Mutex, revision counter      │  │
//! │  └──────┬──────────────────────────────┬────────────────────────────┘  │
//! │         │ latest snapshot              │ latest (revision, json)       │
//! │         ▼                              ▼                                │
//! │  ┌────────────────┐           ┌──────────────────────┐                 │
//! │  │CartSubscription│           │ PersistenceWriter    │                 │
//! │  │CartEventListener│          │ (writer.rs)          │                 │
//! │  │ (events.rs)    │           │ backoff retries      │──► set(key, json)│
//! │  └────────────────┘           └──────────────────────┘                 │
//! │                                                                         │
//! │  CartConfig (config.rs): backend, key, retry settings (TOML + env)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`store`] - `CartStore`, `CartHandle`, `LoadOutcome`
//! - [`writer`] - Background persistence writer, `RetryPolicy`, `PersistStatus`
//! - [`events`] - Snapshots, subscriptions, the listener trait
//! - [`config`] - `CartConfig` and backend selection
//! - [`error`] - Cart error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gomarket_cart::{CartConfig, CartStore};
//! use gomarket_core::ProductDescriptor;
//!
//! let config = CartConfig::load_or_default(None);
//! let store = CartStore::open(&config).await?;
//!
//! let cart = store.handle();
//! cart.add_to_cart(ProductDescriptor::new("42", "Mug", "https://img/42.png", 12.5)?)?;
//! println!("{} lines", cart.products()?.len());
//!
//! store.close().await;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod events;
pub mod store;
pub mod writer;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{CartConfig, PersistenceSettings, StorageBackend, StorageSettings};
pub use error::{CartError, CartResult};
pub use events::{CartEventListener, CartSnapshot, CartSubscription, NoOpListener};
pub use store::{CartHandle, CartStore, CartStoreBuilder, LoadOutcome};
pub use writer::{PersistStatus, RetryPolicy};
