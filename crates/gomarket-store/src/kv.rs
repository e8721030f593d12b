//! The key-value contract every storage backend implements.
//!
//! Mirrors what a mobile async-storage API offers: string keys, string
//! values, "not found" as `None`. Durability is the backend's business.

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

use crate::error::StoreResult;

/// Asynchronous string key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync + Debug {
    /// Short backend name for logs ("memory", "file", "sqlite").
    fn backend_name(&self) -> &'static str;

    /// Reads the value stored under `key`, `None` if there is none.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Deletes `key`. Deleting a missing key is not an error.
    async fn remove(&self, key: &str) -> StoreResult<()>;
}

/// Shared handle to a backend, as held by the cart store.
pub type SharedStore = Arc<dyn KeyValueStore>;
