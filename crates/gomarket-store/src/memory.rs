//! In-memory key-value backend.
//!
//! Used by tests and by hosts that do not want the cart to outlive the
//! process. Writes can be made to fail on demand so retry paths are testable.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::kv::KeyValueStore;

/// `HashMap`-backed store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,

    /// Number of upcoming `set` calls that fail with `StoreError::Injected`.
    failing_writes: AtomicU32,

    /// Same, for `get`.
    failing_reads: AtomicU32,

    /// Successful `set` calls so far.
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `key = value`.
    pub fn with_entry(key: impl Into<String>, value: impl Into<String>) -> Self {
        let store = Self::default();
        store
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
        store
    }

    /// Makes the next `count` writes fail.
    pub fn fail_next_writes(&self, count: u32) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    /// Makes the next `count` reads fail.
    pub fn fail_next_reads(&self, count: u32) {
        self.failing_reads.store(count, Ordering::SeqCst);
    }

    /// Number of writes that reached the map.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Synchronous read, for assertions.
    pub fn peek(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Consumes one injected failure from `counter` if any are pending.
    fn take_injected_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        if Self::take_injected_failure(&self.failing_reads) {
            debug!(key = %key, "Injected read failure");
            return Err(StoreError::Injected(format!("read of '{}' refused", key)));
        }
        Ok(self.peek(key))
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        if Self::take_injected_failure(&self.failing_writes) {
            debug!(key = %key, "Injected write failure");
            return Err(StoreError::Injected(format!("write to '{}' refused", key)));
        }

        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}
