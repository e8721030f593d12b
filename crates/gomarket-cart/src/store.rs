//! # Cart Store
//!
//! The owning scope of one cart: in-memory state, revision counter, the
//! persisted record it mirrors and the handles UI code works through.
//!
//! ## Ownership
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  CartStore ──owns──► Arc<Inner> ◄──weak── CartHandle (any number)      │
//! │      │                  │                                               │
//! │      │                  ├── Mutex<CartShared>  cart + revisions         │
//! │      │                  ├── snapshot_tx        → CartSubscription       │
//! │      │                  ├── pending_tx         → PersistenceWriter      │
//! │      │                  └── status_rx          ← PersistenceWriter      │
//! │      │                                                                  │
//! │      └──owns──► WriterHandle (background task)                         │
//! │                                                                         │
//! │  close() or drop ──► handles fail with CartError::Usage                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Mutation Path
//! ```text
//! handle.add_to_cart(p)
//!   └─► lock ─► CartState::add ─► changed? ─no─► done (no write)
//!                                    │yes
//!                                    ▼
//!         revision += 1, encode, pending_tx.send_replace, snapshot_tx.send_replace
//!   └─► unlock ─► listener.on_change(snapshot)
//! ```
//!
//! The payload handed to the writer is encoded from the state it was
//! published with, under the same lock, so the newest queued write always
//! matches the newest in-memory cart.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use gomarket_core::{CartChange, CartState, CartTotals, LineItem, ProductDescriptor};
use gomarket_store::SharedStore;

use crate::config::CartConfig;
use crate::error::{CartError, CartResult};
use crate::events::{CartEventListener, CartSnapshot, CartSubscription, NoOpListener};
use crate::writer::{PendingWrite, PersistStatus, PersistenceWriter, RetryPolicy, WriterHandle};

// =============================================================================
// Load Outcome
// =============================================================================

/// What `CartStore::load` found in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A stored cart with `items` lines became the current cart.
    Restored { items: usize },

    /// Nothing stored under the key.
    Empty,

    /// The stored value could not be decoded. Starting empty.
    Malformed,

    /// Storage could not be read. Starting empty.
    Unavailable,

    /// The in-memory cart was already initialized (by an earlier load or a
    /// mutation), so the stored record was not applied.
    Superseded,
}

// =============================================================================
// Shared State
// =============================================================================

/// Everything guarded by the state lock.
#[derive(Debug, Default)]
struct CartShared {
    cart: CartState,
    revision: u64,

    /// Newest revision handed to the writer.
    queued_revision: u64,

    /// A mutation has happened since the store was created.
    mutated: bool,

    load_started: bool,
}

struct Inner {
    key: String,
    store: SharedStore,
    state: Mutex<CartShared>,
    snapshot_tx: watch::Sender<CartSnapshot>,
    pending_tx: watch::Sender<Option<PendingWrite>>,
    status_rx: watch::Receiver<PersistStatus>,
    listener: Arc<dyn CartEventListener>,
    closed: AtomicBool,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, CartShared> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn snapshot(&self) -> CartSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    fn subscribe(&self) -> CartSubscription {
        CartSubscription::new(self.snapshot_tx.subscribe())
    }

    fn persist_status(&self) -> PersistStatus {
        self.status_rx.borrow().clone()
    }

    /// Runs one mutation and, if it changed the cart, publishes the new
    /// revision to subscribers and the writer.
    fn apply(&self, operation: &'static str, mutate: impl FnOnce(&mut CartState) -> CartChange) {
        let snapshot = {
            let mut shared = self.lock();
            let change = mutate(&mut shared.cart);

            if !change.is_changed() {
                debug!(operation, revision = shared.revision, "Cart unchanged");
                return;
            }

            shared.revision += 1;
            shared.mutated = true;
            let revision = shared.revision;

            match shared.cart.to_json() {
                Ok(payload) => {
                    shared.queued_revision = revision;
                    self.pending_tx.send_replace(Some(PendingWrite {
                        revision,
                        payload: payload.into(),
                    }));
                }
                Err(e) => error!(revision, error = %e, "Failed to encode cart, write skipped"),
            }

            let snapshot = CartSnapshot::new(revision, shared.cart.items());
            self.snapshot_tx.send_replace(snapshot.clone());

            debug!(operation, revision, ?change, lines = shared.cart.len(), "Cart updated");
            snapshot
        };

        self.listener.on_change(&snapshot);
    }

    /// Waits until the writer is done with every revision queued so far.
    async fn flush(&self) {
        let target = self.lock().queued_revision;
        let mut status = self.status_rx.clone();

        let settled = status.wait_for(|s| s.is_settled(target)).await.is_ok();
        if !settled {
            debug!(target, "Writer stopped before the flush target settled");
        }
    }

    /// Resolves a load that found nothing usable.
    fn finish_empty_load(&self, outcome: LoadOutcome) -> LoadOutcome {
        if self.lock().mutated {
            LoadOutcome::Superseded
        } else {
            outcome
        }
    }

    fn restore(&self, cart: CartState) -> LoadOutcome {
        let snapshot = {
            let mut shared = self.lock();
            if shared.mutated {
                info!(key = %self.key, "Cart changed while loading, keeping in-memory cart");
                return LoadOutcome::Superseded;
            }

            shared.cart = cart;
            shared.revision += 1;

            let snapshot = CartSnapshot::new(shared.revision, shared.cart.items());
            self.snapshot_tx.send_replace(snapshot.clone());
            snapshot
        };

        info!(key = %self.key, lines = snapshot.items.len(), "Cart restored from storage");
        self.listener.on_change(&snapshot);
        LoadOutcome::Restored {
            items: snapshot.items.len(),
        }
    }
}

// =============================================================================
// Cart Store
// =============================================================================

/// Owner of one cart and its persistence.
///
/// Must be created inside a tokio runtime; it spawns the writer task.
///
/// ## Example
/// ```rust,ignore
/// let store = CartStore::new(Arc::new(MemoryStore::new()));
/// store.load().await;
///
/// let cart = store.handle();
/// cart.add_to_cart(ProductDescriptor::new("a", "T-Shirt", "img", 10.0)?)?;
/// assert_eq!(cart.products()?.len(), 1);
///
/// store.close().await;
/// assert!(cart.products().is_err());
/// ```
pub struct CartStore {
    inner: Arc<Inner>,
    writer: WriterHandle,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("key", &self.inner.key)
            .field("backend", &self.inner.store.backend_name())
            .field("revision", &self.revision())
            .finish()
    }
}

impl CartStore {
    /// Creates a store over `store` with the default key and retry policy.
    pub fn new(store: SharedStore) -> Self {
        Self::builder(store).build()
    }

    pub fn builder(store: SharedStore) -> CartStoreBuilder {
        CartStoreBuilder::new(store)
    }

    /// Creates a store over `store` using the key and retry settings from
    /// `config`.
    pub fn from_config(config: &CartConfig, store: SharedStore) -> Self {
        Self::builder(store)
            .with_key(config.storage_key())
            .with_retry_policy(RetryPolicy::from(&config.persistence))
            .build()
    }

    /// Opens the configured backend, builds the store and loads the cart.
    pub async fn open(config: &CartConfig) -> CartResult<Self> {
        let backend = config.open_storage().await?;
        let store = Self::from_config(config, backend);
        let outcome = store.load().await;
        debug!(?outcome, "Cart store opened");
        Ok(store)
    }

    /// Returns a new handle to this cart.
    pub fn handle(&self) -> CartHandle {
        CartHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Reads the stored cart and makes it current.
    ///
    /// Never fails: unreadable or malformed storage leaves an empty cart and
    /// a `warn!`. Only the first call does anything, and a cart that was
    /// mutated before (or during) the read keeps its in-memory contents.
    pub async fn load(&self) -> LoadOutcome {
        let inner = &self.inner;

        {
            let mut shared = inner.lock();
            let already_initialized = shared.load_started || shared.mutated;
            shared.load_started = true;

            if already_initialized {
                debug!(key = %inner.key, "Cart already initialized, stored record ignored");
                return LoadOutcome::Superseded;
            }
        }

        match inner.store.get(&inner.key).await {
            Ok(Some(payload)) => match CartState::from_json(&payload) {
                Ok(cart) => inner.restore(cart),
                Err(e) => {
                    warn!(key = %inner.key, error = %e, "Stored cart is malformed, starting empty");
                    inner.finish_empty_load(LoadOutcome::Malformed)
                }
            },
            Ok(None) => {
                debug!(key = %inner.key, "No stored cart");
                inner.finish_empty_load(LoadOutcome::Empty)
            }
            Err(e) => {
                warn!(
                    key = %inner.key,
                    backend = inner.store.backend_name(),
                    error = %e,
                    "Could not read stored cart, starting empty"
                );
                inner.finish_empty_load(LoadOutcome::Unavailable)
            }
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn products(&self) -> Arc<[LineItem]> {
        self.inner.snapshot().items
    }

    pub fn snapshot(&self) -> CartSnapshot {
        self.inner.snapshot()
    }

    pub fn totals(&self) -> CartTotals {
        self.inner.snapshot().totals()
    }

    /// Current revision. 0 until the first change.
    pub fn revision(&self) -> u64 {
        self.inner.lock().revision
    }

    pub fn subscribe(&self) -> CartSubscription {
        self.inner.subscribe()
    }

    pub fn persist_status(&self) -> PersistStatus {
        self.inner.persist_status()
    }

    pub fn storage_key(&self) -> &str {
        &self.inner.key
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Waits until every change made so far has been written (or the writer
    /// gave up on it; see `persist_status`).
    pub async fn flush(&self) {
        self.inner.flush().await;
    }

    /// Stops accepting handle calls, writes whatever is still pending and
    /// stops the writer.
    pub async fn close(self) {
        info!(key = %self.inner.key, revision = self.revision(), "Closing cart store");
        self.inner.closed.store(true, Ordering::SeqCst);
        self.writer.shutdown().await;

        let status = self.inner.persist_status();
        if let Some(err) = &status.last_error {
            warn!(
                persisted_revision = status.persisted_revision,
                error = %err,
                "Cart store closed with an unpersisted revision"
            );
        }
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for `CartStore`.
pub struct CartStoreBuilder {
    store: SharedStore,
    key: String,
    policy: RetryPolicy,
    listener: Arc<dyn CartEventListener>,
}

impl CartStoreBuilder {
    pub fn new(store: SharedStore) -> Self {
        CartStoreBuilder {
            store,
            key: gomarket_core::DEFAULT_STORAGE_KEY.to_string(),
            policy: RetryPolicy::default(),
            listener: Arc::new(NoOpListener),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn CartEventListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Builds the store and spawns its writer.
    pub fn build(self) -> CartStore {
        let (snapshot_tx, _) = watch::channel(CartSnapshot::empty());
        let (pending_tx, pending_rx) = watch::channel(None);
        let (status_tx, status_rx) = watch::channel(PersistStatus::default());

        let writer = PersistenceWriter::spawn(
            Arc::clone(&self.store),
            self.key.clone(),
            self.policy,
            pending_rx,
            status_tx,
            Arc::clone(&self.listener),
        );

        let inner = Arc::new(Inner {
            key: self.key,
            store: self.store,
            state: Mutex::new(CartShared::default()),
            snapshot_tx,
            pending_tx,
            status_rx,
            listener: self.listener,
            closed: AtomicBool::new(false),
        });

        CartStore { inner, writer }
    }
}

// =============================================================================
// Handle
// =============================================================================

/// A consumer's reference to a live cart.
///
/// Cheap to clone. Every method fails with `CartError::Usage` once the
/// store has been closed or dropped.
#[derive(Clone)]
pub struct CartHandle {
    inner: Weak<Inner>,
}

impl std::fmt::Debug for CartHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartHandle")
            .field("active", &self.is_active())
            .finish()
    }
}

impl CartHandle {
    fn inner(&self) -> CartResult<Arc<Inner>> {
        match self.inner.upgrade() {
            Some(inner) if !inner.is_closed() => Ok(inner),
            _ => Err(CartError::inactive_store()),
        }
    }

    /// True while the store behind this handle is open.
    pub fn is_active(&self) -> bool {
        self.inner().is_ok()
    }

    /// Current line items in first-add order.
    pub fn products(&self) -> CartResult<Arc<[LineItem]>> {
        Ok(self.inner()?.snapshot().items)
    }

    pub fn snapshot(&self) -> CartResult<CartSnapshot> {
        Ok(self.inner()?.snapshot())
    }

    /// Adds one unit of `product`, appending a new line if it isn't in the
    /// cart yet.
    pub fn add_to_cart(&self, product: ProductDescriptor) -> CartResult<()> {
        let inner = self.inner()?;
        inner.apply("add_to_cart", |cart| cart.add(&product));
        Ok(())
    }

    /// Adds one unit to the line with `id`. Unknown ids are ignored.
    pub fn increment(&self, id: &str) -> CartResult<()> {
        let inner = self.inner()?;
        inner.apply("increment", |cart| cart.increment(id));
        Ok(())
    }

    /// Removes one unit from the line with `id`, dropping the line at zero.
    /// Unknown ids are ignored.
    pub fn decrement(&self, id: &str) -> CartResult<()> {
        let inner = self.inner()?;
        inner.apply("decrement", |cart| cart.decrement(id));
        Ok(())
    }

    pub fn totals(&self) -> CartResult<CartTotals> {
        Ok(self.inner()?.snapshot().totals())
    }

    pub fn subscribe(&self) -> CartResult<CartSubscription> {
        Ok(self.inner()?.subscribe())
    }

    pub fn persist_status(&self) -> CartResult<PersistStatus> {
        Ok(self.inner()?.persist_status())
    }

    /// See `CartStore::flush`.
    pub async fn flush(&self) -> CartResult<()> {
        let inner = self.inner()?;
        inner.flush().await;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gomarket_store::{Database, DbConfig, FileStore, KeyValueStore, MemoryStore, StoreResult};
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio::sync::Notify;

    const KEY: &str = "@GoMarketplace";

    fn product(id: &str, price: f64) -> ProductDescriptor {
        ProductDescriptor::new(id, format!("Product {}", id), format!("https://img/{}.png", id), price)
            .unwrap()
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
        }
    }

    fn memory_cart() -> (CartStore, Arc<MemoryStore>) {
        let memory = Arc::new(MemoryStore::new());
        let store = CartStore::builder(memory.clone())
            .with_retry_policy(fast_policy(3))
            .build();
        (store, memory)
    }

    fn ids(items: &[LineItem]) -> Vec<(String, u32)> {
        items.iter().map(|i| (i.id.clone(), i.quantity)).collect()
    }

    fn stored_ids(memory: &MemoryStore) -> Vec<(String, u32)> {
        let payload = memory.peek(KEY).expect("cart was persisted");
        ids(CartState::from_json(&payload).unwrap().items())
    }

    #[derive(Default)]
    struct RecordingListener {
        changes: Mutex<Vec<u64>>,
        persisted: Mutex<Vec<u64>>,
        errors: Mutex<Vec<(u64, bool)>>,
    }

    impl CartEventListener for RecordingListener {
        fn on_change(&self, snapshot: &CartSnapshot) {
            self.changes.lock().unwrap().push(snapshot.revision);
        }
        fn on_persisted(&self, revision: u64) {
            self.persisted.lock().unwrap().push(revision);
        }
        fn on_persist_error(&self, revision: u64, _error: &str, will_retry: bool) {
            self.errors.lock().unwrap().push((revision, will_retry));
        }
    }

    /// Store whose reads block until the gate opens.
    #[derive(Debug, Default)]
    struct GatedStore {
        inner: MemoryStore,
        gate: Notify,
    }

    #[async_trait]
    impl KeyValueStore for GatedStore {
        fn backend_name(&self) -> &'static str {
            "gated"
        }
        async fn get(&self, key: &str) -> StoreResult<Option<String>> {
            self.gate.notified().await;
            self.inner.get(key).await
        }
        async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
            self.inner.set(key, value).await
        }
        async fn remove(&self, key: &str) -> StoreResult<()> {
            self.inner.remove(key).await
        }
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_add_appends_then_increments_in_place() {
        let (store, memory) = memory_cart();
        store.load().await;
        let cart = store.handle();

        cart.add_to_cart(product("a", 10.0)).unwrap();
        cart.add_to_cart(product("b", 5.0)).unwrap();
        cart.add_to_cart(product("a", 10.0)).unwrap();

        let expected = vec![("a".to_string(), 2), ("b".to_string(), 1)];
        assert_eq!(ids(&cart.products().unwrap()), expected);
        assert_eq!(store.revision(), 3);

        store.flush().await;
        assert_eq!(stored_ids(&memory), expected);
        assert_eq!(store.persist_status().persisted_revision, 3);
        assert!(store.persist_status().last_persisted_at.is_some());
    }

    #[tokio::test]
    async fn test_decrement_removes_line_at_one() {
        let (store, memory) = memory_cart();
        let cart = store.handle();

        cart.add_to_cart(product("a", 1.0)).unwrap();
        cart.add_to_cart(product("b", 1.0)).unwrap();
        cart.add_to_cart(product("c", 1.0)).unwrap();
        cart.increment("c").unwrap();

        cart.decrement("b").unwrap();
        cart.decrement("c").unwrap();

        let expected = vec![("a".to_string(), 1), ("c".to_string(), 1)];
        assert_eq!(ids(&cart.products().unwrap()), expected);

        store.flush().await;
        assert_eq!(stored_ids(&memory), expected);
    }

    #[tokio::test]
    async fn test_unknown_id_is_a_no_op() {
        let (store, memory) = memory_cart();
        let cart = store.handle();

        cart.add_to_cart(product("a", 1.0)).unwrap();
        store.flush().await;
        let writes = memory.write_count();

        cart.increment("zzz").unwrap();
        cart.decrement("zzz").unwrap();
        store.flush().await;

        // The cart is never cleared by a missing id.
        assert_eq!(ids(&cart.products().unwrap()), vec![("a".to_string(), 1)]);
        assert_eq!(store.revision(), 1);
        assert_eq!(memory.write_count(), writes);
    }

    #[tokio::test]
    async fn test_totals() {
        let (store, _memory) = memory_cart();
        let cart = store.handle();

        cart.add_to_cart(product("a", 19.99)).unwrap();
        cart.add_to_cart(product("a", 19.99)).unwrap();
        cart.add_to_cart(product("b", 0.5)).unwrap();

        let totals = cart.totals().unwrap();
        assert_eq!(totals.item_count, 2);
        assert_eq!(totals.total_quantity, 3);
        assert_eq!(totals.subtotal.cents(), 4048);
        assert_eq!(store.totals(), totals);
    }

    #[tokio::test]
    async fn test_burst_persists_final_state() {
        let (store, memory) = memory_cart();
        let cart = store.handle();

        for round in 0..50u32 {
            let id = format!("p{}", round % 7);
            cart.add_to_cart(product(&id, 2.0)).unwrap();
            if round % 3 == 0 {
                cart.decrement(&id).unwrap();
            }
        }

        store.flush().await;

        assert_eq!(stored_ids(&memory), ids(&store.products()));
        assert!(memory.write_count() <= store.revision());
        assert_eq!(store.persist_status().persisted_revision, store.revision());
    }

    // -------------------------------------------------------------------------
    // Load
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_load_restores_in_order() {
        let payload = r#"[
            {"id":"b","title":"B","imageUrl":"u","price":2,"quantity":3},
            {"id":"a","title":"A","imageUrl":"u","price":1.5,"quantity":1}
        ]"#;
        let store = CartStore::new(Arc::new(MemoryStore::with_entry(KEY, payload)));

        assert!(store.products().is_empty());
        assert_eq!(store.load().await, LoadOutcome::Restored { items: 2 });
        assert_eq!(
            ids(&store.products()),
            vec![("b".to_string(), 3), ("a".to_string(), 1)]
        );
        assert_eq!(store.revision(), 1);

        // Restoring is not a write.
        store.flush().await;
        assert_eq!(store.persist_status().persisted_revision, 0);
    }

    #[tokio::test]
    async fn test_load_accepts_snake_case_image_url() {
        let payload = r#"[{"id":"a","title":"A","image_url":"https://img/a.png","price":3,"quantity":2}]"#;
        let memory = Arc::new(MemoryStore::with_entry(KEY, payload));
        let store = CartStore::new(memory.clone());

        assert_eq!(store.load().await, LoadOutcome::Restored { items: 1 });
        assert_eq!(store.products()[0].image_url, "https://img/a.png");

        store.handle().increment("a").unwrap();
        store.flush().await;
        assert!(memory.peek(KEY).unwrap().contains("\"imageUrl\""));
    }

    #[tokio::test]
    async fn test_load_keeps_whitespace_id() {
        let payload = r#"[{"id":"a","title":"A","imageUrl":"","price":1,"quantity":1},
                          {"id":" ","title":"B","imageUrl":"","price":2,"quantity":1}]"#;
        let store = CartStore::new(Arc::new(MemoryStore::with_entry(KEY, payload)));

        assert_eq!(store.load().await, LoadOutcome::Restored { items: 2 });
        assert_eq!(ids(&store.products()), vec![("a".to_string(), 1), (" ".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_load_fails_soft() {
        let store = CartStore::new(Arc::new(MemoryStore::new()));
        assert_eq!(store.load().await, LoadOutcome::Empty);
        assert!(store.products().is_empty());

        let store = CartStore::new(Arc::new(MemoryStore::with_entry(KEY, "{not json")));
        assert_eq!(store.load().await, LoadOutcome::Malformed);
        assert!(store.products().is_empty());

        let duplicate = r#"[{"id":"a","title":"A","imageUrl":"","price":1,"quantity":1},
                           {"id":"a","title":"A","imageUrl":"","price":1,"quantity":2}]"#;
        let store = CartStore::new(Arc::new(MemoryStore::with_entry(KEY, duplicate)));
        assert_eq!(store.load().await, LoadOutcome::Malformed);

        let memory = Arc::new(MemoryStore::with_entry(KEY, "[]"));
        memory.fail_next_reads(1);
        let store = CartStore::new(memory);
        assert_eq!(store.load().await, LoadOutcome::Unavailable);
        assert!(store.products().is_empty());
    }

    #[tokio::test]
    async fn test_mutation_before_load_wins() {
        let stored = r#"[{"id":"old","title":"Old","imageUrl":"","price":1,"quantity":4}]"#;
        let memory = Arc::new(MemoryStore::with_entry(KEY, stored));
        let store = CartStore::new(memory.clone());

        store.handle().add_to_cart(product("new", 1.0)).unwrap();
        assert_eq!(store.load().await, LoadOutcome::Superseded);

        store.flush().await;
        assert_eq!(stored_ids(&memory), vec![("new".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_mutation_during_load_wins() {
        let stored = r#"[{"id":"old","title":"Old","imageUrl":"","price":1,"quantity":4}]"#;
        let gated = Arc::new(GatedStore {
            inner: MemoryStore::with_entry(KEY, stored),
            gate: Notify::new(),
        });
        let store = CartStore::new(gated.clone());
        let cart = store.handle();

        let (outcome, _) = tokio::join!(store.load(), async {
            cart.add_to_cart(product("new", 1.0)).unwrap();
            gated.gate.notify_one();
        });

        assert_eq!(outcome, LoadOutcome::Superseded);
        assert_eq!(ids(&store.products()), vec![("new".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_second_load_is_ignored() {
        let store = CartStore::new(Arc::new(MemoryStore::new()));
        assert_eq!(store.load().await, LoadOutcome::Empty);
        assert_eq!(store.load().await, LoadOutcome::Superseded);
    }

    // -------------------------------------------------------------------------
    // Persistence Failures
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_failed_writes_are_retried() {
        let memory = Arc::new(MemoryStore::new());
        let listener = Arc::new(RecordingListener::default());
        let store = CartStore::builder(memory.clone())
            .with_retry_policy(fast_policy(3))
            .with_listener(listener.clone())
            .build();

        memory.fail_next_writes(2);
        store.handle().add_to_cart(product("a", 1.0)).unwrap();
        store.flush().await;

        assert_eq!(stored_ids(&memory), vec![("a".to_string(), 1)]);
        let status = store.persist_status();
        assert_eq!(status.persisted_revision, 1);
        assert!(status.last_error.is_none());
        assert_eq!(*listener.errors.lock().unwrap(), vec![(1, true), (1, true)]);
        assert_eq!(*listener.persisted.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_first_retry_honors_initial_backoff() {
        let (store, memory) = memory_cart();

        memory.fail_next_writes(1);
        let started = std::time::Instant::now();
        store.handle().add_to_cart(product("a", 1.0)).unwrap();
        store.flush().await;
        let elapsed = started.elapsed();

        assert_eq!(stored_ids(&memory), vec![("a".to_string(), 1)]);
        assert!(elapsed < Duration::from_millis(200), "first retry took {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_exhausted_retries_are_recorded() {
        let memory = Arc::new(MemoryStore::new());
        let store = CartStore::builder(memory.clone())
            .with_retry_policy(fast_policy(1))
            .build();
        let cart = store.handle();

        memory.fail_next_writes(2);
        cart.add_to_cart(product("a", 1.0)).unwrap();
        cart.flush().await.unwrap();

        let status = store.persist_status();
        assert_eq!(status.persisted_revision, 0);
        assert_eq!(status.settled_revision, 1);
        assert!(status.last_error.unwrap().contains("refused"));
        assert_eq!(memory.peek(KEY), None);

        // The next change carries the whole cart and clears the error.
        cart.add_to_cart(product("b", 1.0)).unwrap();
        cart.flush().await.unwrap();

        let status = store.persist_status();
        assert_eq!(status.persisted_revision, 2);
        assert!(status.last_error.is_none());
        assert_eq!(
            stored_ids(&memory),
            vec![("a".to_string(), 1), ("b".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn test_newer_revision_supersedes_failing_write() {
        let memory = Arc::new(MemoryStore::new());
        let store = CartStore::builder(memory.clone())
            .with_retry_policy(RetryPolicy {
                max_retries: 0,
                initial_backoff: Duration::from_millis(20),
                max_backoff: Duration::from_millis(50),
            })
            .build();
        let cart = store.handle();

        memory.fail_next_writes(1);
        cart.add_to_cart(product("a", 1.0)).unwrap();
        tokio::task::yield_now().await;
        cart.add_to_cart(product("b", 1.0)).unwrap();
        store.flush().await;

        assert_eq!(store.persist_status().persisted_revision, 2);
        assert_eq!(
            stored_ids(&memory),
            vec![("a".to_string(), 1), ("b".to_string(), 1)]
        );
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_close_flushes_and_invalidates_handles() {
        let (store, memory) = memory_cart();
        let cart = store.handle();
        let other = cart.clone();

        cart.add_to_cart(product("a", 1.0)).unwrap();
        store.close().await;

        assert_eq!(stored_ids(&memory), vec![("a".to_string(), 1)]);
        assert!(!cart.is_active());

        for err in [
            cart.products().unwrap_err(),
            other.add_to_cart(product("b", 1.0)).unwrap_err(),
            other.increment("a").unwrap_err(),
            other.decrement("a").unwrap_err(),
            other.flush().await.unwrap_err(),
        ] {
            assert!(err.is_usage_error());
            assert!(err.to_string().contains("outside an active cart store"));
        }
    }

    #[tokio::test]
    async fn test_dropped_store_invalidates_handles() {
        let (store, _memory) = memory_cart();
        let cart = store.handle();
        drop(store);

        assert!(matches!(cart.products(), Err(CartError::Usage(_))));
    }

    #[tokio::test]
    async fn test_unlimited_retries_do_not_block_close() {
        let memory = Arc::new(MemoryStore::new());
        let store = CartStore::builder(memory.clone())
            .with_retry_policy(fast_policy(0))
            .build();

        memory.fail_next_writes(u32::MAX);
        store.handle().add_to_cart(product("a", 1.0)).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        store.close().await;
        assert_eq!(memory.peek(KEY), None);
    }

    // -------------------------------------------------------------------------
    // Observation
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_subscription_follows_changes() {
        let (store, _memory) = memory_cart();
        let cart = store.handle();
        let mut sub = cart.subscribe().unwrap();
        assert_eq!(sub.current().revision, 0);

        cart.add_to_cart(product("a", 1.0)).unwrap();
        cart.add_to_cart(product("a", 1.0)).unwrap();

        let latest = sub.changed().await.unwrap();
        assert_eq!(latest.revision, 2);
        assert_eq!(ids(&latest.items), vec![("a".to_string(), 2)]);

        store.close().await;
        assert!(sub.changed().await.is_none());
    }

    #[tokio::test]
    async fn test_listener_sees_changes_only() {
        let listener = Arc::new(RecordingListener::default());
        let store = CartStore::builder(Arc::new(MemoryStore::new()))
            .with_listener(listener.clone())
            .build();
        let cart = store.handle();

        cart.add_to_cart(product("a", 1.0)).unwrap();
        cart.increment("missing").unwrap();
        cart.decrement("a").unwrap();
        store.flush().await;

        assert_eq!(*listener.changes.lock().unwrap(), vec![1, 2]);
        assert_eq!(listener.persisted.lock().unwrap().last(), Some(&2));
    }

    // -------------------------------------------------------------------------
    // Durable Backends
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_file_backend_survives_restart() {
        let dir = tempdir().unwrap();

        let store = CartStore::new(Arc::new(FileStore::open(dir.path()).unwrap()));
        store.load().await;
        let cart = store.handle();
        cart.add_to_cart(product("x", 3.0)).unwrap();
        cart.add_to_cart(product("y", 4.0)).unwrap();
        cart.add_to_cart(product("x", 3.0)).unwrap();
        store.close().await;

        let reopened = CartStore::new(Arc::new(FileStore::open(dir.path()).unwrap()));
        assert_eq!(reopened.load().await, LoadOutcome::Restored { items: 2 });
        assert_eq!(
            ids(&reopened.products()),
            vec![("x".to_string(), 2), ("y".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn test_sqlite_backend_survives_restart() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let store = CartStore::new(Arc::new(db.clone()));
        store.handle().add_to_cart(product("x", 3.0)).unwrap();
        store.close().await;

        let reopened = CartStore::new(Arc::new(db));
        assert_eq!(reopened.load().await, LoadOutcome::Restored { items: 1 });
    }

    #[tokio::test]
    async fn test_custom_key() {
        let memory = Arc::new(MemoryStore::new());
        let store = CartStore::builder(memory.clone()).with_key("cart:v2").build();
        assert_eq!(store.storage_key(), "cart:v2");

        store.handle().add_to_cart(product("a", 1.0)).unwrap();
        store.flush().await;

        assert!(memory.peek("cart:v2").is_some());
        assert!(memory.peek(KEY).is_none());
    }
}
