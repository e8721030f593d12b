//! # Cart Events
//!
//! Two ways to observe a cart:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  PULL: CartSubscription (watch channel)                                │
//! │  ───────────────────────────────────────                               │
//! │  • latest-value: a slow reader skips to the newest snapshot            │
//! │  • ends (None) once the store is gone                                  │
//! │                                                                         │
//! │  PUSH: CartEventListener (registered on the store)                     │
//! │  ──────────────────────────────────────────────────                    │
//! │  • on_change ........ after every mutation that changed the cart      │
//! │  • on_persisted ..... a revision reached storage                       │
//! │  • on_persist_error . a write failed (will_retry tells what's next)    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use tokio::sync::watch;

use gomarket_core::{CartTotals, LineItem};

// =============================================================================
// Snapshot
// =============================================================================

/// Read-only view of the cart at one revision.
#[derive(Debug, Clone, PartialEq)]
pub struct CartSnapshot {
    /// Bumped once for every change to the cart contents.
    pub revision: u64,

    /// Line items in first-add order.
    pub items: Arc<[LineItem]>,
}

impl CartSnapshot {
    pub(crate) fn new(revision: u64, items: &[LineItem]) -> Self {
        CartSnapshot {
            revision,
            items: Arc::from(items),
        }
    }

    pub(crate) fn empty() -> Self {
        Self::new(0, &[])
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Display totals for this snapshot.
    pub fn totals(&self) -> CartTotals {
        CartTotals::from(&self.items[..])
    }
}

// =============================================================================
// Subscription
// =============================================================================

/// Stream of cart snapshots.
#[derive(Debug, Clone)]
pub struct CartSubscription {
    rx: watch::Receiver<CartSnapshot>,
}

impl CartSubscription {
    pub(crate) fn new(rx: watch::Receiver<CartSnapshot>) -> Self {
        CartSubscription { rx }
    }

    /// The snapshot as of now.
    pub fn current(&self) -> CartSnapshot {
        self.rx.borrow().clone()
    }

    /// Waits for the next change and returns the newest snapshot.
    ///
    /// Returns `None` once the store has been closed or dropped.
    pub async fn changed(&mut self) -> Option<CartSnapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

// =============================================================================
// Listener
// =============================================================================

/// Push-style observer of cart activity.
///
/// Callbacks run on the thread that caused the event (the mutating caller
/// for `on_change`, the writer task for the others) and must not block.
/// `on_change` runs after the state lock is released, so a listener may
/// read the cart.
pub trait CartEventListener: Send + Sync {
    /// The cart changed.
    fn on_change(&self, snapshot: &CartSnapshot);

    /// `revision` is now the value in storage.
    fn on_persisted(&self, revision: u64);

    /// Writing `revision` failed.
    fn on_persist_error(&self, revision: u64, error: &str, will_retry: bool);
}

/// Listener that ignores everything.
pub struct NoOpListener;

impl CartEventListener for NoOpListener {
    fn on_change(&self, _snapshot: &CartSnapshot) {}
    fn on_persisted(&self, _revision: u64) {}
    fn on_persist_error(&self, _revision: u64, _error: &str, _will_retry: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use gomarket_core::ProductDescriptor;

    fn item(id: &str, price: f64, quantity: u32) -> LineItem {
        let mut item = ProductDescriptor::new(id, id, "", price)
            .unwrap()
            .into_line_item();
        item.quantity = quantity;
        item
    }

    #[test]
    fn test_snapshot_totals() {
        let snapshot = CartSnapshot::new(3, &[item("a", 1.5, 2), item("b", 0.25, 4)]);

        let totals = snapshot.totals();
        assert_eq!(totals.item_count, 2);
        assert_eq!(totals.total_quantity, 6);
        assert_eq!(totals.subtotal.cents(), 400);
        assert!(!snapshot.is_empty());
        assert!(CartSnapshot::empty().is_empty());
    }

    #[tokio::test]
    async fn test_subscription_sees_latest_value() {
        let (tx, rx) = watch::channel(CartSnapshot::empty());
        let mut sub = CartSubscription::new(rx);

        tx.send_replace(CartSnapshot::new(1, &[item("a", 1.0, 1)]));
        tx.send_replace(CartSnapshot::new(2, &[item("a", 1.0, 2)]));

        let next = sub.changed().await.unwrap();
        assert_eq!(next.revision, 2);
        assert_eq!(sub.current().revision, 2);

        drop(tx);
        assert!(sub.changed().await.is_none());
    }
}
