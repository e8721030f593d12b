//! # Cart State
//!
//! The ordered line-item collection and its three mutations.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart State Operations                                │
//! │                                                                         │
//! │  UI Action            Operation            Cart State Change            │
//! │  ─────────            ─────────            ─────────────────            │
//! │                                                                         │
//! │  "Add to cart" ─────► add(product) ──────► new id:  items.push(qty 1)  │
//! │                                            known id: qty += 1          │
//! │                                                                         │
//! │  "+" button ────────► increment(id) ─────► qty += 1 (missing: no-op)   │
//! │                                                                         │
//! │  "−" button ────────► decrement(id) ─────► qty > 1:  qty -= 1          │
//! │                                            qty == 1: remove line       │
//! │                                            missing:  no-op             │
//! │                                                                         │
//! │  Cart screen ───────► items() ───────────► (read only)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - At most one line per `id`
//! - Every line has `quantity >= 1`
//! - Lines keep first-add order; no mutation reorders surviving lines

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use ts_rs::TS;

use crate::codec;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{LineItem, ProductDescriptor};

// =============================================================================
// Cart Change
// =============================================================================

/// What a mutation did to the cart.
///
/// Callers use this to decide whether the cart needs persisting and for
/// structured logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartChange {
    /// A new line was appended with quantity 1.
    Added { id: String },

    /// An existing line's quantity went up.
    Incremented { id: String, quantity: u32 },

    /// An existing line's quantity went down but stayed above zero.
    Decremented { id: String, quantity: u32 },

    /// A line at quantity 1 was decremented and removed.
    Removed { id: String },

    /// No line matched the id; nothing changed.
    Unchanged,
}

impl CartChange {
    /// Returns true if the cart contents differ from before the mutation.
    pub fn is_changed(&self) -> bool {
        !matches!(self, CartChange::Unchanged)
    }
}

// =============================================================================
// Cart State
// =============================================================================

/// The shopping cart: an ordered list of line items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartState {
    items: Vec<LineItem>,
}

impl CartState {
    /// Creates an empty cart.
    pub fn new() -> Self {
        CartState { items: Vec::new() }
    }

    /// Builds a cart from previously stored items, checking every invariant.
    ///
    /// ## Errors
    /// `CoreError::InvalidState` on a duplicate id, a zero quantity or an
    /// unusable price. Stored ids are opaque and taken as they are.
    pub fn from_items(items: Vec<LineItem>) -> CoreResult<Self> {
        let mut seen = HashSet::with_capacity(items.len());

        for item in &items {
            if !seen.insert(item.id.as_str()) {
                return Err(CoreError::InvalidState(format!(
                    "duplicate line item id '{}'",
                    item.id
                )));
            }
            if item.quantity == 0 {
                return Err(CoreError::InvalidState(format!(
                    "line item '{}' has quantity 0",
                    item.id
                )));
            }
            if !item.price.is_finite() || item.price < 0.0 {
                return Err(CoreError::InvalidState(format!(
                    "line item '{}' has an invalid price",
                    item.id
                )));
            }
        }

        Ok(CartState { items })
    }

    /// Decodes and validates a stored payload.
    pub fn from_json(payload: &str) -> CoreResult<Self> {
        Self::from_items(codec::decode_items(payload)?)
    }

    /// Encodes the cart for storage.
    pub fn to_json(&self) -> CoreResult<String> {
        codec::encode_items(&self.items)
    }

    /// Line items in cart order.
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Consumes the cart, returning its items.
    pub fn into_items(self) -> Vec<LineItem> {
        self.items
    }

    /// Looks up a line by product id.
    pub fn get(&self, id: &str) -> Option<&LineItem> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Number of distinct lines.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Adds one unit of a product.
    ///
    /// ## Behavior
    /// - Product already in cart: quantity + 1, position unchanged
    /// - Product not in cart: appended at the end with quantity 1
    ///
    /// The stored title, image and price of an existing line are kept even if
    /// the descriptor carries newer values.
    pub fn add(&mut self, product: &ProductDescriptor) -> CartChange {
        if let Some(item) = self.items.iter_mut().find(|i| i.id == product.id()) {
            item.quantity = item.quantity.saturating_add(1);
            return CartChange::Incremented {
                id: item.id.clone(),
                quantity: item.quantity,
            };
        }

        self.items.push(product.clone().into_line_item());
        CartChange::Added {
            id: product.id().to_string(),
        }
    }

    /// Adds one unit to an existing line. Unknown ids are ignored.
    pub fn increment(&mut self, id: &str) -> CartChange {
        match self.items.iter_mut().find(|i| i.id == id) {
            Some(item) => {
                item.quantity = item.quantity.saturating_add(1);
                CartChange::Incremented {
                    id: item.id.clone(),
                    quantity: item.quantity,
                }
            }
            None => CartChange::Unchanged,
        }
    }

    /// Removes one unit from a line, dropping the line when it hits zero.
    /// Unknown ids are ignored.
    pub fn decrement(&mut self, id: &str) -> CartChange {
        let Some(index) = self.items.iter().position(|i| i.id == id) else {
            return CartChange::Unchanged;
        };

        if self.items[index].quantity > 1 {
            let item = &mut self.items[index];
            item.quantity -= 1;
            CartChange::Decremented {
                id: item.id.clone(),
                quantity: item.quantity,
            }
        } else {
            // Vec::remove shifts the tail left, keeping relative order
            let removed = self.items.remove(index);
            CartChange::Removed { id: removed.id }
        }
    }

    // =========================================================================
    // Display Aggregates
    // =========================================================================

    /// Sum of all quantities (the number on the cart badge).
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }

    /// Sum of price × quantity over all lines, in cents.
    pub fn subtotal(&self) -> Money {
        self.items.iter().map(LineItem::line_total).sum()
    }

    pub fn totals(&self) -> CartTotals {
        CartTotals::from(self)
    }
}

// =============================================================================
// Cart Totals
// =============================================================================

/// Display summary of a cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartTotals {
    /// Distinct lines.
    pub item_count: usize,
    /// Units across all lines.
    pub total_quantity: u64,
    pub subtotal: Money,
}

impl From<&CartState> for CartTotals {
    fn from(cart: &CartState) -> Self {
        CartTotals {
            item_count: cart.len(),
            total_quantity: cart.total_quantity(),
            subtotal: cart.subtotal(),
        }
    }
}

impl From<&[LineItem]> for CartTotals {
    fn from(items: &[LineItem]) -> Self {
        CartTotals {
            item_count: items.len(),
            total_quantity: items.iter().map(|i| u64::from(i.quantity)).sum(),
            subtotal: items.iter().map(LineItem::line_total).sum(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
