//! # Domain Types
//!
//! The two shapes a product takes on its way into the cart.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────────┐            ┌─────────────────────┐            │
//! │  │  ProductDescriptor  │ add_to_cart│      LineItem       │            │
//! │  │  ─────────────────  │ ─────────► │  ─────────────────  │            │
//! │  │  id                 │            │  id        (fixed)  │            │
//! │  │  title              │            │  title     (fixed)  │            │
//! │  │  image_url          │            │  image_url (fixed)  │            │
//! │  │  price              │            │  price     (fixed)  │            │
//! │  └─────────────────────┘            │  quantity  (>= 1)   │            │
//! │                                     └─────────────────────┘            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Names
//! Line items are persisted with camelCase keys (`imageUrl`). Records written
//! by older app builds used `image_url`; both are accepted on read.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreResult;
use crate::money::Money;
use crate::validation::{validate_id, validate_price};

// =============================================================================
// Product Descriptor
// =============================================================================

/// A product as the catalog shows it, before it has a cart quantity.
///
/// Fields are private: the only way to get one is [`ProductDescriptor::new`],
/// which validates them.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductDescriptor {
    id: String,
    title: String,
    image_url: String,
    price: f64,
}

impl ProductDescriptor {
    /// Creates a validated product descriptor.
    ///
    /// ## Errors
    /// - `ValidationError::Required` if `id` is blank
    /// - `ValidationError::NotFinite` / `MustBeNonNegative` for a bad price
    ///
    /// ## Example
    /// ```rust
    /// use gomarket_core::ProductDescriptor;
    ///
    /// let p = ProductDescriptor::new("a", "Mug", "https://img/a.png", 12.5).unwrap();
    /// assert_eq!(p.id(), "a");
    /// assert!(ProductDescriptor::new("", "Mug", "", 1.0).is_err());
    /// ```
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        image_url: impl Into<String>,
        price: f64,
    ) -> CoreResult<Self> {
        let id = id.into();
        validate_id(&id)?;
        validate_price(price)?;

        Ok(ProductDescriptor {
            id,
            title: title.into(),
            image_url: image_url.into(),
            price,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn image_url(&self) -> &str {
        &self.image_url
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    /// Turns the descriptor into a fresh line item with quantity 1.
    pub fn into_line_item(self) -> LineItem {
        LineItem {
            id: self.id,
            title: self.title,
            image_url: self.image_url,
            price: self.price,
            quantity: 1,
        }
    }
}

// =============================================================================
// Line Item
// =============================================================================

/// One product currently in the cart.
///
/// ## Invariants (enforced by `CartState`)
/// - `quantity >= 1`; an item that would reach 0 is removed instead
/// - `id` is unique within a cart
/// - everything except `quantity` is frozen at the first add
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LineItem {
    /// Opaque product identifier.
    pub id: String,

    /// Display name.
    pub title: String,

    /// Display image reference.
    #[serde(alias = "image_url")]
    pub image_url: String,

    /// Unit price as the catalog reported it.
    pub price: f64,

    /// Units of this product in the cart.
    pub quantity: u32,
}

impl LineItem {
    /// Unit price converted to integer cents.
    pub fn unit_price(&self) -> Money {
        Money::from_price(self.price)
    }

    /// Unit price × quantity, in cents.
    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(i64::from(self.quantity))
    }
}
