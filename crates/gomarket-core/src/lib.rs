//! # gomarket-core: Pure Cart Logic for GoMarket
//!
//! This crate is the **heart** of the GoMarket cart. It holds the line-item
//! types, the find-or-append merge rules and the persisted payload format,
//! all as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        GoMarket Cart Architecture                       │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    UI layer (out of tree)                       │   │
//! │  │    Product list ──► Cart screen ──► Floating cart badge         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ CartHandle                             │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    gomarket-cart (CartStore)                    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ gomarket-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   cart    │  │   codec   │  │   money   │  │   │
//! │  │   │ LineItem  │  │ CartState │  │   JSON    │  │  totals   │  │   │
//! │  │   │ Product   │  │ CartChange│  │  payload  │  │  (cents)  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO STORAGE • NO ASYNC • PURE FUNCTIONS               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - `LineItem`, `ProductDescriptor`
//! - [`cart`] - `CartState` and its three mutations
//! - [`codec`] - Persisted payload encode/decode
//! - [`money`] - Integer-cents money for display totals
//! - [`validation`] - Descriptor validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use gomarket_core::{CartState, ProductDescriptor};
//!
//! let mut cart = CartState::new();
//! let shirt = ProductDescriptor::new("a", "T-Shirt", "https://img/a.png", 10.0).unwrap();
//!
//! cart.add(&shirt);
//! cart.add(&shirt);
//!
//! assert_eq!(cart.len(), 1);
//! assert_eq!(cart.items()[0].quantity, 2);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod codec;
pub mod error;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{CartChange, CartState, CartTotals};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::{LineItem, ProductDescriptor};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Storage key the whole cart is persisted under.
///
/// The app namespace prefix keeps the record apart from other values the
/// host app keeps in the same key-value store.
pub const DEFAULT_STORAGE_KEY: &str = "@GoMarketplace";
