//! # Error Types
//!
//! Domain-specific error types for gomarket-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  gomarket-core errors (this file)                                      │
//! │  ├── CoreError        - Payload and state errors                       │
//! │  └── ValidationError  - Product descriptor input failures              │
//! │                                                                         │
//! │  gomarket-store errors (separate crate)                                │
//! │  └── StoreError       - Key-value backend failures                     │
//! │                                                                         │
//! │  gomarket-cart errors (separate crate)                                 │
//! │  └── CartError        - What cart consumers see (Usage only)           │
//! │                                                                         │
//! │  CoreError at load time is recovered: the cart starts empty.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core cart errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The persisted payload is not a valid JSON array of line items.
    #[error("Failed to decode cart payload: {0}")]
    Deserialization(String),

    /// The cart could not be encoded for persistence.
    #[error("Failed to encode cart payload: {0}")]
    Serialization(String),

    /// The payload decoded but breaks a cart invariant.
    ///
    /// ## When This Occurs
    /// - Two line items share the same `id`
    /// - A line item has `quantity` 0
    /// - A line item carries a negative or non-finite price
    #[error("Cart state is invalid: {0}")]
    InvalidState(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors for product descriptors.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Value must not be below zero.
    #[error("{field} must not be negative")]
    MustBeNonNegative { field: String },

    /// Value is NaN or infinite.
    #[error("{field} must be a finite number")]
    NotFinite { field: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
