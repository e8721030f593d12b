//! # Validation Module
//!
//! Field checks for product descriptors entering the cart.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: ProductDescriptor::new (THIS MODULE)                         │
//! │  ├── id present                                                        │
//! │  └── price finite and non-negative                                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: CartState::from_items (load path)                            │
//! │  ├── ids unique                                                        │
//! │  └── quantity >= 1                                                     │
//! │                                                                         │
//! │  Once a descriptor exists it is well-formed, so add_to_cart            │
//! │  has no error path of its own.                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use gomarket_core::validation::{validate_id, validate_price};
//!
//! assert!(validate_id("sku-1").is_ok());
//! assert!(validate_price(-1.0).is_err());
//! ```

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates a product id.
///
/// ## Rules
/// - Must not be empty or whitespace only
///
/// Ids are otherwise opaque: no length or charset rules.
pub fn validate_id(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }
    Ok(())
}

/// Validates a unit price.
///
/// ## Rules
/// - Must be a finite number
/// - Must be zero or greater (free items are allowed)
pub fn validate_price(price: f64) -> ValidationResult<()> {
    if !price.is_finite() {
        return Err(ValidationError::NotFinite {
            field: "price".to_string(),
        });
    }

    if price < 0.0 {
        return Err(ValidationError::MustBeNonNegative {
            field: "price".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(validate_id("a").is_ok());
        assert!(validate_id("550e8400-e29b-41d4").is_ok());
        assert_eq!(
            validate_id("   "),
            Err(ValidationError::Required {
                field: "id".to_string()
            })
        );
        assert!(validate_id("").is_err());
    }

    #[test]
    fn test_validate_price() {
        assert!(validate_price(0.0).is_ok());
        assert!(validate_price(10.5).is_ok());
        assert!(matches!(
            validate_price(-0.01),
            Err(ValidationError::MustBeNonNegative { .. })
        ));
        assert!(matches!(
            validate_price(f64::NAN),
            Err(ValidationError::NotFinite { .. })
        ));
        assert!(matches!(
            validate_price(f64::INFINITY),
            Err(ValidationError::NotFinite { .. })
        ));
    }
}
