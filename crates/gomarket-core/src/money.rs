//! # Money Module
//!
//! Integer-cents money for the cart's display totals.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Prices arrive as JSON numbers (floats):                                │
//! │    19.99 * 3 = 59.97000000000001   ❌ ugly subtotal                     │
//! │                                                                         │
//! │  OUR SOLUTION: convert each unit price to cents ONCE, then do all      │
//! │  arithmetic on integers:                                                │
//! │    1999 * 3 = 5997 cents → "$59.97"                                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Totals are for display only. The cart applies no tax, discount or
//! currency rules.
//!
//! ## Usage
//! ```rust
//! use gomarket_core::money::Money;
//!
//! let price = Money::from_price(19.99);
//! assert_eq!(price.cents(), 1999);
//! assert_eq!((price * 3).to_string(), "$59.97");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Converts a catalog price (a JSON number in major units) to cents.
    ///
    /// Rounds half away from zero, so `0.125` becomes 13 cents.
    ///
    /// ## Example
    /// ```rust
    /// use gomarket_core::money::Money;
    ///
    /// assert_eq!(Money::from_price(10.0).cents(), 1000);
    /// assert_eq!(Money::from_price(0.125).cents(), 13);
    /// ```
    pub fn from_price(price: f64) -> Self {
        Money((price * 100.0).round() as i64)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit (dollars) portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Multiplies by a quantity, saturating instead of overflowing.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows money as `$12.34` (negative: `-$12.34`).
///
/// Localized formatting belongs to the UI layer.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}${}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        self.multiply_quantity(qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
