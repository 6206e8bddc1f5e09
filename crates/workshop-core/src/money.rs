//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  A billing system that accumulates float error eventually produces an  │
//! │  invoice whose balance never quite reaches zero.                       │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    Every amount is an i64 count of the smallest currency unit.         │
//! │    A settled invoice has balance == 0, exactly, no epsilon needed.     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use workshop_core::money::Money;
//!
//! // Create from cents (preferred)
//! let price = Money::from_cents(1099); // $10.99
//!
//! // Arithmetic operations
//! let doubled = price * 2;            // $21.98
//! let total = price + Money::from_cents(500); // $15.99
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

use crate::types::RateBps;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative values for adjustments and refunds
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Transparent sqlx derive**: Stored as a plain INTEGER column
///
/// Every monetary column in the database and every derived total
/// (subtotal, discount, tax, balance due) flows through this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use workshop_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // Represents $10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts, only the major unit should be negative:
    /// `from_major_minor(-5, 50)` = -$5.50, not -$4.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents (smallest currency unit).
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Returns the smaller of two amounts.
    #[inline]
    pub fn min(self, other: Self) -> Self {
        Money(self.0.min(other.0))
    }

    /// Applies a basis-point rate to this amount, rounding half up.
    ///
    /// ## Implementation
    /// Integer math with an i128 intermediate: `(cents * bps + 5000) / 10000`.
    /// The +5000 term rounds the half-cent boundary upward, which matches
    /// how the totals on printed documents are conventionally rounded.
    ///
    /// ## Example
    /// ```rust
    /// use workshop_core::money::Money;
    /// use workshop_core::types::RateBps;
    ///
    /// let amount = Money::from_cents(8_912_995); // $89,129.95
    /// let vat = RateBps::from_bps(1800);         // 18%
    ///
    /// // $89,129.95 × 18% = $16,043.391 → rounds to $16,043.39
    /// assert_eq!(amount.apply_rate(vat).cents(), 1_604_339);
    /// ```
    pub fn apply_rate(&self, rate: RateBps) -> Money {
        // i128 prevents overflow on large amounts
        let cents = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money::from_cents(cents as i64)
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use workshop_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(3_582_800); // $35,828.00
    /// let line_total = unit_price.multiply_quantity(2);
    /// assert_eq!(line_total.cents(), 7_165_600);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows money in a human-readable format.
///
/// ## Note
/// This is for debugging and logs. The rendering layer formats amounts
/// for printed documents with proper localization.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}.{:02}", sign, self.major().abs(), self.minor())
    }
}

/// Default money is zero.
impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Multiplication by integer (for quantity calculations).
impl Mul<i32> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i32) -> Self {
        Money(self.0 * qty as i64)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

/// Sum over an iterator of amounts (line totals into a subtotal).
impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.major(), 10);
        assert_eq!(money.minor(), 99);
    }

    #[test]
    fn test_from_major_minor() {
        let money = Money::from_major_minor(10, 99);
        assert_eq!(money.cents(), 1099);

        let negative = Money::from_major_minor(-5, 50);
        assert_eq!(negative.cents(), -550);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "$10.99");
        assert_eq!(format!("{}", Money::from_cents(500)), "$5.00");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-$5.50");
        assert_eq!(format!("{}", Money::from_cents(0)), "$0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        let result: Money = a * 3;
        assert_eq!(result.cents(), 3000);
    }

    #[test]
    fn test_sum() {
        let total: Money = [100, 250, 33].iter().map(|c| Money::from_cents(*c)).sum();
        assert_eq!(total.cents(), 383);
    }

    #[test]
    fn test_apply_rate_basic() {
        // $10.00 at 10% = $1.00
        let amount = Money::from_cents(1000);
        let rate = RateBps::from_bps(1000);
        assert_eq!(amount.apply_rate(rate).cents(), 100);
    }

    #[test]
    fn test_apply_rate_with_rounding() {
        // $10.00 at 8.25% = $0.825 → $0.83 (half rounds up)
        let amount = Money::from_cents(1000);
        let rate = RateBps::from_bps(825);
        assert_eq!(amount.apply_rate(rate).cents(), 83);
    }

    #[test]
    fn test_apply_rate_large_amount() {
        // $89,129.95 at 18% = $16,043.391 → $16,043.39
        let amount = Money::from_cents(8_912_995);
        let rate = RateBps::from_bps(1800);
        assert_eq!(amount.apply_rate(rate).cents(), 1_604_339);
    }

    #[test]
    fn test_min_clamp() {
        let subtotal = Money::from_cents(5000);
        let oversized_discount = Money::from_cents(9000);
        assert_eq!(oversized_discount.min(subtotal), subtotal);
        assert_eq!(Money::from_cents(100).min(subtotal).cents(), 100);
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        let positive = Money::from_cents(100);
        assert!(positive.is_positive());

        let negative = Money::from_cents(-100);
        assert!(negative.is_negative());
    }

    #[test]
    fn test_multiply_quantity() {
        let unit_price = Money::from_cents(299);
        let line_total = unit_price.multiply_quantity(3);
        assert_eq!(line_total.cents(), 897);
    }
}
