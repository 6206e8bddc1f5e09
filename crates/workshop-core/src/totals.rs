//! # Document Totals
//!
//! Pure totals calculation shared by quotations and invoices.
//!
//! ## Calculation Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lines [(qty, unit_price), …]                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  sub_total = Σ qty × unit_price                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  discount_amount = pct-of-subtotal | fixed | 0                          │
//! │  (clamped to sub_total, a discount can never exceed what it discounts)  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  tax_amount = (sub_total - discount_amount) × tax_rate                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  total_amount = sub_total - discount_amount + tax_amount                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! This is a pure function with no I/O and no clock access. Calling it
//! twice with identical inputs yields identical outputs.

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::RateBps;

// =============================================================================
// Inputs
// =============================================================================

/// The monetary facts of one document line, stripped of description and
/// catalog identity. All a totals calculation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmount {
    pub quantity: i64,
    pub unit_price: Money,
}

impl LineAmount {
    pub const fn new(quantity: i64, unit_price: Money) -> Self {
        LineAmount {
            quantity,
            unit_price,
        }
    }

    /// quantity × unit_price. Exact integer math, no rounding loss.
    #[inline]
    pub const fn total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

/// Document-level discount policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DiscountSpec {
    /// No discount.
    #[default]
    None,
    /// Percentage of the subtotal, in basis points (500 = 5%).
    Percentage(RateBps),
    /// Fixed amount off, in cents.
    Fixed(Money),
}

// =============================================================================
// Output
// =============================================================================

/// The four derived monetary fields persisted on every quotation and
/// invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTotals {
    pub sub_total: Money,
    pub discount_amount: Money,
    pub tax_amount: Money,
    pub total_amount: Money,
}

// =============================================================================
// Calculation
// =============================================================================

/// Computes subtotal, discount, tax and grand total for a list of lines.
///
/// ## Rules
/// - `sub_total` is the exact sum of line totals.
/// - The discount is clamped to `[0, sub_total]`: a fixed discount larger
///   than the subtotal discounts the whole subtotal and nothing more, so a
///   post-discount total is never negative.
/// - Tax applies to the post-discount amount.
///
/// ## Example
/// ```rust
/// use workshop_core::money::Money;
/// use workshop_core::totals::{calculate_totals, DiscountSpec, LineAmount};
/// use workshop_core::types::RateBps;
///
/// let lines = [
///     LineAmount::new(2, Money::from_cents(3_582_800)),
///     LineAmount::new(1, Money::from_cents(2_216_500)),
/// ];
/// let totals = calculate_totals(
///     &lines,
///     DiscountSpec::Percentage(RateBps::from_bps(500)),
///     RateBps::from_bps(1800),
/// );
/// assert_eq!(totals.total_amount.cents(), 10_517_334); // $105,173.34
/// ```
pub fn calculate_totals(
    lines: &[LineAmount],
    discount: DiscountSpec,
    tax_rate: RateBps,
) -> DocumentTotals {
    let sub_total: Money = lines.iter().map(LineAmount::total).sum();

    let discount_amount = match discount {
        DiscountSpec::None => Money::zero(),
        DiscountSpec::Percentage(rate) => sub_total.apply_rate(rate),
        DiscountSpec::Fixed(amount) => amount,
    };
    // Clamp to [0, sub_total]: never discount more than the subtotal,
    // never "discount" upward
    let cap = sub_total.cents().max(0);
    let discount_amount = Money::from_cents(discount_amount.cents().clamp(0, cap));

    let after_discount = sub_total - discount_amount;
    let tax_amount = after_discount.apply_rate(tax_rate);
    let total_amount = after_discount + tax_amount;

    DocumentTotals {
        sub_total,
        discount_amount,
        tax_amount,
        total_amount,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(spec: &[(i64, i64)]) -> Vec<LineAmount> {
        spec.iter()
            .map(|(qty, cents)| LineAmount::new(*qty, Money::from_cents(*cents)))
            .collect()
    }

    #[test]
    fn test_worked_example() {
        // Two-line quotation, 5% discount, 18% VAT
        let lines = lines(&[(2, 3_582_800), (1, 2_216_500)]);
        let totals = calculate_totals(
            &lines,
            DiscountSpec::Percentage(RateBps::from_bps(500)),
            RateBps::from_bps(1800),
        );

        assert_eq!(totals.sub_total.cents(), 9_382_100); // 93,821.00
        assert_eq!(totals.discount_amount.cents(), 469_105); // 4,691.05
        assert_eq!(totals.tax_amount.cents(), 1_604_339); // 16,043.39
        assert_eq!(totals.total_amount.cents(), 10_517_334); // 105,173.34
    }

    #[test]
    fn test_no_discount_no_tax() {
        let lines = lines(&[(3, 1000)]);
        let totals = calculate_totals(&lines, DiscountSpec::None, RateBps::zero());
        assert_eq!(totals.sub_total.cents(), 3000);
        assert_eq!(totals.discount_amount.cents(), 0);
        assert_eq!(totals.tax_amount.cents(), 0);
        assert_eq!(totals.total_amount.cents(), 3000);
    }

    #[test]
    fn test_fixed_discount() {
        let lines = lines(&[(1, 10_000)]);
        let totals = calculate_totals(
            &lines,
            DiscountSpec::Fixed(Money::from_cents(2_500)),
            RateBps::from_bps(1000),
        );
        assert_eq!(totals.discount_amount.cents(), 2_500);
        // (100.00 - 25.00) × 10% = 7.50 tax
        assert_eq!(totals.tax_amount.cents(), 750);
        assert_eq!(totals.total_amount.cents(), 8_250);
    }

    #[test]
    fn test_discount_clamped_at_subtotal() {
        let lines = lines(&[(1, 5_000)]);
        let totals = calculate_totals(
            &lines,
            DiscountSpec::Fixed(Money::from_cents(9_000)),
            RateBps::from_bps(1800),
        );
        assert_eq!(totals.discount_amount.cents(), 5_000);
        assert_eq!(totals.tax_amount.cents(), 0);
        assert_eq!(totals.total_amount.cents(), 0);
    }

    #[test]
    fn test_negative_fixed_discount_clamped_to_zero_effect() {
        // A negative "discount" must not inflate the total
        let lines = lines(&[(1, 5_000)]);
        let totals = calculate_totals(
            &lines,
            DiscountSpec::Fixed(Money::from_cents(-1_000)),
            RateBps::zero(),
        );
        assert_eq!(totals.discount_amount.cents(), 0);
        assert_eq!(totals.total_amount.cents(), 5_000);
    }

    #[test]
    fn test_empty_lines() {
        let totals = calculate_totals(
            &[],
            DiscountSpec::Percentage(RateBps::from_bps(500)),
            RateBps::from_bps(1800),
        );
        assert_eq!(totals.sub_total, Money::zero());
        assert_eq!(totals.total_amount, Money::zero());
    }

    #[test]
    fn test_full_percentage_discount() {
        let lines = lines(&[(2, 750)]);
        let totals = calculate_totals(
            &lines,
            DiscountSpec::Percentage(RateBps::from_bps(10_000)),
            RateBps::from_bps(1800),
        );
        assert_eq!(totals.discount_amount.cents(), 1_500);
        assert_eq!(totals.total_amount.cents(), 0);
    }

    #[test]
    fn test_determinism() {
        let lines = lines(&[(7, 1_234), (3, 99_999), (1, 1)]);
        let first = calculate_totals(
            &lines,
            DiscountSpec::Percentage(RateBps::from_bps(777)),
            RateBps::from_bps(1825),
        );
        let second = calculate_totals(
            &lines,
            DiscountSpec::Percentage(RateBps::from_bps(777)),
            RateBps::from_bps(1825),
        );
        assert_eq!(first, second);
    }
}
