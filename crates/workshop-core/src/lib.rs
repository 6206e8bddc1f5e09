//! # workshop-core: Pure Business Logic for the Garage Management System
//!
//! This crate is the **heart** of the system. It contains all business logic
//! as pure functions and plain types with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Workshop Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               Outer surfaces (HTTP, rendering, auth)            │   │
//! │  │     not part of this workspace; they consume the two crates     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ workshop-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  totals   │  │ validation│  │   │
//! │  │   │ Documents │  │   Money   │  │ Subtotal  │  │   rules   │  │   │
//! │  │   │ Statuses  │  │  RateBps  │  │ Disc/Tax  │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 workshop-db (Database Layer)                    │   │
//! │  │           SQLite queries, migrations, repositories              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (documents, line items, statuses)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`totals`] - Subtotal/discount/tax/total calculation for documents
//! - [`context`] - Explicit request context (acting user, branch, role)
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input =
//!    same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64), all rates
//!    in basis points, so derived totals are exact
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use workshop_core::money::Money;
//! use workshop_core::totals::{calculate_totals, DiscountSpec, LineAmount};
//! use workshop_core::types::RateBps;
//!
//! let lines = [LineAmount::new(2, Money::from_cents(350_000))];
//! let totals = calculate_totals(
//!     &lines,
//!     DiscountSpec::Percentage(RateBps::from_bps(500)), // 5% off
//!     RateBps::from_bps(1800),                          // 18% VAT
//! );
//!
//! assert_eq!(totals.sub_total.cents(), 700_000);
//! assert_eq!(totals.discount_amount.cents(), 35_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod context;
pub mod error;
pub mod money;
pub mod totals;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use workshop_core::Money` instead of
// `use workshop_core::money::Money`

pub use context::{RequestContext, Role};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use totals::{calculate_totals, DiscountSpec, DocumentTotals, LineAmount};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed on a single document (quotation, job card, invoice)
///
/// ## Business Reason
/// Prevents runaway documents and keeps printed output to a sane length.
pub const MAX_DOCUMENT_LINES: usize = 100;

/// Maximum quantity on a single line
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_LINE_QUANTITY: i64 = 999;
