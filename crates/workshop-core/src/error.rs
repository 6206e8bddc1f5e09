//! # Error Types
//!
//! Domain-specific error types for workshop-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  workshop-core errors (this file)                                      │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  workshop-db errors (separate crate)                                   │
//! │  └── DbError          - Storage failures, uniqueness conflicts         │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller-facing message   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (SKU, ID, status, etc.)
//! 3. Errors are enum variants, never String
//! 4. Every operation returns an explicit Result; no silent partial success

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations. They are raised before
/// any persistence is attempted (or inside a transaction that is then
/// rolled back), so a failed operation leaves no partial writes behind.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Input validation failed (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Two records that must agree do not, e.g. a vehicle that does not
    /// belong to the stated customer.
    #[error("{subject} {subject_id} does not belong to {owner} {owner_id}")]
    ReferentialMismatch {
        subject: &'static str,
        subject_id: String,
        owner: &'static str,
        owner_id: String,
    },

    /// A status string outside the entity's enumerated set.
    #[error("'{value}' is not a valid {entity} status")]
    UnknownStatus {
        entity: &'static str,
        value: String,
    },

    /// The document is not in a state that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Converting a quotation that is not accepted
    /// - Invoicing a job card that is not completed
    /// - Invoicing a quotation that is not accepted
    #[error("{entity} {id} is {status}, cannot {operation}")]
    InvalidDocumentState {
        entity: &'static str,
        id: String,
        status: String,
        operation: &'static str,
    },

    /// Requested part quantity exceeds on-hand stock.
    ///
    /// Stock never goes negative: the adjustment that would cross zero is
    /// rejected and, when raised mid-transaction, rolls the whole document
    /// creation back.
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when input doesn't meet requirements. Used for early
/// validation before business logic runs; no partial writes ever happen.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, malformed email).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Amount exceeds what the document allows, e.g. a payment larger than
    /// the outstanding balance.
    #[error("{field} cannot exceed {limit}")]
    ExceedsLimit { field: String, limit: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            sku: "FLT-001".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for FLT-001: available 3, requested 5"
        );

        let err = CoreError::UnknownStatus {
            entity: "invoice",
            value: "settled".to_string(),
        };
        assert_eq!(err.to_string(), "'settled' is not a valid invoice status");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "customer_complaints".to_string(),
        };
        assert_eq!(err.to_string(), "customer_complaints is required");

        let err = ValidationError::ExceedsLimit {
            field: "payment amount".to_string(),
            limit: "$55,173.34 balance due".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "payment amount cannot exceed $55,173.34 balance due"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "branch_id".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
