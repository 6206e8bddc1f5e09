//! # Validation Module
//!
//! Input validation rules applied before any persistence is attempted.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (form / API surface)                                  │
//! │  ├── Basic format checks, immediate user feedback                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - business rule validation                       │
//! │  ├── Runs before a transaction opens; a failure means nothing was      │
//! │  │   written                                                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / UNIQUE / CHECK / FK constraints                        │
//! │                                                                         │
//! │  Defense in depth: each layer catches what the one above missed        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::{MAX_DOCUMENT_LINES, MAX_LINE_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required free-text field (names, complaints, descriptions).
///
/// ## Rules
/// - Must not be empty after trimming
/// - Must be at most `max` characters
pub fn validate_required_text(field: &'static str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - Must be at most 50 characters
/// - Only alphanumeric characters, hyphens, underscores
///
/// ## Example
/// ```rust
/// use workshop_core::validation::validate_sku;
///
/// assert!(validate_sku("FLT-001").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("has space").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates an email address when one is supplied.
///
/// Deliberately shallow: one `@` with text on both sides and a dot in the
/// domain. Deliverability is the mail system's problem, not ours.
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();

    let invalid = || ValidationError::InvalidFormat {
        field: "email".to_string(),
        reason: "must look like name@example.com".to_string(),
    };

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.is_empty() || !domain.contains('.') || domain.contains('@') {
        return Err(invalid());
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (goodwill lines)
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a payment amount in cents.
///
/// ## Rules
/// - Must be positive (> 0); zero or negative payments are meaningless
pub fn validate_payment_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        });
    }

    Ok(())
}

/// Validates a rate in basis points.
///
/// ## Rules
/// - Must be between 0 and 10000 (0% to 100%)
pub fn validate_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: "rate".to_string(),
            min: 0,
            max: 10_000,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the line count of a document.
///
/// ## Rules
/// - Must have at least one line (an empty quotation or invoice bills
///   nothing)
/// - Must not exceed MAX_DOCUMENT_LINES
pub fn validate_line_count(count: usize) -> ValidationResult<()> {
    if count == 0 {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    if count > MAX_DOCUMENT_LINES {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_DOCUMENT_LINES as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Identity Validators
// =============================================================================

/// Validates a UUID string format.
pub fn validate_uuid(field: &'static str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

/// Validates vehicle identification.
///
/// At least one of VIN / license plate must be present; a vehicle with
/// neither cannot be told apart from any other.
pub fn validate_vehicle_identity(
    vin: Option<&str>,
    license_plate: Option<&str>,
) -> ValidationResult<()> {
    let has_vin = vin.map(|v| !v.trim().is_empty()).unwrap_or(false);
    let has_plate = license_plate
        .map(|p| !p.trim().is_empty())
        .unwrap_or(false);

    if !has_vin && !has_plate {
        return Err(ValidationError::Required {
            field: "vin or license_plate".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_required_text() {
        assert!(validate_required_text("full_name", "Asha Mwinyi", 200).is_ok());
        assert!(validate_required_text("full_name", "", 200).is_err());
        assert!(validate_required_text("full_name", "   ", 200).is_err());
        assert!(validate_required_text("full_name", &"A".repeat(300), 200).is_err());
    }

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("FLT-001").is_ok());
        assert!(validate_sku("BRAKE_PAD_22").is_ok());

        assert!(validate_sku("").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("asha@example.com").is_ok());
        assert!(validate_email("a@b.co").is_ok());

        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("asha@").is_err());
        assert!(validate_email("asha@nodot").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_price_cents() {
        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(1099).is_ok());
        assert!(validate_price_cents(-100).is_err());
    }

    #[test]
    fn test_validate_payment_amount() {
        assert!(validate_payment_amount(1).is_ok());
        assert!(validate_payment_amount(0).is_err());
        assert!(validate_payment_amount(-500).is_err());
    }

    #[test]
    fn test_validate_rate_bps() {
        assert!(validate_rate_bps(0).is_ok());
        assert!(validate_rate_bps(1800).is_ok());
        assert!(validate_rate_bps(10_000).is_ok());
        assert!(validate_rate_bps(10_001).is_err());
    }

    #[test]
    fn test_validate_line_count() {
        assert!(validate_line_count(1).is_ok());
        assert!(validate_line_count(100).is_ok());
        assert!(validate_line_count(0).is_err());
        assert!(validate_line_count(101).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("customer_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("customer_id", "").is_err());
        assert!(validate_uuid("customer_id", "not-a-uuid").is_err());
    }

    #[test]
    fn test_validate_vehicle_identity() {
        assert!(validate_vehicle_identity(Some("VIN123"), None).is_ok());
        assert!(validate_vehicle_identity(None, Some("T123ABC")).is_ok());
        assert!(validate_vehicle_identity(Some("VIN123"), Some("T123ABC")).is_ok());

        assert!(validate_vehicle_identity(None, None).is_err());
        assert!(validate_vehicle_identity(Some(""), Some("  ")).is_err());
    }
}
