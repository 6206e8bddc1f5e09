//! # Document Numbering
//!
//! Branch-scoped, human-readable document numbers:
//!
//! ```text
//! QT-B01-20260806-3F9A2     (quotation, branch code 01)
//! JC-B01-20260806-C41D8     (job card)
//! INV-B01-20260806-77B0E    (invoice)
//! ```
//!
//! The random suffix comes from a fresh UUID, which makes collisions within
//! one branch-day vanishingly rare. They are still checked against the
//! table before use; on a collision the enclosing operation fails cleanly
//! rather than overwriting an existing document.

use chrono::Utc;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

/// Builds a document number for the given prefix and branch code.
pub(crate) fn document_number(prefix: &str, branch_code: &str) -> String {
    let date_part = Utc::now().format("%Y%m%d");
    let hex = Uuid::new_v4().simple().to_string();
    let random_part = hex[..5].to_uppercase();
    format!("{prefix}-B{branch_code}-{date_part}-{random_part}")
}

/// Verifies the generated number is not already taken.
///
/// `table` and `column` come from a fixed internal set of callers, never
/// from user input.
pub(crate) async fn assert_number_free(
    conn: &mut SqliteConnection,
    table: &str,
    column: &str,
    number: &str,
) -> DbResult<()> {
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE {column} = ?1)");
    let taken: bool = sqlx::query_scalar(&sql)
        .bind(number)
        .fetch_one(&mut *conn)
        .await?;

    if taken {
        return Err(DbError::duplicate(column, number));
    }
    Ok(())
}

/// Looks up the short code of a branch, for embedding in document numbers.
pub(crate) async fn branch_code(conn: &mut SqliteConnection, branch_id: &str) -> DbResult<String> {
    sqlx::query_scalar("SELECT code FROM branches WHERE id = ?1")
        .bind(branch_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Branch", branch_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_number_format() {
        let number = document_number("JC", "01");
        let parts: Vec<&str> = number.split('-').collect();

        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "JC");
        assert_eq!(parts[1], "B01");
        assert_eq!(parts[2].len(), 8); // YYYYMMDD
        assert_eq!(parts[3].len(), 5);
        assert!(parts[3].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_document_numbers_differ() {
        let a = document_number("INV", "02");
        let b = document_number("INV", "02");
        assert_ne!(a, b);
    }
}
