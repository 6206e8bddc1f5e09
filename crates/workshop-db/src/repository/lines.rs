//! # Document Line Resolution
//!
//! Quotations and invoices are created from the same kind of line input:
//! a service or part reference that may lean on the catalog for its
//! description and price, or a free-text misc charge that must spell out
//! both. Resolution happens inside the creation transaction so the
//! snapshot written to the document matches what the catalog said at that
//! instant.

use sqlx::{Sqlite, Transaction};

use crate::error::{DbError, DbResult};
use workshop_core::validation::{validate_price_cents, validate_quantity, validate_required_text};
use workshop_core::{ItemKind, LineAmount, Money, ValidationError};

/// One line of a document being created.
#[derive(Debug, Clone)]
pub struct DocumentLine {
    pub kind: ItemKind,
    /// Service or inventory item id depending on `kind`; None for misc.
    pub catalog_id: Option<String>,
    /// None resolves to the catalog name (service/part lines only).
    pub description: Option<String>,
    pub quantity: i64,
    /// None resolves to the catalog default/selling price (service/part
    /// lines only).
    pub unit_price: Option<Money>,
}

impl DocumentLine {
    /// A service line taking the catalog defaults.
    pub fn service(service_id: impl Into<String>, quantity: i64) -> Self {
        DocumentLine {
            kind: ItemKind::Service,
            catalog_id: Some(service_id.into()),
            description: None,
            quantity,
            unit_price: None,
        }
    }

    /// A part line taking the catalog defaults.
    pub fn part(inventory_item_id: impl Into<String>, quantity: i64) -> Self {
        DocumentLine {
            kind: ItemKind::Part,
            catalog_id: Some(inventory_item_id.into()),
            description: None,
            quantity,
            unit_price: None,
        }
    }

    /// A free-text charge with no catalog backing.
    pub fn misc(description: impl Into<String>, quantity: i64, unit_price: Money) -> Self {
        DocumentLine {
            kind: ItemKind::Misc,
            catalog_id: None,
            description: Some(description.into()),
            quantity,
            unit_price: Some(unit_price),
        }
    }

    /// Overrides the unit price instead of taking the catalog default.
    pub fn priced(mut self, unit_price: Money) -> Self {
        self.unit_price = Some(unit_price);
        self
    }

    /// Overrides the description instead of taking the catalog name.
    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A line with description and price settled, ready to persist.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedLine {
    pub kind: ItemKind,
    pub catalog_id: Option<String>,
    pub description: String,
    pub quantity: i64,
    pub unit_price: Money,
}

impl ResolvedLine {
    pub(crate) fn amount(&self) -> LineAmount {
        LineAmount::new(self.quantity, self.unit_price)
    }

    pub(crate) fn total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

/// Resolves one input line against the catalog on the open transaction.
pub(crate) async fn resolve_line(
    tx: &mut Transaction<'_, Sqlite>,
    line: DocumentLine,
) -> DbResult<ResolvedLine> {
    validate_quantity(line.quantity)?;
    if let Some(price) = line.unit_price {
        validate_price_cents(price.cents())?;
    }

    match line.kind {
        ItemKind::Service => {
            let service_id = line.catalog_id.ok_or(ValidationError::Required {
                field: "service_id".to_string(),
            })?;
            let (name, default_price): (String, Money) =
                sqlx::query_as("SELECT name, default_price FROM services WHERE id = ?1")
                    .bind(&service_id)
                    .fetch_optional(&mut **tx)
                    .await?
                    .ok_or_else(|| DbError::not_found("Service", &service_id))?;

            Ok(ResolvedLine {
                kind: ItemKind::Service,
                catalog_id: Some(service_id),
                description: line.description.unwrap_or(name),
                quantity: line.quantity,
                unit_price: line.unit_price.unwrap_or(default_price),
            })
        }
        ItemKind::Part => {
            let item_id = line.catalog_id.ok_or(ValidationError::Required {
                field: "inventory_item_id".to_string(),
            })?;
            let (name, selling_price): (String, Money) =
                sqlx::query_as("SELECT name, unit_price FROM inventory_items WHERE id = ?1")
                    .bind(&item_id)
                    .fetch_optional(&mut **tx)
                    .await?
                    .ok_or_else(|| DbError::not_found("Inventory item", &item_id))?;

            Ok(ResolvedLine {
                kind: ItemKind::Part,
                catalog_id: Some(item_id),
                description: line.description.unwrap_or(name),
                quantity: line.quantity,
                unit_price: line.unit_price.unwrap_or(selling_price),
            })
        }
        ItemKind::Misc => {
            let description = line.description.unwrap_or_default();
            validate_required_text("description", &description, 500)?;
            let unit_price = line.unit_price.ok_or(ValidationError::Required {
                field: "unit_price".to_string(),
            })?;

            Ok(ResolvedLine {
                kind: ItemKind::Misc,
                catalog_id: None,
                description,
                quantity: line.quantity,
                unit_price,
            })
        }
    }
}
