//! # Inventory Repository
//!
//! Stocked parts and their on-hand quantities.
//!
//! ## Stock Policy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every stock movement goes through apply_stock_delta:                   │
//! │                                                                         │
//! │  adjust_stock(item, +10, "restock")      standalone intake             │
//! │  adjust_stock(item, -2, "manual")        standalone correction         │
//! │  job card creation, part lines           same guard, inside the        │
//! │                                          creation transaction          │
//! │                                                                         │
//! │  The guard is a hard floor at zero: a movement that would go negative  │
//! │  is rejected and, when raised mid-transaction, rolls the whole         │
//! │  document creation back. quantity_on_hand never goes below zero.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use workshop_core::validation::{validate_price_cents, validate_required_text, validate_sku};
use workshop_core::{CoreError, InventoryItem, Money};

/// Input for creating an inventory item.
#[derive(Debug, Clone)]
pub struct NewInventoryItem {
    pub category_id: Option<String>,
    /// NULL means the item is stocked globally rather than per branch.
    pub branch_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub sku: String,
    pub quantity_on_hand: i64,
    pub unit_price: Money,
    pub cost_price: Option<Money>,
    pub reorder_level: i64,
}

/// Repository for inventory items and stock levels.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

const SELECT_COLUMNS: &str = "id, category_id, branch_id, name, description, sku, \
                              quantity_on_hand, unit_price, cost_price, reorder_level, \
                              is_active, created_at, updated_at";

impl InventoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Creates a new inventory item.
    ///
    /// The SKU must be unique within its branch scope: among items of the
    /// same branch, or among global items when no branch is given.
    pub async fn create(&self, item: NewInventoryItem) -> DbResult<InventoryItem> {
        validate_required_text("name", &item.name, 200)?;
        validate_sku(&item.sku)?;
        validate_price_cents(item.unit_price.cents())?;
        if let Some(cost) = item.cost_price {
            validate_price_cents(cost.cents())?;
        }
        if item.quantity_on_hand < 0 {
            return Err(workshop_core::ValidationError::OutOfRange {
                field: "quantity_on_hand".to_string(),
                min: 0,
                max: i64::MAX,
            }
            .into());
        }

        let now = Utc::now();
        let record = InventoryItem {
            id: Uuid::new_v4().to_string(),
            category_id: item.category_id,
            branch_id: item.branch_id,
            name: item.name.trim().to_string(),
            description: item.description,
            sku: item.sku.trim().to_string(),
            quantity_on_hand: item.quantity_on_hand,
            unit_price: item.unit_price,
            cost_price: item.cost_price,
            reorder_level: item.reorder_level,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %record.id, sku = %record.sku, "Creating inventory item");

        sqlx::query(
            r#"
            INSERT INTO inventory_items (
                id, category_id, branch_id, name, description, sku,
                quantity_on_hand, unit_price, cost_price, reorder_level,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&record.id)
        .bind(&record.category_id)
        .bind(&record.branch_id)
        .bind(&record.name)
        .bind(&record.description)
        .bind(&record.sku)
        .bind(record.quantity_on_hand)
        .bind(record.unit_price)
        .bind(record.cost_price)
        .bind(record.reorder_level)
        .bind(record.is_active)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    /// Gets an item by ID.
    pub async fn find_by_id(&self, id: &str) -> DbResult<Option<InventoryItem>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM inventory_items WHERE id = ?1");
        let item = sqlx::query_as::<_, InventoryItem>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(item)
    }

    /// Gets an item by SKU within a branch scope (NULL branch = global).
    pub async fn find_by_sku(
        &self,
        sku: &str,
        branch_id: Option<&str>,
    ) -> DbResult<Option<InventoryItem>> {
        let item = match branch_id {
            Some(branch) => {
                let sql = format!(
                    "SELECT {SELECT_COLUMNS} FROM inventory_items \
                     WHERE sku = ?1 AND branch_id = ?2"
                );
                sqlx::query_as::<_, InventoryItem>(&sql)
                    .bind(sku)
                    .bind(branch)
                    .fetch_optional(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {SELECT_COLUMNS} FROM inventory_items \
                     WHERE sku = ?1 AND branch_id IS NULL"
                );
                sqlx::query_as::<_, InventoryItem>(&sql)
                    .bind(sku)
                    .fetch_optional(&self.pool)
                    .await?
            }
        };

        Ok(item)
    }

    /// Searches active items by name or SKU. A branch filter shows the
    /// branch's own items plus global ones.
    pub async fn search(
        &self,
        term: &str,
        branch_id: Option<&str>,
        limit: i64,
    ) -> DbResult<Vec<InventoryItem>> {
        let pattern = format!("%{term}%");
        let items = match branch_id {
            Some(branch) => {
                let sql = format!(
                    "SELECT {SELECT_COLUMNS} FROM inventory_items \
                     WHERE (name LIKE ?1 OR sku LIKE ?1) \
                       AND (branch_id = ?2 OR branch_id IS NULL) \
                       AND is_active = 1 \
                     ORDER BY name ASC LIMIT ?3"
                );
                sqlx::query_as::<_, InventoryItem>(&sql)
                    .bind(&pattern)
                    .bind(branch)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {SELECT_COLUMNS} FROM inventory_items \
                     WHERE (name LIKE ?1 OR sku LIKE ?1) AND is_active = 1 \
                     ORDER BY name ASC LIMIT ?2"
                );
                sqlx::query_as::<_, InventoryItem>(&sql)
                    .bind(&pattern)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(items)
    }

    /// Adjusts the on-hand quantity of an item by a signed delta.
    ///
    /// Negative deltas consume stock, positive ones restock. An adjustment
    /// that would take the quantity below zero is rejected and the stock
    /// is left untouched.
    ///
    /// ## Returns
    /// The new on-hand quantity after a successful adjustment.
    pub async fn adjust_stock(&self, item_id: &str, delta: i64, reason: &str) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        apply_stock_delta(&mut conn, item_id, delta, reason).await
    }

    /// Soft-deletes an item.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE inventory_items SET is_active = 0, updated_at = ?2 WHERE id = ?1")
                .bind(id)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Inventory item", id));
        }

        Ok(())
    }

    /// Hard-deletes an item. Refused while job card lines reference it.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let referenced: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM job_card_parts WHERE inventory_item_id = ?1)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        if referenced {
            warn!(id = %id, "Refusing to delete inventory item referenced by job cards");
            return Err(DbError::in_use("Inventory item", id, "job card lines"));
        }

        let result = sqlx::query("DELETE FROM inventory_items WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Inventory item", id));
        }

        Ok(())
    }
}

// =============================================================================
// Stock movement primitive
// =============================================================================

/// Applies a signed stock delta on an existing connection.
///
/// This is the single entry point for every stock movement, so the
/// floor-at-zero guarantee holds no matter where the movement originates.
/// Job card creation calls it on its own transaction connection; a failed
/// guard there aborts the whole creation.
pub(crate) async fn apply_stock_delta(
    conn: &mut SqliteConnection,
    item_id: &str,
    delta: i64,
    reason: &str,
) -> DbResult<i64> {
    let row: Option<(String, i64)> =
        sqlx::query_as("SELECT sku, quantity_on_hand FROM inventory_items WHERE id = ?1")
            .bind(item_id)
            .fetch_optional(&mut *conn)
            .await?;

    let (sku, on_hand) = row.ok_or_else(|| DbError::not_found("Inventory item", item_id))?;

    let new_quantity = on_hand + delta;
    if new_quantity < 0 {
        warn!(
            item_id = %item_id,
            sku = %sku,
            on_hand = on_hand,
            delta = delta,
            reason = %reason,
            "Stock adjustment would go negative, rejecting"
        );
        return Err(CoreError::InsufficientStock {
            sku,
            available: on_hand,
            requested: -delta,
        }
        .into());
    }

    // Guard repeated in SQL so a concurrent writer cannot slip the
    // quantity below zero between our read and this update
    let result = sqlx::query(
        r#"
        UPDATE inventory_items
        SET quantity_on_hand = quantity_on_hand + ?2, updated_at = ?3
        WHERE id = ?1 AND quantity_on_hand + ?2 >= 0
        "#,
    )
    .bind(item_id)
    .bind(delta)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::InsufficientStock {
            sku,
            available: on_hand,
            requested: -delta,
        }
        .into());
    }

    debug!(
        item_id = %item_id,
        delta = delta,
        new_quantity = new_quantity,
        reason = %reason,
        "Stock adjusted"
    );

    Ok(new_quantity)
}

// =============================================================================
// Unit Tests
// =============================================================================
