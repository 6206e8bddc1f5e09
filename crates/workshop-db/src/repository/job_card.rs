//! # Job Card Repository
//!
//! Database operations for job cards and their lines.
//!
//! ## Job Card Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Job Card Lifecycle                                 │
//! │                                                                         │
//! │  1. CREATE (one transaction)                                           │
//! │     ├── verify vehicle belongs to customer (before the tx opens)       │
//! │     ├── generate collision-checked JC-B<code>-<date>-<rand> number     │
//! │     ├── insert card + service/part/extra lines                         │
//! │     └── decrement stock per part line; a part that would drive stock   │
//! │         negative aborts and rolls back the whole creation              │
//! │                                                                         │
//! │  2. WORK                                                               │
//! │     └── update_status: approved → in_progress ⇄ awaiting_parts         │
//! │         → completed (stamps date_actual_completion)                    │
//! │                                                                         │
//! │  3. BILLING (driven by the invoice repository)                         │
//! │     └── status → invoiced → paid, payment_status tracks money in      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::numbering;
use crate::repository::inventory::apply_stock_delta;
use workshop_core::validation::{validate_price_cents, validate_quantity, validate_required_text};
use workshop_core::{
    CoreError, Customer, JobCard, JobCardExtra, JobCardPart, JobCardService, JobCardStatus,
    JobPaymentStatus, Money, RequestContext, ValidationError, Vehicle,
};

// =============================================================================
// Inputs
// =============================================================================

/// A labor line to add. When `unit_price` is omitted it resolves to the
/// catalog's default price for the service.
#[derive(Debug, Clone)]
pub struct NewServiceLine {
    pub service_id: String,
    pub description_override: Option<String>,
    pub quantity: i64,
    pub unit_price: Option<Money>,
    pub notes: Option<String>,
}

/// A part line to add. When `unit_price` is omitted it resolves to the
/// item's selling price.
#[derive(Debug, Clone)]
pub struct NewPartLine {
    pub inventory_item_id: String,
    pub description_override: Option<String>,
    pub quantity_used: i64,
    pub unit_price: Option<Money>,
    pub notes: Option<String>,
}

/// An ad-hoc charge with no catalog backing.
#[derive(Debug, Clone)]
pub struct NewExtraLine {
    pub description: String,
    pub quantity: i64,
    pub unit_price: Money,
}

/// Input for creating a job card. The branch and creator come from the
/// request context.
#[derive(Debug, Clone)]
pub struct NewJobCard {
    pub vehicle_id: String,
    pub customer_id: String,
    pub assigned_mechanic_id: Option<String>,
    pub date_received: NaiveDate,
    pub date_promised_completion: Option<NaiveDate>,
    pub customer_complaints: String,
    pub mechanic_findings: Option<String>,
    pub estimated_cost: Option<Money>,
    pub internal_notes: Option<String>,
    pub services: Vec<NewServiceLine>,
    pub parts: Vec<NewPartLine>,
    pub extras: Vec<NewExtraLine>,
}

/// Fully resolved creation input, shared by direct creation and quotation
/// conversion. Prices are settled; nothing left to look up but stock.
#[derive(Debug, Clone)]
pub(crate) struct JobCardDraft {
    pub branch_id: String,
    pub vehicle_id: String,
    pub customer_id: String,
    pub assigned_mechanic_id: Option<String>,
    pub status: JobCardStatus,
    pub date_received: NaiveDate,
    pub date_promised_completion: Option<NaiveDate>,
    pub customer_complaints: String,
    pub mechanic_findings: Option<String>,
    pub estimated_cost: Option<Money>,
    pub internal_notes: Option<String>,
    pub created_by_user_id: String,
    pub services: Vec<(NewServiceLine, Money)>,
    pub parts: Vec<(NewPartLine, Money)>,
    pub extras: Vec<NewExtraLine>,
}

// =============================================================================
// Read models
// =============================================================================

/// A labor line joined with its catalog name for display.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct JobCardServiceLine {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub line: JobCardService,
    pub service_name: String,
}

/// A part line joined with its catalog name and SKU for display.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct JobCardPartLine {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub line: JobCardPart,
    pub item_name: String,
    pub item_sku: String,
}

/// The fully joined view of one job card, ready for the rendering layer.
#[derive(Debug, Clone, Serialize)]
pub struct JobCardDocument {
    pub job_card: JobCard,
    pub branch_name: String,
    pub customer: Customer,
    pub vehicle: Vehicle,
    pub services: Vec<JobCardServiceLine>,
    pub parts: Vec<JobCardPartLine>,
    pub extras: Vec<JobCardExtra>,
}

/// One row in the job card listing.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct JobCardSummary {
    pub id: String,
    pub job_card_number: String,
    pub status: JobCardStatus,
    pub date_received: NaiveDate,
    pub customer_name: String,
    pub vehicle_make: String,
    pub vehicle_model: String,
    pub vehicle_license_plate: Option<String>,
    pub branch_name: String,
}

pub(crate) const JOB_CARD_COLUMNS: &str =
    "id, job_card_number, branch_id, vehicle_id, customer_id, assigned_mechanic_id, \
     status, date_received, date_promised_completion, date_actual_completion, \
     customer_complaints, mechanic_findings, estimated_cost, actual_cost, \
     payment_status, internal_notes, created_by_user_id, created_at, updated_at";

// =============================================================================
// Repository
// =============================================================================

/// Repository for job card database operations.
#[derive(Debug, Clone)]
pub struct JobCardRepository {
    pool: SqlitePool,
}

impl JobCardRepository {
    pub fn new(pool: SqlitePool) -> Self {
        JobCardRepository { pool }
    }

    /// Creates a job card with its service, part and extra lines.
    ///
    /// ## Preconditions (checked before the transaction opens)
    /// - the context carries a branch
    /// - customer complaints are non-empty
    /// - the vehicle belongs to the stated customer
    ///
    /// ## Atomicity
    /// Card, lines and stock decrements commit together or not at all. A
    /// part line exceeding on-hand stock fails the entire creation.
    pub async fn create(&self, ctx: &RequestContext, card: NewJobCard) -> DbResult<JobCard> {
        let branch_id = ctx.branch_id.clone().ok_or(ValidationError::Required {
            field: "branch_id".to_string(),
        })?;
        validate_required_text("customer_complaints", &card.customer_complaints, 4000)?;
        for line in &card.services {
            validate_quantity(line.quantity)?;
        }
        for line in &card.parts {
            validate_quantity(line.quantity_used)?;
        }
        for line in &card.extras {
            validate_required_text("description", &line.description, 500)?;
            validate_quantity(line.quantity)?;
            validate_price_cents(line.unit_price.cents())?;
        }

        // Referential sanity before anything is written
        let owner: Option<String> =
            sqlx::query_scalar("SELECT customer_id FROM vehicles WHERE id = ?1")
                .bind(&card.vehicle_id)
                .fetch_optional(&self.pool)
                .await?;
        match owner {
            None => return Err(DbError::not_found("Vehicle", &card.vehicle_id)),
            Some(owner) if owner != card.customer_id => {
                return Err(CoreError::ReferentialMismatch {
                    subject: "vehicle",
                    subject_id: card.vehicle_id.clone(),
                    owner: "customer",
                    owner_id: card.customer_id.clone(),
                }
                .into());
            }
            Some(_) => {}
        }

        let mut tx = self.pool.begin().await?;

        let services = resolve_service_prices(&mut tx, card.services).await?;
        let parts = resolve_part_prices(&mut tx, card.parts).await?;

        let draft = JobCardDraft {
            branch_id,
            vehicle_id: card.vehicle_id,
            customer_id: card.customer_id,
            assigned_mechanic_id: card.assigned_mechanic_id,
            status: JobCardStatus::PendingApproval,
            date_received: card.date_received,
            date_promised_completion: card.date_promised_completion,
            customer_complaints: card.customer_complaints,
            mechanic_findings: card.mechanic_findings,
            estimated_cost: card.estimated_cost,
            internal_notes: card.internal_notes,
            created_by_user_id: ctx.acting_user_id.clone(),
            services,
            parts,
            extras: card.extras,
        };

        let record = insert_job_card(&mut tx, draft).await?;
        tx.commit().await?;

        info!(id = %record.id, number = %record.job_card_number, "Job card created");
        Ok(record)
    }

    /// Gets a job card by ID.
    pub async fn find_by_id(&self, id: &str) -> DbResult<Option<JobCard>> {
        let sql = format!("SELECT {JOB_CARD_COLUMNS} FROM job_cards WHERE id = ?1");
        let card = sqlx::query_as::<_, JobCard>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(card)
    }

    /// Loads the fully joined view of one job card for display or printing.
    pub async fn find_document(&self, id: &str) -> DbResult<JobCardDocument> {
        let mut conn = self.pool.acquire().await?;

        let sql = format!("SELECT {JOB_CARD_COLUMNS} FROM job_cards WHERE id = ?1");
        let job_card = sqlx::query_as::<_, JobCard>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| DbError::not_found("Job card", id))?;

        let branch_name: String = sqlx::query_scalar("SELECT name FROM branches WHERE id = ?1")
            .bind(&job_card.branch_id)
            .fetch_one(&mut *conn)
            .await?;

        let customer = sqlx::query_as::<_, Customer>(
            "SELECT id, full_name, phone, email, address, company_name, tin_number, \
             vrn_number, created_at, updated_at FROM customers WHERE id = ?1",
        )
        .bind(&job_card.customer_id)
        .fetch_one(&mut *conn)
        .await?;

        let vehicle = sqlx::query_as::<_, Vehicle>(
            "SELECT id, customer_id, make, model, year, vin, license_plate, color, notes, \
             created_at, updated_at FROM vehicles WHERE id = ?1",
        )
        .bind(&job_card.vehicle_id)
        .fetch_one(&mut *conn)
        .await?;

        let services = fetch_service_lines(&mut conn, id).await?;
        let parts = fetch_part_lines(&mut conn, id).await?;
        let extras = fetch_extras(&mut conn, id).await?;

        Ok(JobCardDocument {
            job_card,
            branch_name,
            customer,
            vehicle,
            services,
            parts,
            extras,
        })
    }

    /// Lists job cards, newest first, scoped to the caller's branch.
    pub async fn list(
        &self,
        ctx: &RequestContext,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<JobCardSummary>> {
        const BASE: &str = "SELECT jc.id, jc.job_card_number, jc.status, jc.date_received, \
                            c.full_name AS customer_name, \
                            v.make AS vehicle_make, v.model AS vehicle_model, \
                            v.license_plate AS vehicle_license_plate, \
                            b.name AS branch_name \
                            FROM job_cards jc \
                            JOIN customers c ON jc.customer_id = c.id \
                            JOIN vehicles v ON jc.vehicle_id = v.id \
                            JOIN branches b ON jc.branch_id = b.id";

        let summaries = match ctx.branch_scope() {
            Some(branch) => {
                let sql = format!(
                    "{BASE} WHERE jc.branch_id = ?1 \
                     ORDER BY jc.date_received DESC, jc.created_at DESC LIMIT ?2 OFFSET ?3"
                );
                sqlx::query_as::<_, JobCardSummary>(&sql)
                    .bind(branch)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "{BASE} ORDER BY jc.date_received DESC, jc.created_at DESC \
                     LIMIT ?1 OFFSET ?2"
                );
                sqlx::query_as::<_, JobCardSummary>(&sql)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(summaries)
    }

    /// Moves a job card to a new status.
    ///
    /// Any status in the enumerated set is accepted from any other; the
    /// transition graph is advisory, not enforced. Transitioning to
    /// `completed` stamps the actual completion date.
    pub async fn update_status(&self, id: &str, status: JobCardStatus) -> DbResult<()> {
        debug!(id = %id, status = %status, "Updating job card status");

        let result = if status == JobCardStatus::Completed {
            sqlx::query(
                "UPDATE job_cards SET status = ?2, date_actual_completion = ?3, updated_at = ?4 \
                 WHERE id = ?1",
            )
            .bind(id)
            .bind(status)
            .bind(Utc::now().date_naive())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query("UPDATE job_cards SET status = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(id)
                .bind(status)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?
        };

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Job card", id));
        }

        Ok(())
    }

    /// Records the mechanic's findings on a job card.
    pub async fn record_findings(&self, id: &str, findings: &str) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE job_cards SET mechanic_findings = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(id)
                .bind(findings)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Job card", id));
        }

        Ok(())
    }

    /// Assigns a mechanic to a job card.
    pub async fn assign_mechanic(&self, id: &str, mechanic_user_id: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE job_cards SET assigned_mechanic_id = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(mechanic_user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Job card", id));
        }

        Ok(())
    }
}

// =============================================================================
// Shared insertion path
// =============================================================================

/// Resolves omitted service line prices from the catalog.
pub(crate) async fn resolve_service_prices(
    tx: &mut Transaction<'_, Sqlite>,
    lines: Vec<NewServiceLine>,
) -> DbResult<Vec<(NewServiceLine, Money)>> {
    let mut resolved = Vec::with_capacity(lines.len());
    for line in lines {
        let unit_price = match line.unit_price {
            Some(price) => {
                validate_price_cents(price.cents())?;
                price
            }
            None => sqlx::query_scalar::<_, Money>(
                "SELECT default_price FROM services WHERE id = ?1",
            )
            .bind(&line.service_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| DbError::not_found("Service", &line.service_id))?,
        };
        resolved.push((line, unit_price));
    }
    Ok(resolved)
}

/// Resolves omitted part line prices from the inventory.
pub(crate) async fn resolve_part_prices(
    tx: &mut Transaction<'_, Sqlite>,
    lines: Vec<NewPartLine>,
) -> DbResult<Vec<(NewPartLine, Money)>> {
    let mut resolved = Vec::with_capacity(lines.len());
    for line in lines {
        let unit_price = match line.unit_price {
            Some(price) => {
                validate_price_cents(price.cents())?;
                price
            }
            None => sqlx::query_scalar::<_, Money>(
                "SELECT unit_price FROM inventory_items WHERE id = ?1",
            )
            .bind(&line.inventory_item_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| DbError::not_found("Inventory item", &line.inventory_item_id))?,
        };
        resolved.push((line, unit_price));
    }
    Ok(resolved)
}

/// Inserts a job card with its lines and stock decrements on an open
/// transaction. Quotation conversion uses this same path so converted and
/// hand-entered cards behave identically.
pub(crate) async fn insert_job_card(
    tx: &mut Transaction<'_, Sqlite>,
    draft: JobCardDraft,
) -> DbResult<JobCard> {
    let code = numbering::branch_code(&mut *tx, &draft.branch_id).await?;
    let number = numbering::document_number("JC", &code);
    numbering::assert_number_free(&mut *tx, "job_cards", "job_card_number", &number).await?;

    let now = Utc::now();
    let record = JobCard {
        id: Uuid::new_v4().to_string(),
        job_card_number: number,
        branch_id: draft.branch_id,
        vehicle_id: draft.vehicle_id,
        customer_id: draft.customer_id,
        assigned_mechanic_id: draft.assigned_mechanic_id,
        status: draft.status,
        date_received: draft.date_received,
        date_promised_completion: draft.date_promised_completion,
        date_actual_completion: None,
        customer_complaints: draft.customer_complaints,
        mechanic_findings: draft.mechanic_findings,
        estimated_cost: draft.estimated_cost,
        actual_cost: None,
        payment_status: JobPaymentStatus::Unpaid,
        internal_notes: draft.internal_notes,
        created_by_user_id: draft.created_by_user_id,
        created_at: now,
        updated_at: now,
    };

    debug!(id = %record.id, number = %record.job_card_number, "Inserting job card");

    sqlx::query(
        r#"
        INSERT INTO job_cards (
            id, job_card_number, branch_id, vehicle_id, customer_id,
            assigned_mechanic_id, status, date_received, date_promised_completion,
            date_actual_completion, customer_complaints, mechanic_findings,
            estimated_cost, actual_cost, payment_status, internal_notes,
            created_by_user_id, created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
            ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19
        )
        "#,
    )
    .bind(&record.id)
    .bind(&record.job_card_number)
    .bind(&record.branch_id)
    .bind(&record.vehicle_id)
    .bind(&record.customer_id)
    .bind(&record.assigned_mechanic_id)
    .bind(record.status)
    .bind(record.date_received)
    .bind(record.date_promised_completion)
    .bind(record.date_actual_completion)
    .bind(&record.customer_complaints)
    .bind(&record.mechanic_findings)
    .bind(record.estimated_cost)
    .bind(record.actual_cost)
    .bind(record.payment_status)
    .bind(&record.internal_notes)
    .bind(&record.created_by_user_id)
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(&mut **tx)
    .await?;

    for (line, unit_price) in &draft.services {
        let total = unit_price.multiply_quantity(line.quantity);
        sqlx::query(
            r#"
            INSERT INTO job_card_services (
                id, job_card_id, service_id, description_override,
                quantity, unit_price, total_price, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&record.id)
        .bind(&line.service_id)
        .bind(&line.description_override)
        .bind(line.quantity)
        .bind(unit_price)
        .bind(total)
        .bind(&line.notes)
        .execute(&mut **tx)
        .await?;
    }

    for (line, unit_price) in &draft.parts {
        let total = unit_price.multiply_quantity(line.quantity_used);
        sqlx::query(
            r#"
            INSERT INTO job_card_parts (
                id, job_card_id, inventory_item_id, description_override,
                quantity_used, unit_price, total_price, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&record.id)
        .bind(&line.inventory_item_id)
        .bind(&line.description_override)
        .bind(line.quantity_used)
        .bind(unit_price)
        .bind(total)
        .bind(&line.notes)
        .execute(&mut **tx)
        .await?;

        // Consume stock; a failed guard aborts the whole creation
        apply_stock_delta(
            &mut *tx,
            &line.inventory_item_id,
            -line.quantity_used,
            "job_card_use",
        )
        .await?;
    }

    for line in &draft.extras {
        let total = line.unit_price.multiply_quantity(line.quantity);
        sqlx::query(
            r#"
            INSERT INTO job_card_extras (
                id, job_card_id, description, quantity, unit_price, total_price
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&record.id)
        .bind(&line.description)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(total)
        .execute(&mut **tx)
        .await?;
    }

    Ok(record)
}

// =============================================================================
// Line fetches (shared with the invoice repository)
// =============================================================================

pub(crate) async fn fetch_service_lines(
    conn: &mut SqliteConnection,
    job_card_id: &str,
) -> DbResult<Vec<JobCardServiceLine>> {
    let lines = sqlx::query_as::<_, JobCardServiceLine>(
        r#"
        SELECT jcs.id, jcs.job_card_id, jcs.service_id, jcs.description_override,
               jcs.quantity, jcs.unit_price, jcs.total_price, jcs.notes,
               s.name AS service_name
        FROM job_card_services jcs
        JOIN services s ON jcs.service_id = s.id
        WHERE jcs.job_card_id = ?1
        ORDER BY jcs.rowid
        "#,
    )
    .bind(job_card_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(lines)
}

pub(crate) async fn fetch_part_lines(
    conn: &mut SqliteConnection,
    job_card_id: &str,
) -> DbResult<Vec<JobCardPartLine>> {
    let lines = sqlx::query_as::<_, JobCardPartLine>(
        r#"
        SELECT jcp.id, jcp.job_card_id, jcp.inventory_item_id, jcp.description_override,
               jcp.quantity_used, jcp.unit_price, jcp.total_price, jcp.notes,
               i.name AS item_name, i.sku AS item_sku
        FROM job_card_parts jcp
        JOIN inventory_items i ON jcp.inventory_item_id = i.id
        WHERE jcp.job_card_id = ?1
        ORDER BY jcp.rowid
        "#,
    )
    .bind(job_card_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(lines)
}

pub(crate) async fn fetch_extras(
    conn: &mut SqliteConnection,
    job_card_id: &str,
) -> DbResult<Vec<JobCardExtra>> {
    let extras = sqlx::query_as::<_, JobCardExtra>(
        r#"
        SELECT id, job_card_id, description, quantity, unit_price, total_price
        FROM job_card_extras
        WHERE job_card_id = ?1
        ORDER BY rowid
        "#,
    )
    .bind(job_card_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(extras)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        date, seed_branch, seed_customer, seed_part, seed_service, seed_vehicle, staff_ctx, test_db,
    };

    fn basic_card(vehicle_id: &str, customer_id: &str) -> NewJobCard {
        NewJobCard {
            vehicle_id: vehicle_id.to_string(),
            customer_id: customer_id.to_string(),
            assigned_mechanic_id: None,
            date_received: date(2026, 8, 6),
            date_promised_completion: None,
            customer_complaints: "Engine knocking at idle".into(),
            mechanic_findings: None,
            estimated_cost: None,
            internal_notes: None,
            services: vec![],
            parts: vec![],
            extras: vec![],
        }
    }

    #[tokio::test]
    async fn test_create_with_lines_decrements_stock() {
        let db = test_db().await;
        let branch = seed_branch(&db).await;
        let customer = seed_customer(&db).await;
        let vehicle = seed_vehicle(&db, &customer.id).await;
        let service = seed_service(&db, "Engine diagnostics", 50_000).await;
        let part = seed_part(&db, "FLT-001", 1_500, 5).await;
        let ctx = staff_ctx(&branch.id);

        let mut card = basic_card(&vehicle.id, &customer.id);
        card.services.push(NewServiceLine {
            service_id: service.id.clone(),
            description_override: None,
            quantity: 1,
            unit_price: None,
            notes: None,
        });
        card.parts.push(NewPartLine {
            inventory_item_id: part.id.clone(),
            description_override: None,
            quantity_used: 3,
            unit_price: None,
            notes: None,
        });

        let created = db.job_cards().create(&ctx, card).await.unwrap();
        assert!(created.job_card_number.starts_with("JC-B01-"));
        assert_eq!(created.status, JobCardStatus::PendingApproval);

        // Stock went 5 → 2
        let item = db.inventory().find_by_id(&part.id).await.unwrap().unwrap();
        assert_eq!(item.quantity_on_hand, 2);

        let doc = db.job_cards().find_document(&created.id).await.unwrap();
        assert_eq!(doc.services.len(), 1);
        assert_eq!(doc.services[0].service_name, "Engine diagnostics");
        assert_eq!(doc.services[0].line.unit_price.cents(), 50_000);
        assert_eq!(doc.parts[0].line.total_price.cents(), 4_500);
        assert_eq!(doc.vehicle.id, vehicle.id);
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back_everything() {
        let db = test_db().await;
        let branch = seed_branch(&db).await;
        let customer = seed_customer(&db).await;
        let vehicle = seed_vehicle(&db, &customer.id).await;
        let part = seed_part(&db, "FLT-001", 1_500, 2).await;
        let ctx = staff_ctx(&branch.id);

        let mut card = basic_card(&vehicle.id, &customer.id);
        card.parts.push(NewPartLine {
            inventory_item_id: part.id.clone(),
            description_override: None,
            quantity_used: 10,
            unit_price: None,
            notes: None,
        });

        let result = db.job_cards().create(&ctx, card).await;
        assert!(matches!(
            result,
            Err(DbError::Domain(CoreError::InsufficientStock { .. }))
        ));

        // No orphaned card, stock untouched
        let cards = db.job_cards().list(&ctx, 10, 0).await.unwrap();
        assert!(cards.is_empty());
        let item = db.inventory().find_by_id(&part.id).await.unwrap().unwrap();
        assert_eq!(item.quantity_on_hand, 2);
    }

    #[tokio::test]
    async fn test_vehicle_owner_mismatch_rejected() {
        let db = test_db().await;
        let branch = seed_branch(&db).await;
        let customer = seed_customer(&db).await;
        let vehicle = seed_vehicle(&db, &customer.id).await;
        let ctx = staff_ctx(&branch.id);

        let stranger = db
            .customers()
            .create(crate::repository::customer::NewCustomer {
                full_name: "Juma K".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let card = basic_card(&vehicle.id, &stranger.id);
        let result = db.job_cards().create(&ctx, card).await;
        assert!(matches!(
            result,
            Err(DbError::Domain(CoreError::ReferentialMismatch { .. }))
        ));
    }

    #[tokio::test]
    async fn test_empty_complaints_rejected() {
        let db = test_db().await;
        let branch = seed_branch(&db).await;
        let customer = seed_customer(&db).await;
        let vehicle = seed_vehicle(&db, &customer.id).await;
        let ctx = staff_ctx(&branch.id);

        let mut card = basic_card(&vehicle.id, &customer.id);
        card.customer_complaints = "   ".into();

        let result = db.job_cards().create(&ctx, card).await;
        assert!(matches!(result, Err(DbError::Domain(_))));
    }

    #[tokio::test]
    async fn test_completing_stamps_actual_date() {
        let db = test_db().await;
        let branch = seed_branch(&db).await;
        let customer = seed_customer(&db).await;
        let vehicle = seed_vehicle(&db, &customer.id).await;
        let ctx = staff_ctx(&branch.id);

        let created = db
            .job_cards()
            .create(&ctx, basic_card(&vehicle.id, &customer.id))
            .await
            .unwrap();
        assert!(created.date_actual_completion.is_none());

        db.job_cards()
            .update_status(&created.id, JobCardStatus::Completed)
            .await
            .unwrap();

        let card = db
            .job_cards()
            .find_by_id(&created.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(card.status, JobCardStatus::Completed);
        assert!(card.date_actual_completion.is_some());
    }

    #[tokio::test]
    async fn test_findings_and_mechanic_assignment() {
        let db = test_db().await;
        let branch = seed_branch(&db).await;
        let customer = seed_customer(&db).await;
        let vehicle = seed_vehicle(&db, &customer.id).await;
        let ctx = staff_ctx(&branch.id);

        let created = db
            .job_cards()
            .create(&ctx, basic_card(&vehicle.id, &customer.id))
            .await
            .unwrap();

        db.job_cards()
            .assign_mechanic(&created.id, "mechanic-7")
            .await
            .unwrap();
        db.job_cards()
            .record_findings(&created.id, "Worn big-end bearings, sump debris")
            .await
            .unwrap();

        let card = db
            .job_cards()
            .find_by_id(&created.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(card.assigned_mechanic_id.as_deref(), Some("mechanic-7"));
        assert!(card.mechanic_findings.unwrap().contains("bearings"));
    }

    #[tokio::test]
    async fn test_list_scopes_to_branch() {
        let db = test_db().await;
        let branch = seed_branch(&db).await;
        let other_branch = db
            .branches()
            .create(crate::repository::branch::NewBranch {
                code: "02".into(),
                name: "Arusha".into(),
                address: None,
                phone: None,
            })
            .await
            .unwrap();
        let customer = seed_customer(&db).await;
        let vehicle = seed_vehicle(&db, &customer.id).await;

        db.job_cards()
            .create(&staff_ctx(&branch.id), basic_card(&vehicle.id, &customer.id))
            .await
            .unwrap();

        let own = db.job_cards().list(&staff_ctx(&branch.id), 10, 0).await.unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].customer_name, "Asha Mwinyi");

        let elsewhere = db
            .job_cards()
            .list(&staff_ctx(&other_branch.id), 10, 0)
            .await
            .unwrap();
        assert!(elsewhere.is_empty());

        // System admins see everything
        let admin = workshop_core::RequestContext::new("root", None, workshop_core::Role::SystemAdmin);
        let all = db.job_cards().list(&admin, 10, 0).await.unwrap();
        assert_eq!(all.len(), 1);
    }
}
