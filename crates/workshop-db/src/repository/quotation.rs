//! # Quotation Repository
//!
//! Database operations for quotations and their conversion into job cards.
//!
//! ## Quotation Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Quotation Lifecycle                                 │
//! │                                                                         │
//! │  1. CREATE (one transaction)                                           │
//! │     ├── resolve line descriptions/prices from the catalog              │
//! │     ├── compute sub_total/discount/tax/total                           │
//! │     └── insert quotation + ordered items                               │
//! │                                                                         │
//! │  2. CUSTOMER DECISION                                                  │
//! │     └── update_status: draft → sent → accepted | rejected | expired    │
//! │                                                                         │
//! │  3. CONVERSION (accepted only, one transaction)                        │
//! │     ├── service lines → job card services                              │
//! │     ├── part lines    → job card parts (stock decremented)             │
//! │     ├── misc lines    → job card extra charges                         │
//! │     └── job_card_id written back; the link is permanent and the        │
//! │         conversion idempotent                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::numbering;
use crate::repository::job_card::{
    insert_job_card, JobCardDraft, NewExtraLine, NewPartLine, NewServiceLine,
};
use crate::repository::lines::{resolve_line, DocumentLine};
use workshop_core::validation::{validate_line_count, validate_rate_bps};
use workshop_core::{
    calculate_totals, CoreError, Customer, DiscountSpec, ItemKind, JobCardStatus, Money,
    Quotation, QuotationItem, QuotationStatus, RateBps, RequestContext, ValidationError, Vehicle,
};

// =============================================================================
// Inputs
// =============================================================================

/// Input for creating a quotation. The branch and creator come from the
/// request context.
#[derive(Debug, Clone)]
pub struct NewQuotation {
    pub customer_id: String,
    pub vehicle_id: Option<String>,
    pub date_issued: NaiveDate,
    pub valid_until_date: Option<NaiveDate>,
    pub discount_percent_bps: RateBps,
    pub tax_rate_bps: RateBps,
    pub terms_and_conditions: Option<String>,
    pub notes: Option<String>,
    pub lines: Vec<DocumentLine>,
}

// =============================================================================
// Read models
// =============================================================================

/// The fully joined view of one quotation for display or printing.
#[derive(Debug, Clone, Serialize)]
pub struct QuotationDocument {
    pub quotation: Quotation,
    pub branch_name: String,
    pub customer: Customer,
    pub vehicle: Option<Vehicle>,
    pub items: Vec<QuotationItem>,
}

/// One row in the quotation listing.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct QuotationSummary {
    pub id: String,
    pub quotation_number: String,
    pub status: QuotationStatus,
    pub date_issued: NaiveDate,
    pub total_amount: Money,
    pub customer_name: String,
    pub branch_name: String,
}

pub(crate) const QUOTATION_COLUMNS: &str =
    "id, quotation_number, branch_id, customer_id, vehicle_id, date_issued, \
     valid_until_date, status, sub_total, discount_percent_bps, discount_amount, \
     tax_rate_bps, tax_amount, total_amount, terms_and_conditions, notes, \
     created_by_user_id, job_card_id, created_at, updated_at";

// =============================================================================
// Repository
// =============================================================================

/// Repository for quotation database operations.
#[derive(Debug, Clone)]
pub struct QuotationRepository {
    pool: SqlitePool,
}

impl QuotationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        QuotationRepository { pool }
    }

    /// Creates a quotation with its items.
    ///
    /// Totals are computed from the resolved lines and persisted as a
    /// snapshot. Quotation and items insert in one transaction.
    pub async fn create(
        &self,
        ctx: &RequestContext,
        quotation: NewQuotation,
    ) -> DbResult<Quotation> {
        let branch_id = ctx.branch_id.clone().ok_or(ValidationError::Required {
            field: "branch_id".to_string(),
        })?;
        validate_line_count(quotation.lines.len())?;
        validate_rate_bps(quotation.discount_percent_bps.bps())?;
        validate_rate_bps(quotation.tax_rate_bps.bps())?;

        let mut tx = self.pool.begin().await?;

        let mut resolved = Vec::with_capacity(quotation.lines.len());
        for line in quotation.lines {
            resolved.push(resolve_line(&mut tx, line).await?);
        }

        let amounts: Vec<_> = resolved.iter().map(|line| line.amount()).collect();
        let totals = calculate_totals(
            &amounts,
            DiscountSpec::Percentage(quotation.discount_percent_bps),
            quotation.tax_rate_bps,
        );

        let code = numbering::branch_code(&mut tx, &branch_id).await?;
        let number = numbering::document_number("QT", &code);
        numbering::assert_number_free(&mut tx, "quotations", "quotation_number", &number).await?;

        let now = Utc::now();
        let record = Quotation {
            id: Uuid::new_v4().to_string(),
            quotation_number: number,
            branch_id,
            customer_id: quotation.customer_id,
            vehicle_id: quotation.vehicle_id,
            date_issued: quotation.date_issued,
            valid_until_date: quotation.valid_until_date,
            status: QuotationStatus::Draft,
            sub_total: totals.sub_total,
            discount_percent_bps: quotation.discount_percent_bps,
            discount_amount: totals.discount_amount,
            tax_rate_bps: quotation.tax_rate_bps,
            tax_amount: totals.tax_amount,
            total_amount: totals.total_amount,
            terms_and_conditions: quotation.terms_and_conditions,
            notes: quotation.notes,
            created_by_user_id: ctx.acting_user_id.clone(),
            job_card_id: None,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %record.id, number = %record.quotation_number, "Inserting quotation");

        sqlx::query(
            r#"
            INSERT INTO quotations (
                id, quotation_number, branch_id, customer_id, vehicle_id,
                date_issued, valid_until_date, status, sub_total,
                discount_percent_bps, discount_amount, tax_rate_bps, tax_amount,
                total_amount, terms_and_conditions, notes, created_by_user_id,
                job_card_id, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20
            )
            "#,
        )
        .bind(&record.id)
        .bind(&record.quotation_number)
        .bind(&record.branch_id)
        .bind(&record.customer_id)
        .bind(&record.vehicle_id)
        .bind(record.date_issued)
        .bind(record.valid_until_date)
        .bind(record.status)
        .bind(record.sub_total)
        .bind(record.discount_percent_bps)
        .bind(record.discount_amount)
        .bind(record.tax_rate_bps)
        .bind(record.tax_amount)
        .bind(record.total_amount)
        .bind(&record.terms_and_conditions)
        .bind(&record.notes)
        .bind(&record.created_by_user_id)
        .bind(&record.job_card_id)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *tx)
        .await?;

        for (position, line) in resolved.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO quotation_items (
                    id, quotation_id, item_type, catalog_id, description,
                    quantity, unit_price, total_price, position
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&record.id)
            .bind(line.kind)
            .bind(&line.catalog_id)
            .bind(&line.description)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.total())
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            id = %record.id,
            number = %record.quotation_number,
            total = %record.total_amount,
            "Quotation created"
        );
        Ok(record)
    }

    /// Gets a quotation by ID.
    pub async fn find_by_id(&self, id: &str) -> DbResult<Option<Quotation>> {
        let sql = format!("SELECT {QUOTATION_COLUMNS} FROM quotations WHERE id = ?1");
        let quotation = sqlx::query_as::<_, Quotation>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(quotation)
    }

    /// Loads the fully joined view of one quotation.
    pub async fn find_document(&self, id: &str) -> DbResult<QuotationDocument> {
        let mut conn = self.pool.acquire().await?;

        let sql = format!("SELECT {QUOTATION_COLUMNS} FROM quotations WHERE id = ?1");
        let quotation = sqlx::query_as::<_, Quotation>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| DbError::not_found("Quotation", id))?;

        let branch_name: String = sqlx::query_scalar("SELECT name FROM branches WHERE id = ?1")
            .bind(&quotation.branch_id)
            .fetch_one(&mut *conn)
            .await?;

        let customer = sqlx::query_as::<_, Customer>(
            "SELECT id, full_name, phone, email, address, company_name, tin_number, \
             vrn_number, created_at, updated_at FROM customers WHERE id = ?1",
        )
        .bind(&quotation.customer_id)
        .fetch_one(&mut *conn)
        .await?;

        let vehicle = match quotation.vehicle_id.as_deref() {
            Some(vehicle_id) => {
                sqlx::query_as::<_, Vehicle>(
                    "SELECT id, customer_id, make, model, year, vin, license_plate, color, \
                     notes, created_at, updated_at FROM vehicles WHERE id = ?1",
                )
                .bind(vehicle_id)
                .fetch_optional(&mut *conn)
                .await?
            }
            None => None,
        };

        let items = fetch_items(&mut conn, id).await?;

        Ok(QuotationDocument {
            quotation,
            branch_name,
            customer,
            vehicle,
            items,
        })
    }

    /// Lists quotations, newest first, scoped to the caller's branch.
    pub async fn list(
        &self,
        ctx: &RequestContext,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<QuotationSummary>> {
        const BASE: &str = "SELECT q.id, q.quotation_number, q.status, q.date_issued, \
                            q.total_amount, c.full_name AS customer_name, b.name AS branch_name \
                            FROM quotations q \
                            JOIN customers c ON q.customer_id = c.id \
                            JOIN branches b ON q.branch_id = b.id";

        let summaries = match ctx.branch_scope() {
            Some(branch) => {
                let sql = format!(
                    "{BASE} WHERE q.branch_id = ?1 \
                     ORDER BY q.date_issued DESC, q.created_at DESC LIMIT ?2 OFFSET ?3"
                );
                sqlx::query_as::<_, QuotationSummary>(&sql)
                    .bind(branch)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "{BASE} ORDER BY q.date_issued DESC, q.created_at DESC LIMIT ?1 OFFSET ?2"
                );
                sqlx::query_as::<_, QuotationSummary>(&sql)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(summaries)
    }

    /// Moves a quotation to a new status. Any status in the enumerated set
    /// is accepted from any other; the transition graph is advisory.
    pub async fn update_status(&self, id: &str, status: QuotationStatus) -> DbResult<()> {
        debug!(id = %id, status = %status, "Updating quotation status");

        let result =
            sqlx::query("UPDATE quotations SET status = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(id)
                .bind(status)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Quotation", id));
        }

        Ok(())
    }

    /// Converts an accepted quotation into a job card.
    ///
    /// ## Preconditions
    /// - status is `accepted`
    /// - a vehicle is attached (a job card is always written against one)
    ///
    /// ## Idempotency
    /// Converting an already-converted quotation returns the existing job
    /// card id without creating anything.
    ///
    /// ## What carries over
    /// Service and part lines copy one-to-one (parts consume stock); misc
    /// lines become job card extra charges, so nothing the customer agreed
    /// to is lost. The job card starts approved with the quotation total as
    /// its estimated cost.
    pub async fn convert_to_job_card(
        &self,
        ctx: &RequestContext,
        quotation_id: &str,
    ) -> DbResult<String> {
        let quotation = self
            .find_by_id(quotation_id)
            .await?
            .ok_or_else(|| DbError::not_found("Quotation", quotation_id))?;

        if let Some(existing) = quotation.job_card_id {
            info!(
                quotation_id = %quotation_id,
                job_card_id = %existing,
                "Quotation already converted"
            );
            return Ok(existing);
        }

        if quotation.status != QuotationStatus::Accepted {
            return Err(CoreError::InvalidDocumentState {
                entity: "quotation",
                id: quotation_id.to_string(),
                status: quotation.status.to_string(),
                operation: "convert to job card",
            }
            .into());
        }

        let vehicle_id = quotation
            .vehicle_id
            .clone()
            .ok_or(ValidationError::Required {
                field: "vehicle_id".to_string(),
            })?;

        let mut conn = self.pool.acquire().await?;
        let items = fetch_items(&mut conn, quotation_id).await?;
        drop(conn);

        let mut services = Vec::new();
        let mut parts = Vec::new();
        let mut extras = Vec::new();
        for item in items {
            match item.kind {
                ItemKind::Service => {
                    let service_id = item.catalog_id.ok_or_else(|| {
                        DbError::Internal(format!("quotation item {} has no catalog id", item.id))
                    })?;
                    services.push((
                        NewServiceLine {
                            service_id,
                            description_override: Some(item.description),
                            quantity: item.quantity,
                            unit_price: Some(item.unit_price),
                            notes: None,
                        },
                        item.unit_price,
                    ));
                }
                ItemKind::Part => {
                    let inventory_item_id = item.catalog_id.ok_or_else(|| {
                        DbError::Internal(format!("quotation item {} has no catalog id", item.id))
                    })?;
                    parts.push((
                        NewPartLine {
                            inventory_item_id,
                            description_override: Some(item.description),
                            quantity_used: item.quantity,
                            unit_price: Some(item.unit_price),
                            notes: None,
                        },
                        item.unit_price,
                    ));
                }
                ItemKind::Misc => {
                    extras.push(NewExtraLine {
                        description: item.description,
                        quantity: item.quantity,
                        unit_price: item.unit_price,
                    });
                }
            }
        }

        let complaints = match quotation.notes.as_deref() {
            Some(notes) if !notes.is_empty() => format!(
                "Work as per Quotation #{}.\n{}",
                quotation.quotation_number, notes
            ),
            _ => format!("Work as per Quotation #{}.", quotation.quotation_number),
        };

        let draft = JobCardDraft {
            branch_id: quotation.branch_id.clone(),
            vehicle_id,
            customer_id: quotation.customer_id.clone(),
            assigned_mechanic_id: None,
            // The customer already accepted the quote; the card starts approved
            status: JobCardStatus::Approved,
            date_received: Utc::now().date_naive(),
            date_promised_completion: None,
            customer_complaints: complaints,
            mechanic_findings: None,
            estimated_cost: Some(quotation.total_amount),
            internal_notes: None,
            created_by_user_id: ctx.acting_user_id.clone(),
            services,
            parts,
            extras,
        };

        let mut tx = self.pool.begin().await?;
        let job_card = insert_job_card(&mut tx, draft).await?;

        // The guard on job_card_id makes a racing second conversion fail
        // instead of linking two cards to one quotation
        let linked = sqlx::query(
            "UPDATE quotations SET job_card_id = ?2, updated_at = ?3 \
             WHERE id = ?1 AND job_card_id IS NULL",
        )
        .bind(quotation_id)
        .bind(&job_card.id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        if linked.rows_affected() == 0 {
            return Err(DbError::ConcurrentUpdate {
                entity: "Quotation".to_string(),
                id: quotation_id.to_string(),
            });
        }

        tx.commit().await?;

        info!(
            quotation_id = %quotation_id,
            job_card_id = %job_card.id,
            number = %job_card.job_card_number,
            "Quotation converted to job card"
        );
        Ok(job_card.id)
    }
}

// =============================================================================
// Helpers
// =============================================================================

pub(crate) async fn fetch_items(
    conn: &mut SqliteConnection,
    quotation_id: &str,
) -> DbResult<Vec<QuotationItem>> {
    let items = sqlx::query_as::<_, QuotationItem>(
        r#"
        SELECT id, quotation_id, item_type AS kind, catalog_id, description,
               quantity, unit_price, total_price, position
        FROM quotation_items
        WHERE quotation_id = ?1
        ORDER BY position
        "#,
    )
    .bind(quotation_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

// =============================================================================
// Unit Tests
// =============================================================================
