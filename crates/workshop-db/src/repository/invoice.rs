//! # Invoice Repository
//!
//! Database operations for invoices and payments.
//!
//! ## Invoice Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Invoice Lifecycle                                  │
//! │                                                                         │
//! │  1. CREATE (one transaction)                                           │
//! │     ├── from a job card (completed or further) - snapshots its lines,  │
//! │     │   moves the card to `invoiced`, backfills actual_cost once       │
//! │     ├── from an accepted quotation - snapshots its items               │
//! │     └── standalone - lines given explicitly                            │
//! │     At most one live invoice per source: an existing non-cancelled,    │
//! │     non-void invoice short-circuits creation instead of duplicating.   │
//! │                                                                         │
//! │  2. PAYMENTS (one transaction each)                                    │
//! │     ├── immutable payment row appended                                 │
//! │     ├── amount_paid grows, balance_due is schema-derived               │
//! │     ├── status → partially_paid → paid as the balance reaches zero     │
//! │     └── full payment cascades the linked job card to `paid`            │
//! │                                                                         │
//! │  3. TERMINAL: paid | cancelled | void                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::numbering;
use crate::repository::job_card::{
    fetch_extras, fetch_part_lines, fetch_service_lines, JOB_CARD_COLUMNS,
};
use crate::repository::lines::{resolve_line, DocumentLine, ResolvedLine};
use crate::repository::quotation::{fetch_items as fetch_quotation_items, QUOTATION_COLUMNS};
use workshop_core::validation::{validate_line_count, validate_payment_amount, validate_rate_bps};
use workshop_core::{
    calculate_totals, CoreError, Customer, DiscountSpec, DiscountType, Invoice, InvoiceItem,
    InvoiceStatus, ItemKind, JobCard, JobCardStatus, JobPaymentStatus, Money, Payment,
    PaymentMethod, Quotation, QuotationStatus, RateBps, RequestContext, ValidationError,
};

// =============================================================================
// Inputs
// =============================================================================

/// Billing terms applied at invoice creation.
#[derive(Debug, Clone)]
pub struct InvoiceTerms {
    pub date_issued: NaiveDate,
    pub date_due: Option<NaiveDate>,
    pub discount: DiscountSpec,
    pub tax_rate_bps: RateBps,
    pub payment_terms: Option<String>,
    pub notes_to_customer: Option<String>,
    pub internal_notes: Option<String>,
}

impl InvoiceTerms {
    /// Plain terms: no discount, no tax, due on receipt.
    pub fn bare(date_issued: NaiveDate) -> Self {
        InvoiceTerms {
            date_issued,
            date_due: None,
            discount: DiscountSpec::None,
            tax_rate_bps: RateBps::zero(),
            payment_terms: Some("Payment due upon receipt.".to_string()),
            notes_to_customer: None,
            internal_notes: None,
        }
    }

    fn validate(&self) -> DbResult<()> {
        validate_rate_bps(self.tax_rate_bps.bps())?;
        if let DiscountSpec::Percentage(rate) = self.discount {
            validate_rate_bps(rate.bps())?;
        }
        Ok(())
    }
}

/// Input for a standalone invoice (no source document).
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub customer_id: String,
    pub terms: InvoiceTerms,
    pub lines: Vec<DocumentLine>,
}

/// Input for recording one payment against an invoice.
#[derive(Debug, Clone)]
pub struct PaymentInput {
    pub amount: Money,
    pub payment_date: NaiveDate,
    pub method: PaymentMethod,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
}

/// Everything needed to write an invoice row; built by the three creation
/// paths, inserted by one shared routine.
struct InvoiceDraft {
    branch_id: String,
    customer_id: String,
    job_card_id: Option<String>,
    quotation_id: Option<String>,
    terms: InvoiceTerms,
    lines: Vec<ResolvedLine>,
    created_by_user_id: String,
}

// =============================================================================
// Outcomes
// =============================================================================

/// Result of an invoice creation request against a source document.
#[derive(Debug, Clone)]
pub enum InvoiceOutcome {
    /// A fresh invoice was created.
    Created(Invoice),
    /// The source already had a live invoice; here it is instead.
    AlreadyInvoiced(Invoice),
}

impl InvoiceOutcome {
    pub fn invoice(&self) -> &Invoice {
        match self {
            InvoiceOutcome::Created(invoice) => invoice,
            InvoiceOutcome::AlreadyInvoiced(invoice) => invoice,
        }
    }
}

/// Result of a payment request.
#[derive(Debug, Clone)]
pub enum PaymentOutcome {
    /// The payment was applied.
    Applied {
        payment: Payment,
        invoice_status: InvoiceStatus,
        amount_paid: Money,
        balance_due: Money,
    },
    /// The invoice had no outstanding balance; nothing was written.
    AlreadySettled,
}

// =============================================================================
// Read models
// =============================================================================

/// The fully joined view of one invoice for display or printing.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDocument {
    pub invoice: Invoice,
    pub branch_name: String,
    pub customer: Customer,
    pub job_card_number: Option<String>,
    pub quotation_number: Option<String>,
    pub items: Vec<InvoiceItem>,
    pub payments: Vec<Payment>,
}

/// One row in the invoice listing.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct InvoiceSummary {
    pub id: String,
    pub invoice_number: String,
    pub status: InvoiceStatus,
    pub date_issued: NaiveDate,
    pub total_amount: Money,
    pub balance_due: Money,
    pub customer_name: String,
    pub branch_name: String,
}

pub(crate) const INVOICE_COLUMNS: &str =
    "id, invoice_number, job_card_id, quotation_id, branch_id, customer_id, \
     date_issued, date_due, status, sub_total, discount_type, discount_value, \
     discount_amount, tax_rate_bps, tax_amount, total_amount, amount_paid, \
     balance_due, payment_terms, notes_to_customer, internal_notes, \
     created_by_user_id, created_at, updated_at";

// =============================================================================
// Repository
// =============================================================================

/// Repository for invoice and payment database operations.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// Creates an invoice from a job card.
    ///
    /// The card must be completed (or already invoiced/paid). Its service,
    /// part and extra lines are snapshotted as invoice items. In the same
    /// transaction the card moves to `invoiced` and its actual_cost is
    /// backfilled with the invoice total, but only if no actual cost was
    /// recorded before.
    pub async fn create_from_job_card(
        &self,
        ctx: &RequestContext,
        job_card_id: &str,
        terms: InvoiceTerms,
    ) -> DbResult<InvoiceOutcome> {
        terms.validate()?;

        let sql = format!("SELECT {JOB_CARD_COLUMNS} FROM job_cards WHERE id = ?1");
        let job_card = sqlx::query_as::<_, JobCard>(&sql)
            .bind(job_card_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Job card", job_card_id))?;

        if !job_card.status.is_invoiceable() {
            return Err(CoreError::InvalidDocumentState {
                entity: "job card",
                id: job_card_id.to_string(),
                status: job_card.status.to_string(),
                operation: "create an invoice",
            }
            .into());
        }

        if let Some(existing) = self.find_live_by_job_card(job_card_id).await? {
            info!(
                job_card_id = %job_card_id,
                invoice_number = %existing.invoice_number,
                "Job card already invoiced"
            );
            return Ok(InvoiceOutcome::AlreadyInvoiced(existing));
        }

        let mut conn = self.pool.acquire().await?;
        let services = fetch_service_lines(&mut conn, job_card_id).await?;
        let parts = fetch_part_lines(&mut conn, job_card_id).await?;
        let extras = fetch_extras(&mut conn, job_card_id).await?;
        drop(conn);

        let mut lines = Vec::new();
        for service in services {
            lines.push(ResolvedLine {
                kind: ItemKind::Service,
                catalog_id: Some(service.line.service_id),
                description: service
                    .line
                    .description_override
                    .unwrap_or(service.service_name),
                quantity: service.line.quantity,
                unit_price: service.line.unit_price,
            });
        }
        for part in parts {
            lines.push(ResolvedLine {
                kind: ItemKind::Part,
                catalog_id: Some(part.line.inventory_item_id),
                description: part.line.description_override.unwrap_or(part.item_name),
                quantity: part.line.quantity_used,
                unit_price: part.line.unit_price,
            });
        }
        for extra in extras {
            lines.push(ResolvedLine {
                kind: ItemKind::Misc,
                catalog_id: None,
                description: extra.description,
                quantity: extra.quantity,
                unit_price: extra.unit_price,
            });
        }
        validate_line_count(lines.len())?;

        let draft = InvoiceDraft {
            branch_id: job_card.branch_id.clone(),
            customer_id: job_card.customer_id.clone(),
            job_card_id: Some(job_card_id.to_string()),
            quotation_id: None,
            terms,
            lines,
            created_by_user_id: ctx.acting_user_id.clone(),
        };

        let mut tx = self.pool.begin().await?;
        let invoice = insert_invoice(&mut tx, draft).await?;

        sqlx::query("UPDATE job_cards SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(job_card_id)
            .bind(JobCardStatus::Invoiced)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        // First invoice fixes the actual cost; later corrections never
        // overwrite a value someone already recorded
        sqlx::query("UPDATE job_cards SET actual_cost = ?2 WHERE id = ?1 AND actual_cost IS NULL")
            .bind(job_card_id)
            .bind(invoice.total_amount)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            invoice_id = %invoice.id,
            number = %invoice.invoice_number,
            job_card_id = %job_card_id,
            "Invoice created from job card"
        );
        Ok(InvoiceOutcome::Created(invoice))
    }

    /// Creates an invoice from an accepted quotation.
    ///
    /// If the quotation was converted to a job card, the dedupe check runs
    /// against that job card's invoice; otherwise against invoices linked
    /// directly to the quotation.
    pub async fn create_from_quotation(
        &self,
        ctx: &RequestContext,
        quotation_id: &str,
        terms: InvoiceTerms,
    ) -> DbResult<InvoiceOutcome> {
        terms.validate()?;

        let sql = format!("SELECT {QUOTATION_COLUMNS} FROM quotations WHERE id = ?1");
        let quotation = sqlx::query_as::<_, Quotation>(&sql)
            .bind(quotation_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Quotation", quotation_id))?;

        if quotation.status != QuotationStatus::Accepted {
            return Err(CoreError::InvalidDocumentState {
                entity: "quotation",
                id: quotation_id.to_string(),
                status: quotation.status.to_string(),
                operation: "create an invoice",
            }
            .into());
        }

        let existing = match quotation.job_card_id.as_deref() {
            Some(job_card_id) => self.find_live_by_job_card(job_card_id).await?,
            None => self.find_live_by_quotation(quotation_id).await?,
        };
        if let Some(existing) = existing {
            info!(
                quotation_id = %quotation_id,
                invoice_number = %existing.invoice_number,
                "Quotation already invoiced"
            );
            return Ok(InvoiceOutcome::AlreadyInvoiced(existing));
        }

        let mut conn = self.pool.acquire().await?;
        let items = fetch_quotation_items(&mut conn, quotation_id).await?;
        drop(conn);

        let lines: Vec<ResolvedLine> = items
            .into_iter()
            .map(|item| ResolvedLine {
                kind: item.kind,
                catalog_id: item.catalog_id,
                description: item.description,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect();
        validate_line_count(lines.len())?;

        let draft = InvoiceDraft {
            branch_id: quotation.branch_id.clone(),
            customer_id: quotation.customer_id.clone(),
            job_card_id: None,
            quotation_id: Some(quotation_id.to_string()),
            terms,
            lines,
            created_by_user_id: ctx.acting_user_id.clone(),
        };

        let mut tx = self.pool.begin().await?;
        let invoice = insert_invoice(&mut tx, draft).await?;
        tx.commit().await?;

        info!(
            invoice_id = %invoice.id,
            number = %invoice.invoice_number,
            quotation_id = %quotation_id,
            "Invoice created from quotation"
        );
        Ok(InvoiceOutcome::Created(invoice))
    }

    /// Creates a standalone invoice from explicitly given lines.
    pub async fn create(&self, ctx: &RequestContext, invoice: NewInvoice) -> DbResult<Invoice> {
        let branch_id = ctx.branch_id.clone().ok_or(ValidationError::Required {
            field: "branch_id".to_string(),
        })?;
        validate_line_count(invoice.lines.len())?;
        invoice.terms.validate()?;

        let mut tx = self.pool.begin().await?;

        let mut lines = Vec::with_capacity(invoice.lines.len());
        for line in invoice.lines {
            lines.push(resolve_line(&mut tx, line).await?);
        }

        let draft = InvoiceDraft {
            branch_id,
            customer_id: invoice.customer_id,
            job_card_id: None,
            quotation_id: None,
            terms: invoice.terms,
            lines,
            created_by_user_id: ctx.acting_user_id.clone(),
        };

        let record = insert_invoice(&mut tx, draft).await?;
        tx.commit().await?;

        info!(id = %record.id, number = %record.invoice_number, "Invoice created");
        Ok(record)
    }

    /// Records a payment against an invoice.
    ///
    /// ## Preconditions
    /// - amount is positive
    /// - amount does not exceed the outstanding balance
    /// - the invoice has an outstanding balance (else `AlreadySettled`)
    ///
    /// ## Atomicity and concurrency
    /// Payment row, invoice update and job card cascade commit together.
    /// The invoice update is guarded on the amount_paid value read inside
    /// the transaction, so of two racing payments exactly one applies and
    /// the other fails with ConcurrentUpdate instead of silently losing an
    /// update.
    pub async fn record_payment(
        &self,
        ctx: &RequestContext,
        invoice_id: &str,
        input: PaymentInput,
    ) -> DbResult<PaymentOutcome> {
        validate_payment_amount(input.amount.cents())?;

        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1");
        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(invoice_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", invoice_id))?;

        if invoice.is_settled() {
            debug!(invoice_id = %invoice_id, "Invoice already settled, payment is a no-op");
            return Ok(PaymentOutcome::AlreadySettled);
        }

        if input.amount > invoice.balance_due {
            return Err(ValidationError::ExceedsLimit {
                field: "payment amount".to_string(),
                limit: format!("balance due {}", invoice.balance_due),
            }
            .into());
        }

        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            invoice_id: invoice_id.to_string(),
            payment_date: input.payment_date,
            amount: input.amount,
            method: input.method,
            reference_number: input.reference_number,
            notes: input.notes,
            processed_by_user_id: ctx.acting_user_id.clone(),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, invoice_id, payment_date, amount, method,
                reference_number, notes, processed_by_user_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.invoice_id)
        .bind(payment.payment_date)
        .bind(payment.amount)
        .bind(payment.method)
        .bind(&payment.reference_number)
        .bind(&payment.notes)
        .bind(&payment.processed_by_user_id)
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await?;

        let new_amount_paid = invoice.amount_paid + input.amount;
        let new_balance = invoice.total_amount - new_amount_paid;
        let new_status = if new_balance.cents() <= 0 {
            InvoiceStatus::Paid
        } else {
            InvoiceStatus::PartiallyPaid
        };

        // Optimistic guard: apply only if nobody changed amount_paid since
        // our read above
        let updated = sqlx::query(
            "UPDATE invoices SET amount_paid = ?2, status = ?3, updated_at = ?4 \
             WHERE id = ?1 AND amount_paid = ?5",
        )
        .bind(invoice_id)
        .bind(new_amount_paid)
        .bind(new_status)
        .bind(Utc::now())
        .bind(invoice.amount_paid)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(DbError::ConcurrentUpdate {
                entity: "Invoice".to_string(),
                id: invoice_id.to_string(),
            });
        }

        if let Some(job_card_id) = invoice.job_card_id.as_deref() {
            match new_status {
                InvoiceStatus::Paid => {
                    sqlx::query(
                        "UPDATE job_cards SET status = ?2, payment_status = ?3, updated_at = ?4 \
                         WHERE id = ?1",
                    )
                    .bind(job_card_id)
                    .bind(JobCardStatus::Paid)
                    .bind(JobPaymentStatus::Paid)
                    .bind(Utc::now())
                    .execute(&mut *tx)
                    .await?;
                }
                _ => {
                    sqlx::query(
                        "UPDATE job_cards SET payment_status = ?2, updated_at = ?3 WHERE id = ?1",
                    )
                    .bind(job_card_id)
                    .bind(JobPaymentStatus::PartiallyPaid)
                    .bind(Utc::now())
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await?;

        info!(
            invoice_id = %invoice_id,
            payment_id = %payment.id,
            amount = %payment.amount,
            amount_paid = %new_amount_paid,
            balance_due = %new_balance,
            status = %new_status,
            "Payment recorded"
        );

        Ok(PaymentOutcome::Applied {
            payment,
            invoice_status: new_status,
            amount_paid: new_amount_paid,
            balance_due: new_balance,
        })
    }

    /// Gets an invoice by ID.
    pub async fn find_by_id(&self, id: &str) -> DbResult<Option<Invoice>> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1");
        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(invoice)
    }

    /// Finds the live (non-cancelled, non-void) invoice for a job card.
    pub async fn find_live_by_job_card(&self, job_card_id: &str) -> DbResult<Option<Invoice>> {
        let sql = format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices \
             WHERE job_card_id = ?1 AND status NOT IN ('cancelled', 'void') LIMIT 1"
        );
        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(job_card_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(invoice)
    }

    /// Finds the live invoice linked directly to a quotation (not through
    /// a job card).
    pub async fn find_live_by_quotation(&self, quotation_id: &str) -> DbResult<Option<Invoice>> {
        let sql = format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices \
             WHERE quotation_id = ?1 AND job_card_id IS NULL \
               AND status NOT IN ('cancelled', 'void') LIMIT 1"
        );
        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(quotation_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(invoice)
    }

    /// Loads the fully joined view of one invoice.
    pub async fn find_document(&self, id: &str) -> DbResult<InvoiceDocument> {
        let mut conn = self.pool.acquire().await?;

        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1");
        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", id))?;

        let branch_name: String = sqlx::query_scalar("SELECT name FROM branches WHERE id = ?1")
            .bind(&invoice.branch_id)
            .fetch_one(&mut *conn)
            .await?;

        let customer = sqlx::query_as::<_, Customer>(
            "SELECT id, full_name, phone, email, address, company_name, tin_number, \
             vrn_number, created_at, updated_at FROM customers WHERE id = ?1",
        )
        .bind(&invoice.customer_id)
        .fetch_one(&mut *conn)
        .await?;

        let job_card_number: Option<String> = match invoice.job_card_id.as_deref() {
            Some(job_card_id) => {
                sqlx::query_scalar("SELECT job_card_number FROM job_cards WHERE id = ?1")
                    .bind(job_card_id)
                    .fetch_optional(&mut *conn)
                    .await?
            }
            None => None,
        };

        let quotation_number: Option<String> = match invoice.quotation_id.as_deref() {
            Some(quotation_id) => {
                sqlx::query_scalar("SELECT quotation_number FROM quotations WHERE id = ?1")
                    .bind(quotation_id)
                    .fetch_optional(&mut *conn)
                    .await?
            }
            None => None,
        };

        let items = fetch_invoice_items(&mut conn, id).await?;
        let payments = fetch_payments(&mut conn, id).await?;

        Ok(InvoiceDocument {
            invoice,
            branch_name,
            customer,
            job_card_number,
            quotation_number,
            items,
            payments,
        })
    }

    /// Lists invoices, newest first, scoped to the caller's branch.
    pub async fn list(
        &self,
        ctx: &RequestContext,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<InvoiceSummary>> {
        const BASE: &str = "SELECT i.id, i.invoice_number, i.status, i.date_issued, \
                            i.total_amount, i.balance_due, \
                            c.full_name AS customer_name, b.name AS branch_name \
                            FROM invoices i \
                            JOIN customers c ON i.customer_id = c.id \
                            JOIN branches b ON i.branch_id = b.id";

        let summaries = match ctx.branch_scope() {
            Some(branch) => {
                let sql = format!(
                    "{BASE} WHERE i.branch_id = ?1 \
                     ORDER BY i.date_issued DESC, i.created_at DESC LIMIT ?2 OFFSET ?3"
                );
                sqlx::query_as::<_, InvoiceSummary>(&sql)
                    .bind(branch)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "{BASE} ORDER BY i.date_issued DESC, i.created_at DESC LIMIT ?1 OFFSET ?2"
                );
                sqlx::query_as::<_, InvoiceSummary>(&sql)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(summaries)
    }

    /// Moves an invoice to a new status. Any status in the enumerated set
    /// is accepted from any other; the transition graph is advisory.
    pub async fn update_status(&self, id: &str, status: InvoiceStatus) -> DbResult<()> {
        debug!(id = %id, status = %status, "Updating invoice status");

        let result = sqlx::query("UPDATE invoices SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Invoice", id));
        }

        Ok(())
    }

    /// Gets all payments recorded against an invoice, oldest first.
    pub async fn payments(&self, invoice_id: &str) -> DbResult<Vec<Payment>> {
        let mut conn = self.pool.acquire().await?;
        fetch_payments(&mut conn, invoice_id).await
    }
}

// =============================================================================
// Shared insertion path
// =============================================================================

fn discount_columns(spec: DiscountSpec) -> (Option<DiscountType>, i64) {
    match spec {
        DiscountSpec::None => (None, 0),
        DiscountSpec::Percentage(rate) => (Some(DiscountType::Percentage), rate.bps() as i64),
        DiscountSpec::Fixed(amount) => (Some(DiscountType::Fixed), amount.cents()),
    }
}

/// Inserts an invoice with its items on an open transaction.
async fn insert_invoice(tx: &mut Transaction<'_, Sqlite>, draft: InvoiceDraft) -> DbResult<Invoice> {
    let code = numbering::branch_code(&mut *tx, &draft.branch_id).await?;
    let number = numbering::document_number("INV", &code);
    numbering::assert_number_free(&mut *tx, "invoices", "invoice_number", &number).await?;

    let amounts: Vec<_> = draft.lines.iter().map(|line| line.amount()).collect();
    let totals = calculate_totals(&amounts, draft.terms.discount, draft.terms.tax_rate_bps);
    let (discount_type, discount_value) = discount_columns(draft.terms.discount);

    let now = Utc::now();
    let record = Invoice {
        id: Uuid::new_v4().to_string(),
        invoice_number: number,
        job_card_id: draft.job_card_id,
        quotation_id: draft.quotation_id,
        branch_id: draft.branch_id,
        customer_id: draft.customer_id,
        date_issued: draft.terms.date_issued,
        date_due: draft.terms.date_due,
        status: InvoiceStatus::Draft,
        sub_total: totals.sub_total,
        discount_type,
        discount_value,
        discount_amount: totals.discount_amount,
        tax_rate_bps: draft.terms.tax_rate_bps,
        tax_amount: totals.tax_amount,
        total_amount: totals.total_amount,
        amount_paid: Money::zero(),
        balance_due: totals.total_amount,
        payment_terms: draft.terms.payment_terms,
        notes_to_customer: draft.terms.notes_to_customer,
        internal_notes: draft.terms.internal_notes,
        created_by_user_id: draft.created_by_user_id,
        created_at: now,
        updated_at: now,
    };

    debug!(id = %record.id, number = %record.invoice_number, "Inserting invoice");

    sqlx::query(
        r#"
        INSERT INTO invoices (
            id, invoice_number, job_card_id, quotation_id, branch_id, customer_id,
            date_issued, date_due, status, sub_total, discount_type, discount_value,
            discount_amount, tax_rate_bps, tax_amount, total_amount, amount_paid,
            payment_terms, notes_to_customer, internal_notes, created_by_user_id,
            created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
            ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23
        )
        "#,
    )
    .bind(&record.id)
    .bind(&record.invoice_number)
    .bind(&record.job_card_id)
    .bind(&record.quotation_id)
    .bind(&record.branch_id)
    .bind(&record.customer_id)
    .bind(record.date_issued)
    .bind(record.date_due)
    .bind(record.status)
    .bind(record.sub_total)
    .bind(record.discount_type)
    .bind(record.discount_value)
    .bind(record.discount_amount)
    .bind(record.tax_rate_bps)
    .bind(record.tax_amount)
    .bind(record.total_amount)
    .bind(record.amount_paid)
    .bind(&record.payment_terms)
    .bind(&record.notes_to_customer)
    .bind(&record.internal_notes)
    .bind(&record.created_by_user_id)
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(&mut **tx)
    .await?;

    for (position, line) in draft.lines.iter().enumerate() {
        let line_sub_total = line.total();
        sqlx::query(
            r#"
            INSERT INTO invoice_items (
                id, invoice_id, item_type, catalog_id, description, quantity,
                unit_price, sub_total, discount_amount, tax_amount, total_price, position
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&record.id)
        .bind(line.kind)
        .bind(&line.catalog_id)
        .bind(&line.description)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line_sub_total)
        // Discount and tax are document-level; items carry the raw amounts
        .bind(Money::zero())
        .bind(Money::zero())
        .bind(line_sub_total)
        .bind(position as i64)
        .execute(&mut **tx)
        .await?;
    }

    Ok(record)
}

// =============================================================================
// Line and payment fetches
// =============================================================================

async fn fetch_invoice_items(
    conn: &mut SqliteConnection,
    invoice_id: &str,
) -> DbResult<Vec<InvoiceItem>> {
    let items = sqlx::query_as::<_, InvoiceItem>(
        r#"
        SELECT id, invoice_id, item_type AS kind, catalog_id, description, quantity,
               unit_price, sub_total, discount_amount, tax_amount, total_price, position
        FROM invoice_items
        WHERE invoice_id = ?1
        ORDER BY position
        "#,
    )
    .bind(invoice_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

async fn fetch_payments(conn: &mut SqliteConnection, invoice_id: &str) -> DbResult<Vec<Payment>> {
    let payments = sqlx::query_as::<_, Payment>(
        r#"
        SELECT id, invoice_id, payment_date, amount, method, reference_number,
               notes, processed_by_user_id, created_at
        FROM payments
        WHERE invoice_id = ?1
        ORDER BY rowid
        "#,
    )
    .bind(invoice_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(payments)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::job_card::{NewExtraLine, NewJobCard};
    use crate::test_support::{
        date, seed_branch, seed_customer, seed_part, seed_service, seed_vehicle, staff_ctx,
        test_db,
    };
    use crate::Database;

    fn standard_terms() -> InvoiceTerms {
        InvoiceTerms {
            date_issued: date(2026, 8, 6),
            date_due: Some(date(2026, 9, 5)),
            discount: DiscountSpec::Percentage(RateBps::from_bps(500)),
            tax_rate_bps: RateBps::from_bps(1800),
            payment_terms: Some("Net 30".into()),
            notes_to_customer: None,
            internal_notes: None,
        }
    }

    fn payment(amount_cents: i64) -> PaymentInput {
        PaymentInput {
            amount: Money::from_cents(amount_cents),
            payment_date: date(2026, 8, 10),
            method: PaymentMethod::BankTransfer,
            reference_number: Some("TX-1".into()),
            notes: None,
        }
    }

    /// A completed job card carrying 2 × 35,828.00 + 1 × 22,165.00 of work.
    async fn completed_job_card(db: &Database, branch_id: &str) -> String {
        let customer = seed_customer(db).await;
        let vehicle = seed_vehicle(db, &customer.id).await;
        let ctx = staff_ctx(branch_id);

        let card = db
            .job_cards()
            .create(
                &ctx,
                NewJobCard {
                    vehicle_id: vehicle.id.clone(),
                    customer_id: customer.id.clone(),
                    assigned_mechanic_id: None,
                    date_received: date(2026, 8, 1),
                    date_promised_completion: None,
                    customer_complaints: "Engine overhaul requested".into(),
                    mechanic_findings: None,
                    estimated_cost: None,
                    internal_notes: None,
                    services: vec![],
                    parts: vec![],
                    extras: vec![
                        NewExtraLine {
                            description: "Engine overhaul".into(),
                            quantity: 2,
                            unit_price: Money::from_cents(3_582_800),
                        },
                        NewExtraLine {
                            description: "Gearbox refurbishment".into(),
                            quantity: 1,
                            unit_price: Money::from_cents(2_216_500),
                        },
                    ],
                },
            )
            .await
            .unwrap();

        db.job_cards()
            .update_status(&card.id, JobCardStatus::Completed)
            .await
            .unwrap();

        card.id
    }

    #[tokio::test]
    async fn test_create_from_job_card_totals_and_cascade() {
        let db = test_db().await;
        let branch = seed_branch(&db).await;
        let job_card_id = completed_job_card(&db, &branch.id).await;
        let ctx = staff_ctx(&branch.id);

        let outcome = db
            .invoices()
            .create_from_job_card(&ctx, &job_card_id, standard_terms())
            .await
            .unwrap();
        let invoice = match outcome {
            InvoiceOutcome::Created(invoice) => invoice,
            InvoiceOutcome::AlreadyInvoiced(_) => panic!("expected a fresh invoice"),
        };

        assert!(invoice.invoice_number.starts_with("INV-B01-"));
        assert_eq!(invoice.sub_total.cents(), 9_382_100);
        assert_eq!(invoice.discount_amount.cents(), 469_105);
        assert_eq!(invoice.tax_amount.cents(), 1_604_339);
        assert_eq!(invoice.total_amount.cents(), 10_517_334);
        assert_eq!(invoice.amount_paid.cents(), 0);
        assert_eq!(invoice.balance_due.cents(), 10_517_334);

        // Source card moved to invoiced, actual cost backfilled
        let card = db
            .job_cards()
            .find_by_id(&job_card_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(card.status, JobCardStatus::Invoiced);
        assert_eq!(card.actual_cost, Some(invoice.total_amount));

        let doc = db.invoices().find_document(&invoice.id).await.unwrap();
        assert_eq!(doc.items.len(), 2);
        assert!(doc.job_card_number.is_some());
        assert_eq!(doc.branch_name, "Main Branch");
    }

    #[tokio::test]
    async fn test_one_live_invoice_per_job_card() {
        let db = test_db().await;
        let branch = seed_branch(&db).await;
        let job_card_id = completed_job_card(&db, &branch.id).await;
        let ctx = staff_ctx(&branch.id);

        let first = db
            .invoices()
            .create_from_job_card(&ctx, &job_card_id, standard_terms())
            .await
            .unwrap();

        let second = db
            .invoices()
            .create_from_job_card(&ctx, &job_card_id, standard_terms())
            .await
            .unwrap();

        match second {
            InvoiceOutcome::AlreadyInvoiced(existing) => {
                assert_eq!(existing.id, first.invoice().id);
            }
            InvoiceOutcome::Created(_) => panic!("duplicate invoice for one job card"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_invoice_frees_the_job_card() {
        let db = test_db().await;
        let branch = seed_branch(&db).await;
        let job_card_id = completed_job_card(&db, &branch.id).await;
        let ctx = staff_ctx(&branch.id);

        let first = db
            .invoices()
            .create_from_job_card(&ctx, &job_card_id, standard_terms())
            .await
            .unwrap();
        let first_total = first.invoice().total_amount;
        db.invoices()
            .update_status(&first.invoice().id, InvoiceStatus::Cancelled)
            .await
            .unwrap();

        // Re-invoice with different terms; allowed because the first is dead
        let second = db
            .invoices()
            .create_from_job_card(&ctx, &job_card_id, InvoiceTerms::bare(date(2026, 8, 7)))
            .await
            .unwrap();
        assert!(matches!(second, InvoiceOutcome::Created(_)));

        // actual_cost keeps the value fixed at first invoicing
        let card = db
            .job_cards()
            .find_by_id(&job_card_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(card.actual_cost, Some(first_total));
    }

    #[tokio::test]
    async fn test_unfinished_job_card_cannot_be_invoiced() {
        let db = test_db().await;
        let branch = seed_branch(&db).await;
        let customer = seed_customer(&db).await;
        let vehicle = seed_vehicle(&db, &customer.id).await;
        let ctx = staff_ctx(&branch.id);

        let card = db
            .job_cards()
            .create(
                &ctx,
                NewJobCard {
                    vehicle_id: vehicle.id.clone(),
                    customer_id: customer.id.clone(),
                    assigned_mechanic_id: None,
                    date_received: date(2026, 8, 1),
                    date_promised_completion: None,
                    customer_complaints: "Rattling noise".into(),
                    mechanic_findings: None,
                    estimated_cost: None,
                    internal_notes: None,
                    services: vec![],
                    parts: vec![],
                    extras: vec![NewExtraLine {
                        description: "Inspection".into(),
                        quantity: 1,
                        unit_price: Money::from_cents(10_000),
                    }],
                },
            )
            .await
            .unwrap();

        let result = db
            .invoices()
            .create_from_job_card(&ctx, &card.id, standard_terms())
            .await;
        assert!(matches!(
            result,
            Err(DbError::Domain(CoreError::InvalidDocumentState { .. }))
        ));
    }

    #[tokio::test]
    async fn test_payment_flow_partial_then_full() {
        let db = test_db().await;
        let branch = seed_branch(&db).await;
        let job_card_id = completed_job_card(&db, &branch.id).await;
        let ctx = staff_ctx(&branch.id);

        let invoice = db
            .invoices()
            .create_from_job_card(&ctx, &job_card_id, standard_terms())
            .await
            .unwrap()
            .invoice()
            .clone();
        assert_eq!(invoice.total_amount.cents(), 10_517_334);

        // First payment: 50,000.00 → partially paid
        let first = db
            .invoices()
            .record_payment(&ctx, &invoice.id, payment(5_000_000))
            .await
            .unwrap();
        match first {
            PaymentOutcome::Applied {
                invoice_status,
                amount_paid,
                balance_due,
                ..
            } => {
                assert_eq!(invoice_status, InvoiceStatus::PartiallyPaid);
                assert_eq!(amount_paid.cents(), 5_000_000);
                assert_eq!(balance_due.cents(), 5_517_334);
            }
            PaymentOutcome::AlreadySettled => panic!("invoice was not settled"),
        }

        // Job card tracks the partial payment but keeps working status
        let card = db
            .job_cards()
            .find_by_id(&job_card_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(card.status, JobCardStatus::Invoiced);
        assert_eq!(card.payment_status, JobPaymentStatus::PartiallyPaid);

        // Second payment settles the balance exactly
        let second = db
            .invoices()
            .record_payment(&ctx, &invoice.id, payment(5_517_334))
            .await
            .unwrap();
        match second {
            PaymentOutcome::Applied {
                invoice_status,
                amount_paid,
                balance_due,
                ..
            } => {
                assert_eq!(invoice_status, InvoiceStatus::Paid);
                assert_eq!(amount_paid.cents(), 10_517_334);
                assert_eq!(balance_due.cents(), 0);
            }
            PaymentOutcome::AlreadySettled => panic!("invoice was not settled"),
        }

        // Stored invoice agrees with the returned balance
        let stored = db
            .invoices()
            .find_by_id(&invoice.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, InvoiceStatus::Paid);
        assert_eq!(stored.amount_paid.cents(), 10_517_334);
        assert_eq!(stored.balance_due.cents(), 0);
        assert!(stored.is_settled());

        // Full payment cascades the job card
        let card = db
            .job_cards()
            .find_by_id(&job_card_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(card.status, JobCardStatus::Paid);
        assert_eq!(card.payment_status, JobPaymentStatus::Paid);

        // Both payment rows on record
        let payments = db.invoices().payments(&invoice.id).await.unwrap();
        assert_eq!(payments.len(), 2);
    }

    #[tokio::test]
    async fn test_overpayment_rejected() {
        let db = test_db().await;
        let branch = seed_branch(&db).await;
        let job_card_id = completed_job_card(&db, &branch.id).await;
        let ctx = staff_ctx(&branch.id);

        let invoice = db
            .invoices()
            .create_from_job_card(&ctx, &job_card_id, standard_terms())
            .await
            .unwrap()
            .invoice()
            .clone();

        // balance + 1.00
        let result = db
            .invoices()
            .record_payment(&ctx, &invoice.id, payment(10_517_334 + 100))
            .await;
        assert!(matches!(result, Err(DbError::Domain(_))));

        // Nothing was written
        let stored = db
            .invoices()
            .find_by_id(&invoice.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.amount_paid.cents(), 0);
        assert!(db.invoices().payments(&invoice.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_settled_invoice_payment_is_noop() {
        let db = test_db().await;
        let branch = seed_branch(&db).await;
        let job_card_id = completed_job_card(&db, &branch.id).await;
        let ctx = staff_ctx(&branch.id);

        let invoice = db
            .invoices()
            .create_from_job_card(&ctx, &job_card_id, standard_terms())
            .await
            .unwrap()
            .invoice()
            .clone();

        db.invoices()
            .record_payment(&ctx, &invoice.id, payment(10_517_334))
            .await
            .unwrap();

        let again = db
            .invoices()
            .record_payment(&ctx, &invoice.id, payment(100))
            .await
            .unwrap();
        assert!(matches!(again, PaymentOutcome::AlreadySettled));

        let payments = db.invoices().payments(&invoice.id).await.unwrap();
        assert_eq!(payments.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_payment_rejected() {
        let db = test_db().await;
        let branch = seed_branch(&db).await;
        let job_card_id = completed_job_card(&db, &branch.id).await;
        let ctx = staff_ctx(&branch.id);

        let invoice = db
            .invoices()
            .create_from_job_card(&ctx, &job_card_id, standard_terms())
            .await
            .unwrap()
            .invoice()
            .clone();

        let zero = db.invoices().record_payment(&ctx, &invoice.id, payment(0)).await;
        assert!(matches!(zero, Err(DbError::Domain(_))));

        let negative = db
            .invoices()
            .record_payment(&ctx, &invoice.id, payment(-500))
            .await;
        assert!(matches!(negative, Err(DbError::Domain(_))));
    }

    #[tokio::test]
    async fn test_create_from_quotation() {
        let db = test_db().await;
        let branch = seed_branch(&db).await;
        let customer = seed_customer(&db).await;
        let service = seed_service(&db, "Brake service", 80_000).await;
        let ctx = staff_ctx(&branch.id);

        let quotation = db
            .quotations()
            .create(
                &ctx,
                crate::repository::quotation::NewQuotation {
                    customer_id: customer.id.clone(),
                    vehicle_id: None,
                    date_issued: date(2026, 8, 6),
                    valid_until_date: None,
                    discount_percent_bps: RateBps::zero(),
                    tax_rate_bps: RateBps::from_bps(1800),
                    terms_and_conditions: None,
                    notes: None,
                    lines: vec![DocumentLine::service(&service.id, 2)],
                },
            )
            .await
            .unwrap();

        // Not accepted yet: refused
        let early = db
            .invoices()
            .create_from_quotation(&ctx, &quotation.id, InvoiceTerms::bare(date(2026, 8, 7)))
            .await;
        assert!(matches!(
            early,
            Err(DbError::Domain(CoreError::InvalidDocumentState { .. }))
        ));

        db.quotations()
            .update_status(&quotation.id, QuotationStatus::Accepted)
            .await
            .unwrap();

        let outcome = db
            .invoices()
            .create_from_quotation(&ctx, &quotation.id, InvoiceTerms::bare(date(2026, 8, 7)))
            .await
            .unwrap();
        let invoice = outcome.invoice().clone();
        assert_eq!(invoice.quotation_id.as_deref(), Some(quotation.id.as_str()));
        assert!(invoice.job_card_id.is_none());
        assert_eq!(invoice.sub_total.cents(), 160_000);

        // Second attempt short-circuits to the existing invoice
        let repeat = db
            .invoices()
            .create_from_quotation(&ctx, &quotation.id, InvoiceTerms::bare(date(2026, 8, 8)))
            .await
            .unwrap();
        match repeat {
            InvoiceOutcome::AlreadyInvoiced(existing) => assert_eq!(existing.id, invoice.id),
            InvoiceOutcome::Created(_) => panic!("duplicate invoice for one quotation"),
        }

        let doc = db.invoices().find_document(&invoice.id).await.unwrap();
        assert!(doc.quotation_number.is_some());
        assert_eq!(doc.items[0].description, "Brake service");
    }

    #[tokio::test]
    async fn test_standalone_invoice_with_fixed_discount() {
        let db = test_db().await;
        let branch = seed_branch(&db).await;
        let customer = seed_customer(&db).await;
        let part = seed_part(&db, "OIL-5W30", 8_000, 20).await;
        let ctx = staff_ctx(&branch.id);

        let invoice = db
            .invoices()
            .create(
                &ctx,
                NewInvoice {
                    customer_id: customer.id.clone(),
                    terms: InvoiceTerms {
                        date_issued: date(2026, 8, 6),
                        date_due: None,
                        discount: DiscountSpec::Fixed(Money::from_cents(10_000)),
                        tax_rate_bps: RateBps::from_bps(1000),
                        payment_terms: None,
                        notes_to_customer: None,
                        internal_notes: None,
                    },
                    lines: vec![DocumentLine::part(&part.id, 5)],
                },
            )
            .await
            .unwrap();

        // 5 × 80.00 = 400.00, minus 100.00 fixed, plus 10% tax = 330.00
        assert_eq!(invoice.sub_total.cents(), 40_000);
        assert_eq!(invoice.discount_amount.cents(), 10_000);
        assert_eq!(invoice.tax_amount.cents(), 3_000);
        assert_eq!(invoice.total_amount.cents(), 33_000);
        assert_eq!(invoice.discount_type, Some(DiscountType::Fixed));
        assert_eq!(
            invoice.discount_spec(),
            DiscountSpec::Fixed(Money::from_cents(10_000))
        );

        // Invoicing alone does not move stock
        let item = db.inventory().find_by_id(&part.id).await.unwrap().unwrap();
        assert_eq!(item.quantity_on_hand, 20);

        let listed = db.invoices().list(&ctx, 10, 0).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].balance_due.cents(), 33_000);
    }
}
