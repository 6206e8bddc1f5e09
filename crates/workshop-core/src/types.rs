//! # Domain Types
//!
//! Core domain types for the garage management system.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Registry               Catalog              Documents                  │
//! │  ┌─────────────┐        ┌───────────────┐    ┌─────────────┐           │
//! │  │  Customer   │        │  ServiceItem  │    │  Quotation  │           │
//! │  │  Vehicle    │        │ InventoryItem │    │  JobCard    │           │
//! │  │  Branch     │        └───────────────┘    │  Invoice    │           │
//! │  └─────────────┘                             │  Payment    │           │
//! │                                              └─────────────┘           │
//! │                                                                         │
//! │  Money flow: Quotation (accepted) → JobCard (completed) → Invoice      │
//! │              → Payment(s) → Invoice converges to `paid`                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every document has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Document number: (`QT-…`, `JC-…`, `INV-…`) - human-readable, branch-scoped

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::money::Money;
use crate::totals::DiscountSpec;

// =============================================================================
// Rate (basis points)
// =============================================================================

/// A percentage rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1800 bps = 18% (the standard VAT rate on our documents)
///
/// Keeping rates integral means discount and tax math never touches a float.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
pub struct RateBps(u32);

impl RateBps {
    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        RateBps(bps)
    }

    /// Creates a rate from a percentage (for convenience).
    pub fn from_percentage(pct: f64) -> Self {
        RateBps((pct * 100.0).round() as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero rate.
    #[inline]
    pub const fn zero() -> Self {
        RateBps(0)
    }

    /// Checks if the rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for RateBps {
    fn default() -> Self {
        RateBps::zero()
    }
}

// =============================================================================
// Line item kind
// =============================================================================

/// What a document line refers to.
///
/// `Service` and `Part` lines carry a catalog id; `Misc` lines are free-text
/// charges with no catalog backing (their catalog id is always NULL).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Service,
    Part,
    Misc,
}

impl ItemKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Service => "service",
            ItemKind::Part => "part",
            ItemKind::Misc => "misc",
        }
    }
}

// =============================================================================
// Statuses
// =============================================================================

/// The status of a quotation.
///
/// Lifecycle: draft → sent → {accepted, rejected, expired}. `rejected` and
/// `expired` are terminal; `accepted` still admits exactly one forward step,
/// conversion into a job card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    Draft,
    Sent,
    Accepted,
    Rejected,
    Expired,
}

impl QuotationStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            QuotationStatus::Draft => "draft",
            QuotationStatus::Sent => "sent",
            QuotationStatus::Accepted => "accepted",
            QuotationStatus::Rejected => "rejected",
            QuotationStatus::Expired => "expired",
        }
    }
}

impl Default for QuotationStatus {
    fn default() -> Self {
        QuotationStatus::Draft
    }
}

impl FromStr for QuotationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(QuotationStatus::Draft),
            "sent" => Ok(QuotationStatus::Sent),
            "accepted" => Ok(QuotationStatus::Accepted),
            "rejected" => Ok(QuotationStatus::Rejected),
            "expired" => Ok(QuotationStatus::Expired),
            other => Err(CoreError::UnknownStatus {
                entity: "quotation",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for QuotationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The status of a job card.
///
/// Lifecycle: pending_approval → approved → in_progress ⇄ awaiting_parts
/// → completed → invoiced → paid. `cancelled` is reachable from any
/// non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum JobCardStatus {
    PendingApproval,
    Approved,
    InProgress,
    AwaitingParts,
    Completed,
    Invoiced,
    Paid,
    Cancelled,
}

impl JobCardStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            JobCardStatus::PendingApproval => "pending_approval",
            JobCardStatus::Approved => "approved",
            JobCardStatus::InProgress => "in_progress",
            JobCardStatus::AwaitingParts => "awaiting_parts",
            JobCardStatus::Completed => "completed",
            JobCardStatus::Invoiced => "invoiced",
            JobCardStatus::Paid => "paid",
            JobCardStatus::Cancelled => "cancelled",
        }
    }

    /// Whether the work is far enough along for billing.
    pub const fn is_invoiceable(&self) -> bool {
        matches!(
            self,
            JobCardStatus::Completed | JobCardStatus::Invoiced | JobCardStatus::Paid
        )
    }
}

impl Default for JobCardStatus {
    fn default() -> Self {
        JobCardStatus::PendingApproval
    }
}

impl FromStr for JobCardStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_approval" => Ok(JobCardStatus::PendingApproval),
            "approved" => Ok(JobCardStatus::Approved),
            "in_progress" => Ok(JobCardStatus::InProgress),
            "awaiting_parts" => Ok(JobCardStatus::AwaitingParts),
            "completed" => Ok(JobCardStatus::Completed),
            "invoiced" => Ok(JobCardStatus::Invoiced),
            "paid" => Ok(JobCardStatus::Paid),
            "cancelled" => Ok(JobCardStatus::Cancelled),
            other => Err(CoreError::UnknownStatus {
                entity: "job card",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for JobCardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment progress on a job card, maintained by the invoice payment flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum JobPaymentStatus {
    Unpaid,
    PartiallyPaid,
    Paid,
}

impl Default for JobPaymentStatus {
    fn default() -> Self {
        JobPaymentStatus::Unpaid
    }
}

/// The status of an invoice.
///
/// Lifecycle: draft → sent → {partially_paid → paid, overdue, cancelled,
/// void}. `paid`, `cancelled` and `void` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    PartiallyPaid,
    Overdue,
    Cancelled,
    Void,
}

impl InvoiceStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::PartiallyPaid => "partially_paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
            InvoiceStatus::Void => "void",
        }
    }

    /// A live invoice counts against the one-invoice-per-source rule.
    /// Cancelled and voided invoices do not.
    pub const fn is_live(&self) -> bool {
        !matches!(self, InvoiceStatus::Cancelled | InvoiceStatus::Void)
    }
}

impl Default for InvoiceStatus {
    fn default() -> Self {
        InvoiceStatus::Draft
    }
}

impl FromStr for InvoiceStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(InvoiceStatus::Draft),
            "sent" => Ok(InvoiceStatus::Sent),
            "paid" => Ok(InvoiceStatus::Paid),
            "partially_paid" => Ok(InvoiceStatus::PartiallyPaid),
            "overdue" => Ok(InvoiceStatus::Overdue),
            "cancelled" => Ok(InvoiceStatus::Cancelled),
            "void" => Ok(InvoiceStatus::Void),
            other => Err(CoreError::UnknownStatus {
                entity: "invoice",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    CreditCard,
    BankTransfer,
    Cheque,
    MobileMoney,
    Other,
}

impl FromStr for PaymentMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(PaymentMethod::Cash),
            "credit_card" => Ok(PaymentMethod::CreditCard),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "cheque" => Ok(PaymentMethod::Cheque),
            "mobile_money" => Ok(PaymentMethod::MobileMoney),
            "other" => Ok(PaymentMethod::Other),
            other => Err(CoreError::UnknownStatus {
                entity: "payment method",
                value: other.to_string(),
            }),
        }
    }
}

// =============================================================================
// Discount type
// =============================================================================

/// How an invoice-level discount value is interpreted.
///
/// `Percentage` stores basis points in `discount_value`; `Fixed` stores
/// cents. A NULL discount type means no discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

// =============================================================================
// Registry entities
// =============================================================================

/// A physical service-center location. Most entities are scoped to a branch
/// or explicitly marked global (branch id NULL).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Branch {
    pub id: String,
    /// Short token embedded in document numbers (`JC-B<code>-…`).
    pub code: String,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A customer of the garage. Phone and email are each globally unique when
/// present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Customer {
    pub id: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub company_name: Option<String>,
    /// Taxpayer identification number.
    pub tin_number: Option<String>,
    /// VAT registration number.
    pub vrn_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A customer's vehicle. Belongs exclusively to one customer.
///
/// Invariant: at least one of `vin` / `license_plate` is present, and each
/// is unique when present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Vehicle {
    pub id: String,
    pub customer_id: String,
    pub make: String,
    pub model: String,
    pub year: Option<i64>,
    pub vin: Option<String>,
    pub license_plate: Option<String>,
    pub color: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vehicle {
    /// Human-readable identification, e.g. `Toyota Corolla (T123ABC)`.
    pub fn display_name(&self) -> String {
        let ident = self
            .license_plate
            .as_deref()
            .or(self.vin.as_deref())
            .unwrap_or("unregistered");
        format!("{} {} ({})", self.make, self.model, ident)
    }
}

// =============================================================================
// Catalog entities
// =============================================================================

/// A labor/service catalog entry. Read-mostly; referenced by document lines
/// to resolve a default description and price.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ServiceItem {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub default_price: Money,
    pub estimated_time_hours: Option<f64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A stocked part. SKU is unique within its branch scope: unique among items
/// of the same branch, or unique among global items (branch id NULL).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InventoryItem {
    pub id: String,
    pub category_id: Option<String>,
    pub branch_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub sku: String,
    /// Never negative; guarded both here and by a database CHECK.
    pub quantity_on_hand: i64,
    /// Selling price.
    pub unit_price: Money,
    /// Purchase price, for margin reporting.
    pub cost_price: Option<Money>,
    pub reorder_level: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    /// Checks whether the requested quantity can be taken from stock.
    pub fn can_fulfill(&self, quantity: i64) -> bool {
        self.quantity_on_hand >= quantity
    }

    /// Whether stock has fallen to or below the reorder level.
    pub fn needs_reorder(&self) -> bool {
        self.quantity_on_hand <= self.reorder_level
    }
}

// =============================================================================
// Quotation
// =============================================================================

/// A proposed bundle of services/parts/misc charges awaiting customer
/// acceptance. All monetary fields are derived from the items at creation
/// time and persisted as a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Quotation {
    pub id: String,
    pub quotation_number: String,
    pub branch_id: String,
    pub customer_id: String,
    pub vehicle_id: Option<String>,
    pub date_issued: NaiveDate,
    pub valid_until_date: Option<NaiveDate>,
    pub status: QuotationStatus,
    pub sub_total: Money,
    pub discount_percent_bps: RateBps,
    pub discount_amount: Money,
    pub tax_rate_bps: RateBps,
    pub tax_amount: Money,
    pub total_amount: Money,
    pub terms_and_conditions: Option<String>,
    pub notes: Option<String>,
    pub created_by_user_id: String,
    /// Set once converted; the link is permanent.
    pub job_card_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One line on a quotation. `catalog_id` points at a service or inventory
/// item depending on `kind`; NULL for misc lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct QuotationItem {
    pub id: String,
    pub quotation_id: String,
    pub kind: ItemKind,
    pub catalog_id: Option<String>,
    pub description: String,
    pub quantity: i64,
    pub unit_price: Money,
    /// quantity × unit_price, persisted for the rendering layer.
    pub total_price: Money,
    pub position: i64,
}

// =============================================================================
// Job Card
// =============================================================================

/// An authorized unit of work against a specific vehicle; the operational
/// record of labor and parts performed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct JobCard {
    pub id: String,
    pub job_card_number: String,
    pub branch_id: String,
    pub vehicle_id: String,
    pub customer_id: String,
    pub assigned_mechanic_id: Option<String>,
    pub status: JobCardStatus,
    pub date_received: NaiveDate,
    pub date_promised_completion: Option<NaiveDate>,
    /// Stamped when the card transitions to `completed`.
    pub date_actual_completion: Option<NaiveDate>,
    pub customer_complaints: String,
    pub mechanic_findings: Option<String>,
    pub estimated_cost: Option<Money>,
    /// Backfilled from the invoice total on first invoicing, never
    /// overwritten afterwards.
    pub actual_cost: Option<Money>,
    pub payment_status: JobPaymentStatus,
    pub internal_notes: Option<String>,
    pub created_by_user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A labor line on a job card.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct JobCardService {
    pub id: String,
    pub job_card_id: String,
    pub service_id: String,
    pub description_override: Option<String>,
    pub quantity: i64,
    pub unit_price: Money,
    pub total_price: Money,
    pub notes: Option<String>,
}

/// A consumed part line on a job card. Inserting one decrements stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct JobCardPart {
    pub id: String,
    pub job_card_id: String,
    pub inventory_item_id: String,
    pub description_override: Option<String>,
    pub quantity_used: i64,
    pub unit_price: Money,
    pub total_price: Money,
    pub notes: Option<String>,
}

/// An ad-hoc charge with no catalog backing, e.g. a misc line carried
/// forward from a quotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct JobCardExtra {
    pub id: String,
    pub job_card_id: String,
    pub description: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub total_price: Money,
}

// =============================================================================
// Invoice
// =============================================================================

/// The billing document requesting payment for completed work.
///
/// `balance_due` is a database-generated column (`total_amount -
/// amount_paid`), so it can never be persisted out of sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Invoice {
    pub id: String,
    pub invoice_number: String,
    pub job_card_id: Option<String>,
    pub quotation_id: Option<String>,
    pub branch_id: String,
    pub customer_id: String,
    pub date_issued: NaiveDate,
    pub date_due: Option<NaiveDate>,
    pub status: InvoiceStatus,
    pub sub_total: Money,
    pub discount_type: Option<DiscountType>,
    /// Basis points for percentage discounts, cents for fixed ones.
    pub discount_value: i64,
    pub discount_amount: Money,
    pub tax_rate_bps: RateBps,
    pub tax_amount: Money,
    pub total_amount: Money,
    /// Only ever grows, and only through payment recording.
    pub amount_paid: Money,
    pub balance_due: Money,
    pub payment_terms: Option<String>,
    pub notes_to_customer: Option<String>,
    pub internal_notes: Option<String>,
    pub created_by_user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Reconstructs the discount specification from the persisted
    /// type/value pair.
    pub fn discount_spec(&self) -> DiscountSpec {
        match self.discount_type {
            Some(DiscountType::Percentage) => {
                DiscountSpec::Percentage(RateBps::from_bps(self.discount_value as u32))
            }
            Some(DiscountType::Fixed) => DiscountSpec::Fixed(Money::from_cents(self.discount_value)),
            None => DiscountSpec::None,
        }
    }

    /// Whether the invoice is fully settled.
    pub fn is_settled(&self) -> bool {
        self.balance_due.cents() <= 0
    }
}

/// One line on an invoice. A snapshot: later catalog edits never change a
/// billed line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InvoiceItem {
    pub id: String,
    pub invoice_id: String,
    pub kind: ItemKind,
    pub catalog_id: Option<String>,
    pub description: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub sub_total: Money,
    pub discount_amount: Money,
    pub tax_amount: Money,
    pub total_price: Money,
    pub position: i64,
}

// =============================================================================
// Payment
// =============================================================================

/// Money received against one invoice. Immutable once created; appending a
/// payment is the only way the invoice's `amount_paid` changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: String,
    pub invoice_id: String,
    pub payment_date: NaiveDate,
    pub amount: Money,
    pub method: PaymentMethod,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
    pub processed_by_user_id: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
