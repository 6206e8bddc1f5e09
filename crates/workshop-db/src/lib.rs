//! # workshop-db: Database Layer for the Garage Management System
//!
//! This crate provides persistence for the document-to-cash money flow:
//! quotations, job cards, invoices, payments, and the registry and catalog
//! records they reference. It uses SQLite with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Data Flow                                      │
//! │                                                                         │
//! │  Caller (HTTP handler, desktop shell, test)                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    workshop-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ (quotation,   │    │  (embedded)  │  │   │
//! │  │   │               │    │  job_card,    │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│  invoice, …)  │    │ 001_init.sql │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   Multi-step writes (document + lines + cascades) each run     │   │
//! │  │   inside one transaction: all-or-nothing, no orphaned rows.    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database (WAL mode, foreign keys ON)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`numbering`] - Branch-scoped document number generation
//! - [`repository`] - Repository implementations per entity
//!
//! ## Usage
//!
//! ```rust,ignore
//! use workshop_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/workshop.db")).await?;
//!
//! let quotation = db.quotations().create(&ctx, new_quotation).await?;
//! let job_card_id = db.quotations().convert_to_job_card(&ctx, &quotation.id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
mod numbering;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::lines::DocumentLine;

pub use repository::branch::BranchRepository;
pub use repository::catalog::ServiceRepository;
pub use repository::customer::CustomerRepository;
pub use repository::inventory::InventoryRepository;
pub use repository::invoice::InvoiceRepository;
pub use repository::job_card::JobCardRepository;
pub use repository::quotation::QuotationRepository;
pub use repository::vehicle::VehicleRepository;

// =============================================================================
// Test Support
// =============================================================================

#[cfg(test)]
pub(crate) mod test_support {
    //! Shared fixtures for repository tests. Every test runs against an
    //! isolated in-memory database with migrations applied.

    use chrono::NaiveDate;
    use workshop_core::{Money, RequestContext, Role};

    use crate::pool::{Database, DbConfig};
    use crate::repository::branch::NewBranch;
    use crate::repository::catalog::NewService;
    use crate::repository::customer::NewCustomer;
    use crate::repository::inventory::NewInventoryItem;
    use crate::repository::vehicle::NewVehicle;
    use workshop_core::{Branch, Customer, InventoryItem, ServiceItem, Vehicle};

    pub async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    pub fn staff_ctx(branch_id: &str) -> RequestContext {
        RequestContext::new("user-1", Some(branch_id.to_string()), Role::Staff)
    }

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub async fn seed_branch(db: &Database) -> Branch {
        db.branches()
            .create(NewBranch {
                code: "01".into(),
                name: "Main Branch".into(),
                address: Some("Sokoine Drive".into()),
                phone: None,
            })
            .await
            .unwrap()
    }

    pub async fn seed_customer(db: &Database) -> Customer {
        db.customers()
            .create(NewCustomer {
                full_name: "Asha Mwinyi".into(),
                phone: Some("+255700000001".into()),
                email: Some("asha@example.com".into()),
                address: None,
                company_name: None,
                tin_number: None,
                vrn_number: None,
            })
            .await
            .unwrap()
    }

    pub async fn seed_vehicle(db: &Database, customer_id: &str) -> Vehicle {
        db.vehicles()
            .create(NewVehicle {
                customer_id: customer_id.to_string(),
                make: "Toyota".into(),
                model: "Hilux".into(),
                year: Some(2018),
                vin: None,
                license_plate: Some("T123XYZ".into()),
                color: Some("white".into()),
                notes: None,
            })
            .await
            .unwrap()
    }

    pub async fn seed_service(db: &Database, name: &str, price_cents: i64) -> ServiceItem {
        db.services()
            .create(NewService {
                name: name.to_string(),
                description: None,
                default_price: Money::from_cents(price_cents),
                estimated_time_hours: Some(1.5),
            })
            .await
            .unwrap()
    }

    pub async fn seed_part(
        db: &Database,
        sku: &str,
        price_cents: i64,
        quantity_on_hand: i64,
    ) -> InventoryItem {
        db.inventory()
            .create(NewInventoryItem {
                category_id: None,
                branch_id: None,
                name: format!("Part {sku}"),
                description: None,
                sku: sku.to_string(),
                quantity_on_hand,
                unit_price: Money::from_cents(price_cents),
                cost_price: None,
                reorder_level: 0,
            })
            .await
            .unwrap()
    }
}
