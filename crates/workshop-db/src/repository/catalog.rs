//! # Service Catalog Repository
//!
//! Read-mostly catalog of labor entries. Document lines reference a service
//! to resolve its default description and price; the line then snapshots
//! both, so catalog edits never rewrite history. Deleting a referenced
//! service is refused; deactivation is the supported retirement path.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use workshop_core::validation::{validate_price_cents, validate_required_text};
use workshop_core::{Money, ServiceItem};

/// Input for creating or updating a catalog service.
#[derive(Debug, Clone)]
pub struct NewService {
    pub name: String,
    pub description: Option<String>,
    pub default_price: Money,
    pub estimated_time_hours: Option<f64>,
}

/// Repository for the service catalog.
#[derive(Debug, Clone)]
pub struct ServiceRepository {
    pool: SqlitePool,
}

const SELECT_COLUMNS: &str = "id, name, description, default_price, estimated_time_hours, \
                              is_active, created_at, updated_at";

impl ServiceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ServiceRepository { pool }
    }

    /// Creates a new service. Names are unique across the catalog.
    pub async fn create(&self, service: NewService) -> DbResult<ServiceItem> {
        validate_required_text("name", &service.name, 200)?;
        validate_price_cents(service.default_price.cents())?;

        let now = Utc::now();
        let record = ServiceItem {
            id: Uuid::new_v4().to_string(),
            name: service.name.trim().to_string(),
            description: service.description,
            default_price: service.default_price,
            estimated_time_hours: service.estimated_time_hours,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %record.id, name = %record.name, "Creating service");

        sqlx::query(
            r#"
            INSERT INTO services (
                id, name, description, default_price, estimated_time_hours,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(&record.description)
        .bind(record.default_price)
        .bind(record.estimated_time_hours)
        .bind(record.is_active)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    /// Updates a service's details.
    pub async fn update(&self, id: &str, service: NewService) -> DbResult<()> {
        validate_required_text("name", &service.name, 200)?;
        validate_price_cents(service.default_price.cents())?;

        let result = sqlx::query(
            r#"
            UPDATE services SET
                name = ?2,
                description = ?3,
                default_price = ?4,
                estimated_time_hours = ?5,
                updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(service.name.trim())
        .bind(&service.description)
        .bind(service.default_price)
        .bind(service.estimated_time_hours)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Service", id));
        }

        Ok(())
    }

    /// Gets a service by ID.
    pub async fn find_by_id(&self, id: &str) -> DbResult<Option<ServiceItem>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM services WHERE id = ?1");
        let service = sqlx::query_as::<_, ServiceItem>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(service)
    }

    /// Searches active services by name.
    pub async fn search(&self, term: &str, limit: i64) -> DbResult<Vec<ServiceItem>> {
        let pattern = format!("%{term}%");
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM services \
             WHERE name LIKE ?1 AND is_active = 1 \
             ORDER BY name ASC LIMIT ?2"
        );
        let services = sqlx::query_as::<_, ServiceItem>(&sql)
            .bind(pattern)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(services)
    }

    /// Soft-deletes a service. Existing document lines keep resolving.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE services SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Service", id));
        }

        Ok(())
    }

    /// Hard-deletes a service.
    ///
    /// Refused while any job card line references it; those lines are
    /// billing history. Deactivation is the safe alternative.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let referenced: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM job_card_services WHERE service_id = ?1)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        if referenced {
            warn!(id = %id, "Refusing to delete service referenced by job cards");
            return Err(DbError::in_use("Service", id, "job card lines"));
        }

        let result = sqlx::query("DELETE FROM services WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Service", id));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_service, test_db};

    #[tokio::test]
    async fn test_create_and_search() {
        let db = test_db().await;
        seed_service(&db, "Engine diagnostics", 50_000).await;
        seed_service(&db, "Wheel alignment", 35_000).await;

        let hits = db.services().search("engine", 20).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].default_price.cents(), 50_000);
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let db = test_db().await;
        seed_service(&db, "Oil change", 20_000).await;

        let dup = db
            .services()
            .create(NewService {
                name: "Oil change".into(),
                description: None,
                default_price: Money::from_cents(25_000),
                estimated_time_hours: None,
            })
            .await;
        assert!(matches!(dup, Err(DbError::UniqueViolation { .. })));
    }

    #[tokio::test]
    async fn test_deactivate_hides_from_search() {
        let db = test_db().await;
        let service = seed_service(&db, "Oil change", 20_000).await;

        db.services().deactivate(&service.id).await.unwrap();

        let hits = db.services().search("oil", 20).await.unwrap();
        assert!(hits.is_empty());

        // Still resolvable by id for historical lines
        let found = db.services().find_by_id(&service.id).await.unwrap();
        assert!(found.is_some());
        assert!(!found.unwrap().is_active);
    }

    #[tokio::test]
    async fn test_delete_referenced_service_refused() {
        use crate::repository::job_card::{NewJobCard, NewServiceLine};
        use crate::test_support::{date, seed_branch, seed_customer, seed_vehicle, staff_ctx};

        let db = test_db().await;
        let branch = seed_branch(&db).await;
        let customer = seed_customer(&db).await;
        let vehicle = seed_vehicle(&db, &customer.id).await;
        let service = seed_service(&db, "Oil change", 20_000).await;

        db.job_cards()
            .create(
                &staff_ctx(&branch.id),
                NewJobCard {
                    vehicle_id: vehicle.id.clone(),
                    customer_id: customer.id.clone(),
                    assigned_mechanic_id: None,
                    date_received: date(2026, 8, 6),
                    date_promised_completion: None,
                    customer_complaints: "Routine service".into(),
                    mechanic_findings: None,
                    estimated_cost: None,
                    internal_notes: None,
                    services: vec![NewServiceLine {
                        service_id: service.id.clone(),
                        description_override: None,
                        quantity: 1,
                        unit_price: None,
                        notes: None,
                    }],
                    parts: vec![],
                    extras: vec![],
                },
            )
            .await
            .unwrap();

        let blocked = db.services().delete(&service.id).await;
        assert!(matches!(blocked, Err(DbError::InUse { .. })));

        // Still present and usable
        assert!(db
            .services()
            .find_by_id(&service.id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_delete_unreferenced() {
        let db = test_db().await;
        let service = seed_service(&db, "Oil change", 20_000).await;

        db.services().delete(&service.id).await.unwrap();
        assert!(db
            .services()
            .find_by_id(&service.id)
            .await
            .unwrap()
            .is_none());
    }
}
