//! # Customer Repository
//!
//! Customers own vehicles and appear on every document in the money flow.
//! Deleting a customer cascades to their vehicles, which makes deletion a
//! real business risk; it is therefore refused while any quotation, job
//! card or invoice still references the customer.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use workshop_core::validation::{validate_email, validate_required_text};
use workshop_core::Customer;

/// Input for creating or updating a customer.
#[derive(Debug, Clone, Default)]
pub struct NewCustomer {
    pub full_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub company_name: Option<String>,
    pub tin_number: Option<String>,
    pub vrn_number: Option<String>,
}

impl NewCustomer {
    fn validate(&self) -> DbResult<()> {
        validate_required_text("full_name", &self.full_name, 200)?;
        if let Some(email) = self.email.as_deref() {
            validate_email(email)?;
        }
        Ok(())
    }
}

/// Repository for customer records.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

const SELECT_COLUMNS: &str = "id, full_name, phone, email, address, company_name, \
                              tin_number, vrn_number, created_at, updated_at";

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Creates a new customer.
    ///
    /// Phone and email, when given, must be unique across all customers;
    /// a duplicate surfaces as a UniqueViolation naming the column.
    pub async fn create(&self, customer: NewCustomer) -> DbResult<Customer> {
        customer.validate()?;

        let now = Utc::now();
        let record = Customer {
            id: Uuid::new_v4().to_string(),
            full_name: customer.full_name.trim().to_string(),
            phone: customer.phone,
            email: customer.email,
            address: customer.address,
            company_name: customer.company_name,
            tin_number: customer.tin_number,
            vrn_number: customer.vrn_number,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %record.id, "Creating customer");

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, full_name, phone, email, address,
                company_name, tin_number, vrn_number, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&record.id)
        .bind(&record.full_name)
        .bind(&record.phone)
        .bind(&record.email)
        .bind(&record.address)
        .bind(&record.company_name)
        .bind(&record.tin_number)
        .bind(&record.vrn_number)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    /// Updates a customer's details.
    pub async fn update(&self, id: &str, customer: NewCustomer) -> DbResult<()> {
        customer.validate()?;

        let result = sqlx::query(
            r#"
            UPDATE customers SET
                full_name = ?2,
                phone = ?3,
                email = ?4,
                address = ?5,
                company_name = ?6,
                tin_number = ?7,
                vrn_number = ?8,
                updated_at = ?9
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(customer.full_name.trim())
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(&customer.address)
        .bind(&customer.company_name)
        .bind(&customer.tin_number)
        .bind(&customer.vrn_number)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }

        Ok(())
    }

    /// Gets a customer by ID.
    pub async fn find_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM customers WHERE id = ?1");
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(customer)
    }

    /// Gets a customer by email.
    pub async fn find_by_email(&self, email: &str) -> DbResult<Option<Customer>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM customers WHERE email = ?1");
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(customer)
    }

    /// Lists customers alphabetically.
    pub async fn list(&self, limit: i64, offset: i64) -> DbResult<Vec<Customer>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM customers ORDER BY full_name ASC LIMIT ?1 OFFSET ?2"
        );
        let customers = sqlx::query_as::<_, Customer>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(customers)
    }

    /// Deletes a customer and, by cascade, their vehicles.
    ///
    /// Refused while any document still references the customer; those
    /// documents are the financial history and must stay resolvable.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let referenced: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(SELECT 1 FROM quotations WHERE customer_id = ?1)
                OR EXISTS(SELECT 1 FROM job_cards WHERE customer_id = ?1)
                OR EXISTS(SELECT 1 FROM invoices WHERE customer_id = ?1)
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        if referenced {
            warn!(id = %id, "Refusing to delete customer referenced by documents");
            return Err(DbError::in_use("Customer", id, "documents"));
        }

        let result = sqlx::query("DELETE FROM customers WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
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
    use crate::test_support::{seed_customer, seed_vehicle, test_db};

    #[tokio::test]
    async fn test_create_and_find() {
        let db = test_db().await;
        let customer = seed_customer(&db).await;

        let found = db
            .customers()
            .find_by_id(&customer.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.full_name, "Asha Mwinyi");

        let by_email = db
            .customers()
            .find_by_email("asha@example.com")
            .await
            .unwrap();
        assert!(by_email.is_some());
    }

    #[tokio::test]
    async fn test_missing_name_rejected() {
        let db = test_db().await;

        let result = db
            .customers()
            .create(NewCustomer {
                full_name: "  ".into(),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(DbError::Domain(_))));
    }

    #[tokio::test]
    async fn test_invalid_email_rejected() {
        let db = test_db().await;

        let result = db
            .customers()
            .create(NewCustomer {
                full_name: "Juma K".into(),
                email: Some("not-an-email".into()),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(DbError::Domain(_))));
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let db = test_db().await;
        seed_customer(&db).await;

        let result = db
            .customers()
            .create(NewCustomer {
                full_name: "Other Person".into(),
                email: Some("asha@example.com".into()),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(DbError::UniqueViolation { .. })));
    }

    #[tokio::test]
    async fn test_delete_cascades_vehicles() {
        let db = test_db().await;
        let customer = seed_customer(&db).await;
        let vehicle = seed_vehicle(&db, &customer.id).await;

        db.customers().delete(&customer.id).await.unwrap();

        let gone = db.vehicles().find_by_id(&vehicle.id).await.unwrap();
        assert!(gone.is_none());
    }

    #[tokio::test]
    async fn test_update() {
        let db = test_db().await;
        let customer = seed_customer(&db).await;

        db.customers()
            .update(
                &customer.id,
                NewCustomer {
                    full_name: "Asha M. Mwinyi".into(),
                    phone: customer.phone.clone(),
                    email: customer.email.clone(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let found = db
            .customers()
            .find_by_id(&customer.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.full_name, "Asha M. Mwinyi");
    }
}
