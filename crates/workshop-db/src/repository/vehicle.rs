//! # Vehicle Repository
//!
//! Vehicles belong exclusively to one customer. Every job card is written
//! against a vehicle, so job card creation verifies ownership through this
//! repository before any transaction opens.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use workshop_core::validation::{validate_required_text, validate_vehicle_identity};
use workshop_core::Vehicle;

/// Input for creating a vehicle.
#[derive(Debug, Clone)]
pub struct NewVehicle {
    pub customer_id: String,
    pub make: String,
    pub model: String,
    pub year: Option<i64>,
    pub vin: Option<String>,
    pub license_plate: Option<String>,
    pub color: Option<String>,
    pub notes: Option<String>,
}

/// Repository for vehicle records.
#[derive(Debug, Clone)]
pub struct VehicleRepository {
    pool: SqlitePool,
}

const SELECT_COLUMNS: &str = "id, customer_id, make, model, year, vin, license_plate, \
                              color, notes, created_at, updated_at";

impl VehicleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        VehicleRepository { pool }
    }

    /// Creates a new vehicle.
    ///
    /// At least one of VIN / license plate is required, and each is unique
    /// across the system when present.
    pub async fn create(&self, vehicle: NewVehicle) -> DbResult<Vehicle> {
        validate_required_text("make", &vehicle.make, 100)?;
        validate_required_text("model", &vehicle.model, 100)?;
        validate_vehicle_identity(vehicle.vin.as_deref(), vehicle.license_plate.as_deref())?;

        let now = Utc::now();
        let record = Vehicle {
            id: Uuid::new_v4().to_string(),
            customer_id: vehicle.customer_id,
            make: vehicle.make.trim().to_string(),
            model: vehicle.model.trim().to_string(),
            year: vehicle.year,
            vin: vehicle.vin.filter(|v| !v.trim().is_empty()),
            license_plate: vehicle.license_plate.filter(|p| !p.trim().is_empty()),
            color: vehicle.color,
            notes: vehicle.notes,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %record.id, customer_id = %record.customer_id, "Creating vehicle");

        sqlx::query(
            r#"
            INSERT INTO vehicles (
                id, customer_id, make, model, year, vin, license_plate,
                color, notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&record.id)
        .bind(&record.customer_id)
        .bind(&record.make)
        .bind(&record.model)
        .bind(record.year)
        .bind(&record.vin)
        .bind(&record.license_plate)
        .bind(&record.color)
        .bind(&record.notes)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    /// Gets a vehicle by ID.
    pub async fn find_by_id(&self, id: &str) -> DbResult<Option<Vehicle>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM vehicles WHERE id = ?1");
        let vehicle = sqlx::query_as::<_, Vehicle>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(vehicle)
    }

    /// Gets a vehicle by VIN.
    pub async fn find_by_vin(&self, vin: &str) -> DbResult<Option<Vehicle>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM vehicles WHERE vin = ?1");
        let vehicle = sqlx::query_as::<_, Vehicle>(&sql)
            .bind(vin)
            .fetch_optional(&self.pool)
            .await?;

        Ok(vehicle)
    }

    /// Lists a customer's vehicles.
    pub async fn list_by_customer(&self, customer_id: &str) -> DbResult<Vec<Vehicle>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM vehicles WHERE customer_id = ?1 \
             ORDER BY make ASC, model ASC"
        );
        let vehicles = sqlx::query_as::<_, Vehicle>(&sql)
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(vehicles)
    }

    /// Loads a vehicle and verifies it belongs to the stated customer.
    ///
    /// The ownership check runs before document transactions open, so a
    /// mismatched selection never reaches the database constraints.
    pub async fn find_owned(&self, vehicle_id: &str, customer_id: &str) -> DbResult<Vehicle> {
        let vehicle = self
            .find_by_id(vehicle_id)
            .await?
            .ok_or_else(|| DbError::not_found("Vehicle", vehicle_id))?;

        if vehicle.customer_id != customer_id {
            return Err(workshop_core::CoreError::ReferentialMismatch {
                subject: "vehicle",
                subject_id: vehicle_id.to_string(),
                owner: "customer",
                owner_id: customer_id.to_string(),
            }
            .into());
        }

        Ok(vehicle)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
