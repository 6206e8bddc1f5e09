//! # Branch Repository
//!
//! Branches scope nearly everything else: documents carry a branch id,
//! document numbers embed the branch code, and non-admin listings filter
//! by branch.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use workshop_core::validation::validate_required_text;
use workshop_core::Branch;

/// Input for creating a branch.
#[derive(Debug, Clone)]
pub struct NewBranch {
    /// Short token embedded in document numbers, e.g. "01" or "DSM".
    pub code: String,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
}

/// Repository for branch records.
#[derive(Debug, Clone)]
pub struct BranchRepository {
    pool: SqlitePool,
}

impl BranchRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BranchRepository { pool }
    }

    /// Creates a new branch. The code must be unique across the system.
    pub async fn create(&self, branch: NewBranch) -> DbResult<Branch> {
        validate_required_text("code", &branch.code, 10)?;
        validate_required_text("name", &branch.name, 200)?;

        let now = Utc::now();
        let record = Branch {
            id: Uuid::new_v4().to_string(),
            code: branch.code.trim().to_string(),
            name: branch.name.trim().to_string(),
            address: branch.address,
            phone: branch.phone,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %record.id, code = %record.code, "Creating branch");

        sqlx::query(
            r#"
            INSERT INTO branches (id, code, name, address, phone, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&record.id)
        .bind(&record.code)
        .bind(&record.name)
        .bind(&record.address)
        .bind(&record.phone)
        .bind(record.is_active)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    /// Gets a branch by ID.
    pub async fn find_by_id(&self, id: &str) -> DbResult<Option<Branch>> {
        let branch = sqlx::query_as::<_, Branch>(
            r#"
            SELECT id, code, name, address, phone, is_active, created_at, updated_at
            FROM branches
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(branch)
    }

    /// Lists all branches, active first, alphabetically within.
    pub async fn list(&self) -> DbResult<Vec<Branch>> {
        let branches = sqlx::query_as::<_, Branch>(
            r#"
            SELECT id, code, name, address, phone, is_active, created_at, updated_at
            FROM branches
            ORDER BY is_active DESC, name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(branches)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_db;

    #[tokio::test]
    async fn test_create_and_find() {
        let db = test_db().await;

        let branch = db
            .branches()
            .create(NewBranch {
                code: "01".into(),
                name: "Main Branch".into(),
                address: None,
                phone: None,
            })
            .await
            .unwrap();

        let found = db.branches().find_by_id(&branch.id).await.unwrap().unwrap();
        assert_eq!(found.code, "01");
        assert!(found.is_active);
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let db = test_db().await;
        let repo = db.branches();

        repo.create(NewBranch {
            code: "01".into(),
            name: "Main".into(),
            address: None,
            phone: None,
        })
        .await
        .unwrap();

        let dup = repo
            .create(NewBranch {
                code: "01".into(),
                name: "Other".into(),
                address: None,
                phone: None,
            })
            .await;
        assert!(matches!(
            dup,
            Err(crate::error::DbError::UniqueViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_list() {
        let db = test_db().await;
        let repo = db.branches();

        for (code, name) in [("02", "Arusha"), ("01", "Dar es Salaam")] {
            repo.create(NewBranch {
                code: code.into(),
                name: name.into(),
                address: None,
                phone: None,
            })
            .await
            .unwrap();
        }

        let branches = repo.list().await.unwrap();
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].name, "Arusha");
    }
}
