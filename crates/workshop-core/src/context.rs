//! # Request Context
//!
//! The authenticated identity and branch scope every core operation runs
//! under. Authentication itself happens outside this crate; callers hand in
//! an already-verified identity. Nothing here is ever read from ambient
//! global state.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::CoreError;

// =============================================================================
// Role
// =============================================================================

/// What the acting user is allowed to see and do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Sees every branch; may manage branches themselves.
    SystemAdmin,
    /// Manages one branch, including its catalog and staff work.
    BranchAdmin,
    /// Day-to-day document work within one branch.
    Staff,
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system_admin" => Ok(Role::SystemAdmin),
            "branch_admin" => Ok(Role::BranchAdmin),
            "staff" => Ok(Role::Staff),
            other => Err(CoreError::UnknownStatus {
                entity: "role",
                value: other.to_string(),
            }),
        }
    }
}

// =============================================================================
// Request Context
// =============================================================================

/// Explicit per-request context passed into every repository operation that
/// writes audit fields or filters by branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// The authenticated user performing the operation.
    pub acting_user_id: String,
    /// The branch the user is working in. None only for system admins
    /// operating outside any particular branch.
    pub branch_id: Option<String>,
    pub role: Role,
}

impl RequestContext {
    pub fn new(acting_user_id: impl Into<String>, branch_id: Option<String>, role: Role) -> Self {
        RequestContext {
            acting_user_id: acting_user_id.into(),
            branch_id,
            role,
        }
    }

    /// The branch filter to apply to listings.
    ///
    /// System admins see every branch (no filter); everyone else is scoped
    /// to their own branch.
    pub fn branch_scope(&self) -> Option<&str> {
        match self.role {
            Role::SystemAdmin => None,
            _ => self.branch_id.as_deref(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
