//! Department domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::roles::RoleSet;

/// A department. Its head is mandatory and must hold the `HOD` role for
/// this department.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Department {
    /// External identifier, `dept_<N>`.
    pub id: String,
    pub name: String,
    /// Bootstrap roles granted to the head.
    pub default_roles: RoleSet,
    pub head_id: String,
    /// Set while a head handover is in flight.
    pub handover_to: Option<String>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDepartment {
    pub name: String,
    pub default_roles: RoleSet,
    pub head_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateDepartment {
    pub name: Option<String>,
    /// Roles added to the department defaults and granted to the head.
    pub add_roles: RoleSet,
    /// New head; triggers a handover when it differs from the current one.
    pub head_id: Option<String>,
}

/// Storage-level record for a new department document.
#[derive(Debug, Clone)]
pub struct NewDepartment {
    pub id: String,
    pub name: String,
    pub default_roles: RoleSet,
    pub head_id: String,
}
