//! Team domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::roles::RoleSet;

/// A team of employees, optionally owned by a department. The lead, when
/// set, holds the `Lead` role and references exactly this team.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Team {
    /// External identifier, `team_<N>`.
    pub id: String,
    pub name: String,
    pub roles: RoleSet,
    pub lead_id: Option<String>,
    pub department_id: Option<String>,
    /// Set while a lead handover is in flight.
    pub handover_to: Option<String>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CreateTeam {
    pub name: String,
    pub roles: RoleSet,
    pub lead_id: Option<String>,
    pub department_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateTeam {
    pub name: Option<String>,
    /// Roles added to the team and granted to its lead.
    pub add_roles: RoleSet,
    /// New lead; triggers a handover when it differs from the current one.
    pub lead_id: Option<String>,
}

/// Storage-level record for a new team document.
#[derive(Debug, Clone)]
pub struct NewTeam {
    pub id: String,
    pub name: String,
    pub roles: RoleSet,
    pub lead_id: Option<String>,
    pub department_id: Option<String>,
}
