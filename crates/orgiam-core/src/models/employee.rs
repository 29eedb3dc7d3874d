//! Employee domain model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::roles::{self, RoleSet, ScopeRoles};

/// Organizational role label carried on the employee record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RoleLabel {
    /// Head of department.
    #[serde(rename = "HOD")]
    Hod,
    Lead,
    Member,
}

impl RoleLabel {
    pub const fn as_str(self) -> &'static str {
        match self {
            RoleLabel::Hod => "HOD",
            RoleLabel::Lead => "Lead",
            RoleLabel::Member => "Member",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "HOD" => Some(RoleLabel::Hod),
            "Lead" => Some(RoleLabel::Lead),
            "Member" => Some(RoleLabel::Member),
            _ => None,
        }
    }
}

impl fmt::Display for RoleLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Convergence state between the employee's role map and the policy store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SyncState {
    /// `granted_roles` matches the flattened role map.
    #[default]
    Synced,
    /// Local state is ahead of the policy store; a reconciliation pass
    /// must re-run the diff.
    Pending,
    /// A full revoke has been requested and not yet confirmed. The
    /// principal may hold fewer roles than desired in this window.
    Revoking,
}

impl SyncState {
    pub const fn as_str(self) -> &'static str {
        match self {
            SyncState::Synced => "Synced",
            SyncState::Pending => "Pending",
            SyncState::Revoking => "Revoking",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Synced" => Some(SyncState::Synced),
            "Pending" => Some(SyncState::Pending),
            "Revoking" => Some(SyncState::Revoking),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Employee {
    /// External identifier, `emp_<N>`.
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    /// Principal used in the external policy store.
    pub email: String,
    pub password_hash: String,
    pub role: Option<RoleLabel>,
    pub department_id: Option<String>,
    /// Team references. Ordered, but membership has set semantics.
    pub team_ids: Vec<String>,
    /// Role names per scope (department id, team id, or `"0"`).
    pub iam_roles: ScopeRoles,
    /// Roles the policy store is believed to hold for this principal.
    pub granted_roles: RoleSet,
    pub sync_state: SyncState,
    /// Former principals (old emails) whose full revoke has not been
    /// confirmed yet. Retried on every sync until empty.
    pub retired_principals: Vec<String>,
    /// Optimistic concurrency counter, bumped on every write.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Employee {
    pub fn principal(&self) -> &str {
        &self.email
    }

    /// Flattened role map: what the policy store should hold.
    pub fn desired_roles(&self) -> RoleSet {
        roles::flatten(&self.iam_roles)
    }
}

/// Request to create an employee through the consistency engine.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CreateEmployee {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Raw password (hashed with Argon2id before storage).
    pub password: String,
    /// Only `Member` (or nothing) is accepted here; head and lead positions
    /// are granted by department and team operations.
    pub role: Option<RoleLabel>,
    pub department_id: Option<String>,
    pub team_ids: Vec<String>,
    pub iam_roles: ScopeRoles,
}

/// Profile changes plus additive team membership.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateEmployee {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    /// Teams to join, with the roles granted under each.
    pub add_teams: ScopeRoles,
}

/// Additive role assignment for one scope.
///
/// The scope is the team when `team_id` is set, otherwise the department.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AssignRoles {
    pub department_id: Option<String>,
    pub team_id: Option<String>,
    pub roles: RoleSet,
    /// Applied only when the employee has no role yet.
    pub role: Option<RoleLabel>,
}

/// Removal of specific roles from one scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokeRoles {
    pub scope: String,
    pub roles: RoleSet,
}

/// Storage-level record for a new employee document.
#[derive(Debug, Clone)]
pub struct NewEmployee {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Raw password; the repository stores only its hash.
    pub password: String,
    pub role: Option<RoleLabel>,
    pub department_id: Option<String>,
    pub team_ids: Vec<String>,
    pub iam_roles: ScopeRoles,
}
