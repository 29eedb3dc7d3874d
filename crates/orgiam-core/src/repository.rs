//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Documents carry a `version`
//! counter; `save` is a compare-and-swap on that counter and fails with
//! [`OrgIamError::Conflict`](crate::error::OrgIamError::Conflict) when the
//! stored document moved on.

use crate::error::OrgIamResult;
use crate::models::{
    department::{Department, NewDepartment},
    employee::{Employee, NewEmployee},
    incident::{CreateSyncIncident, SyncIncident},
    team::{NewTeam, Team},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

pub trait EmployeeRepository: Send + Sync {
    /// Insert a new employee. Fails with `AlreadyExists` when the id or
    /// the email is taken. The new document starts `Pending` with nothing
    /// granted.
    fn create(&self, input: NewEmployee) -> impl Future<Output = OrgIamResult<Employee>> + Send;
    fn get(&self, id: &str) -> impl Future<Output = OrgIamResult<Employee>> + Send;
    fn find_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = OrgIamResult<Option<Employee>>> + Send;
    /// Overwrite the stored document if its version still equals
    /// `employee.version`. Returns the stored document with the bumped
    /// version.
    fn save(&self, employee: &Employee) -> impl Future<Output = OrgIamResult<Employee>> + Send;
    fn set_password(
        &self,
        id: &str,
        password: &str,
    ) -> impl Future<Output = OrgIamResult<()>> + Send;
    fn delete(&self, id: &str) -> impl Future<Output = OrgIamResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = OrgIamResult<PaginatedResult<Employee>>> + Send;
    fn list_ids(&self) -> impl Future<Output = OrgIamResult<Vec<String>>> + Send;
    /// Employees whose department reference equals `department_id`.
    fn list_by_department(
        &self,
        department_id: &str,
    ) -> impl Future<Output = OrgIamResult<Vec<Employee>>> + Send;
    /// Employees whose team references contain `team_id`.
    fn list_by_team(
        &self,
        team_id: &str,
    ) -> impl Future<Output = OrgIamResult<Vec<Employee>>> + Send;
    /// Employees not in the `Synced` state, oldest update first.
    fn list_unsynced(
        &self,
        limit: u64,
    ) -> impl Future<Output = OrgIamResult<Vec<Employee>>> + Send;
}

pub trait TeamRepository: Send + Sync {
    fn create(&self, input: NewTeam) -> impl Future<Output = OrgIamResult<Team>> + Send;
    fn get(&self, id: &str) -> impl Future<Output = OrgIamResult<Team>> + Send;
    fn save(&self, team: &Team) -> impl Future<Output = OrgIamResult<Team>> + Send;
    fn delete(&self, id: &str) -> impl Future<Output = OrgIamResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = OrgIamResult<PaginatedResult<Team>>> + Send;
    fn list_ids(&self) -> impl Future<Output = OrgIamResult<Vec<String>>> + Send;
    fn list_by_department(
        &self,
        department_id: &str,
    ) -> impl Future<Output = OrgIamResult<Vec<Team>>> + Send;
}

pub trait DepartmentRepository: Send + Sync {
    fn create(&self, input: NewDepartment)
    -> impl Future<Output = OrgIamResult<Department>> + Send;
    fn get(&self, id: &str) -> impl Future<Output = OrgIamResult<Department>> + Send;
    fn save(
        &self,
        department: &Department,
    ) -> impl Future<Output = OrgIamResult<Department>> + Send;
    fn delete(&self, id: &str) -> impl Future<Output = OrgIamResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = OrgIamResult<PaginatedResult<Department>>> + Send;
    fn list_ids(&self) -> impl Future<Output = OrgIamResult<Vec<String>>> + Send;
}

/// Append-only journal of divergences between local state and the
/// policy store.
pub trait SyncIncidentRepository: Send + Sync {
    fn append(
        &self,
        input: CreateSyncIncident,
    ) -> impl Future<Output = OrgIamResult<SyncIncident>> + Send;
    /// Newest first.
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = OrgIamResult<PaginatedResult<SyncIncident>>> + Send;
}
