//! SurrealDB repository implementations.

use surrealdb_types::SurrealValue;

mod department;
mod employee;
mod incident;
mod policy;
mod team;

pub use department::SurrealDepartmentRepository;
pub use employee::SurrealEmployeeRepository;
pub use incident::SurrealSyncIncidentRepository;
pub use policy::SurrealPolicyStore;
pub use team::SurrealTeamRepository;

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// Row struct for id-only projections.
#[derive(Debug, SurrealValue)]
struct IdRow {
    record_id: String,
}

/// Returned by guarded updates; an empty result means the guard failed.
#[derive(Debug, SurrealValue)]
struct VersionRow {
    #[allow(dead_code)]
    version: u64,
}
