//! ORGIAM Database: SurrealDB connection management and repository
//! implementations.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - Error types ([`DbError`])
//! - Repositories for the `orgiam-core` traits, plus a table-backed
//!   [`SurrealPolicyStore`]

mod connection;
mod error;
pub mod repository;
mod schema;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use repository::{
    SurrealDepartmentRepository, SurrealEmployeeRepository, SurrealPolicyStore,
    SurrealSyncIncidentRepository, SurrealTeamRepository,
};
pub use schema::{latest_version, run_migrations};
