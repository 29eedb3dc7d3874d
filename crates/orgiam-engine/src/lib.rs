//! ORGIAM Engine: identifier allocation, policy synchronization and the
//! consistency engine that keeps employee, team and department documents
//! in step with the policy store.

pub mod allocator;
pub mod audit;
pub mod config;
mod departments;
pub mod memory;
pub mod service;
pub mod sync;
mod teams;

pub use allocator::IdAllocator;
pub use audit::{AuditReport, Finding, FindingKind, RepairSummary};
pub use config::EngineConfig;
pub use memory::{InMemoryPolicyStore, PolicyCall};
pub use service::{OrgService, ReconcileSummary};
pub use sync::{PolicySynchronizer, SyncReport};
