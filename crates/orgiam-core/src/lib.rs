//! ORGIAM Core: domain models, error taxonomy, storage and policy-store
//! traits, and the pure pieces of the consistency engine: identifier
//! parsing, role set algebra and the membership state machine.

pub mod error;
pub mod id;
pub mod membership;
pub mod models;
pub mod policy;
pub mod repository;
pub mod roles;
