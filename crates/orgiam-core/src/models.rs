//! Domain models for ORGIAM.
//!
//! These are the core types shared across all crates.

pub mod department;
pub mod employee;
pub mod incident;
pub mod team;
