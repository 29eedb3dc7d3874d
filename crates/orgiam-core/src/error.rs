//! Error types for the ORGIAM system.

use thiserror::Error;

use crate::id::EntityKind;
use crate::membership::Violation;

#[derive(Debug, Error)]
pub enum OrgIamError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity} with id {id}")]
    AlreadyExists { entity: String, id: String },

    /// An optimistic version check failed: the document changed between
    /// read and write.
    #[error("Concurrent modification of {entity} {id}")]
    Conflict { entity: String, id: String },

    #[error("Invariant violation: {0}")]
    InvariantViolation(#[from] Violation),

    #[error("Identifier allocation for {kind} exhausted after {attempts} attempts")]
    AllocationExhausted { kind: EntityKind, attempts: u32 },

    /// Local state was persisted but the policy store did not fully
    /// converge. Local state stays authoritative.
    #[error(
        "Policy sync for {principal} incomplete: granted {granted:?}, failed {failed:?} ({detail})"
    )]
    PartialSync {
        principal: String,
        granted: Vec<String>,
        failed: Vec<String>,
        detail: String,
    },

    #[error("Cascade delete of {entity} {id} incomplete: {failures:?}")]
    CascadeIncomplete {
        entity: String,
        id: String,
        failures: Vec<String>,
    },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Policy store error: {0}")]
    Policy(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OrgIamError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type OrgIamResult<T> = Result<T, OrgIamError>;
