//! Database-specific error types and conversions.

use orgiam_core::error::OrgIamError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Record already exists: {entity} with id {id}")]
    AlreadyExists { entity: String, id: String },

    /// The `version` guard of a conditional update did not match.
    #[error("Version mismatch on {entity} {id}")]
    Conflict { entity: String, id: String },

    #[error("Malformed {entity} record: {reason}")]
    Malformed { entity: String, reason: String },

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
}

impl DbError {
    pub(crate) fn malformed(entity: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            entity: entity.to_string(),
            reason: reason.into(),
        }
    }

    /// Classify a failed `CREATE`: an existing record id or a unique index
    /// hit becomes [`DbError::AlreadyExists`].
    pub(crate) fn on_create(entity: &str, id: &str, err: surrealdb::Error) -> Self {
        let message = err.to_string();
        if message.contains("already exists") || message.contains("already contains") {
            Self::AlreadyExists {
                entity: entity.to_string(),
                id: id.to_string(),
            }
        } else {
            Self::Surreal(err)
        }
    }
}

impl From<DbError> for OrgIamError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => OrgIamError::NotFound { entity, id },
            DbError::AlreadyExists { entity, id } => OrgIamError::AlreadyExists { entity, id },
            DbError::Conflict { entity, id } => OrgIamError::Conflict { entity, id },
            DbError::PasswordHash(reason) => OrgIamError::Internal(reason),
            other => OrgIamError::Database(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_failure_is_internal() {
        let err: OrgIamError = DbError::PasswordHash("output too short".into()).into();
        assert!(matches!(err, OrgIamError::Internal(ref reason) if reason == "output too short"));
    }

    #[test]
    fn version_mismatch_is_a_conflict() {
        let err: OrgIamError = DbError::Conflict {
            entity: "employee".into(),
            id: "emp_1".into(),
        }
        .into();
        assert!(matches!(err, OrgIamError::Conflict { ref id, .. } if id == "emp_1"));
    }
}
