//! A [`PolicyStore`] backed by the `role_binding` table.
//!
//! Deployments without an external authorization service use this as
//! the policy store; one row per (principal, role) pair.

use orgiam_core::error::OrgIamResult;
use orgiam_core::policy::PolicyStore;
use orgiam_core::roles::RoleSet;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct BindingRow {
    role: String,
}

#[derive(Clone)]
pub struct SurrealPolicyStore<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealPolicyStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> PolicyStore for SurrealPolicyStore<C> {
    async fn grant(&self, principal: &str, role: &str) -> OrgIamResult<()> {
        let result = self
            .db
            .query("CREATE role_binding SET principal = $principal, role = $role RETURN NONE")
            .bind(("principal", principal.to_string()))
            .bind(("role", role.to_string()))
            .await
            .map_err(DbError::from)?;

        match result.check() {
            Ok(_) => {
                debug!(principal, role, "Role granted");
                Ok(())
            }
            Err(e) => match DbError::on_create("role_binding", principal, e) {
                // Unique (principal, role) index: already granted.
                DbError::AlreadyExists { .. } => Ok(()),
                other => Err(other.into()),
            },
        }
    }

    async fn revoke_all(&self, principal: &str) -> OrgIamResult<()> {
        self.db
            .query("DELETE role_binding WHERE principal = $principal")
            .bind(("principal", principal.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from)?;

        debug!(principal, "All roles revoked");
        Ok(())
    }

    async fn roles_of(&self, principal: &str) -> OrgIamResult<RoleSet> {
        let mut result = self
            .db
            .query("SELECT role FROM role_binding WHERE principal = $principal")
            .bind(("principal", principal.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<BindingRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().map(|r| r.role).collect())
    }
}
