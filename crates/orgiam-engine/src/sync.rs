//! Policy synchronizer.
//!
//! Pushes an employee's flattened role set to the scope-blind policy
//! store. The diff is taken against the roles the engine believes the
//! principal holds (`Employee::granted_roles`), not against a remote read.
//! Every grant is a separate call; a failure part way through is reported
//! in the [`SyncReport`] and never rolled back.

use orgiam_core::error::OrgIamResult;
use orgiam_core::policy::PolicyStore;
use orgiam_core::roles::{self, RoleSet};
use tracing::{debug, warn};

/// Outcome of one reconciliation against the policy store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Roles granted by this call.
    pub granted: Vec<String>,
    /// Roles that should be held (or should have been revoked) but the
    /// store call failed.
    pub failed: Vec<String>,
    /// Whether the principal was fully revoked as part of this call.
    pub revoked_all: bool,
    /// A required full revoke was rejected by the store.
    pub revoke_failed: bool,
    /// What the principal holds afterwards, to the engine's knowledge.
    pub held_after: RoleSet,
    /// First store error, if any.
    pub error: Option<String>,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && !self.revoke_failed
    }
}

pub struct PolicySynchronizer<P: PolicyStore> {
    store: P,
}

impl<P: PolicyStore> PolicySynchronizer<P> {
    pub fn new(store: P) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &P {
        &self.store
    }

    /// Bring `principal` from `held` to `desired`.
    ///
    /// Grants the missing roles. When `held` contains a role that is no
    /// longer desired, the store cannot revoke a single role, so the
    /// principal is fully revoked and `desired` granted from scratch.
    pub async fn reconcile(&self, principal: &str, desired: &RoleSet, held: &RoleSet) -> SyncReport {
        let stale = roles::difference(held, desired);
        if !stale.is_empty() {
            debug!(principal, stale = ?stale, "Stale roles held, replacing role set");
            return self.replace(principal, desired, held).await;
        }
        self.grant_missing(principal, desired, held.clone()).await
    }

    /// Full revoke followed by granting `desired`.
    pub async fn replace(&self, principal: &str, desired: &RoleSet, held: &RoleSet) -> SyncReport {
        if let Err(err) = self.store.revoke_all(principal).await {
            warn!(principal, error = %err, "Full revoke failed");
            return SyncReport {
                failed: roles::difference(held, desired).into_iter().collect(),
                revoke_failed: true,
                held_after: held.clone(),
                error: Some(err.to_string()),
                ..SyncReport::default()
            };
        }

        let mut report = self.grant_missing(principal, desired, RoleSet::new()).await;
        report.revoked_all = true;
        report
    }

    /// Revoke every role of `principal`.
    pub async fn revoke_all(&self, principal: &str) -> OrgIamResult<()> {
        self.store.revoke_all(principal).await?;
        debug!(principal, "Principal fully revoked");
        Ok(())
    }

    async fn grant_missing(&self, principal: &str, desired: &RoleSet, held: RoleSet) -> SyncReport {
        let mut report = SyncReport {
            held_after: held,
            ..SyncReport::default()
        };

        for role in roles::difference(desired, &report.held_after) {
            match self.store.grant(principal, &role).await {
                Ok(()) => {
                    report.held_after.insert(role.clone());
                    report.granted.push(role);
                }
                Err(err) => {
                    warn!(principal, role = %role, error = %err, "Grant failed");
                    report.error.get_or_insert_with(|| err.to_string());
                    report.failed.push(role);
                }
            }
        }

        debug!(
            principal,
            granted = ?report.granted,
            failed = ?report.failed,
            "Policy sync finished"
        );
        report
    }
}
