//! In-process [`PolicyStore`] with a call log and fault injection.
//!
//! Clones share state, so a handle kept outside the engine observes every
//! call the engine makes.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use orgiam_core::error::{OrgIamError, OrgIamResult};
use orgiam_core::policy::PolicyStore;
use orgiam_core::roles::RoleSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyCall {
    Grant { principal: String, role: String },
    RevokeAll { principal: String },
}

#[derive(Debug, Default)]
struct State {
    bindings: HashMap<String, RoleSet>,
    calls: Vec<PolicyCall>,
    failing_roles: HashSet<String>,
    failing_revokes: HashSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryPolicyStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every grant of `role` fail until [`heal`](Self::heal).
    pub fn fail_grants_of(&self, role: &str) {
        self.lock().failing_roles.insert(role.to_string());
    }

    /// Make every full revoke of `principal` fail until [`heal`](Self::heal).
    pub fn fail_revokes_of(&self, principal: &str) {
        self.lock().failing_revokes.insert(principal.to_string());
    }

    pub fn heal(&self) {
        let mut state = self.lock();
        state.failing_roles.clear();
        state.failing_revokes.clear();
    }

    pub fn held(&self, principal: &str) -> RoleSet {
        self.lock()
            .bindings
            .get(principal)
            .cloned()
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<PolicyCall> {
        self.lock().calls.clone()
    }

    /// Roles granted to `principal` since the log was last cleared, in
    /// call order.
    pub fn grants_to(&self, principal: &str) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                PolicyCall::Grant { principal: p, role } if p == principal => Some(role.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }
}

impl PolicyStore for InMemoryPolicyStore {
    async fn grant(&self, principal: &str, role: &str) -> OrgIamResult<()> {
        let mut state = self.lock();
        state.calls.push(PolicyCall::Grant {
            principal: principal.to_string(),
            role: role.to_string(),
        });
        if state.failing_roles.contains(role) {
            return Err(OrgIamError::Policy(format!(
                "grant of {role} to {principal} rejected"
            )));
        }
        state
            .bindings
            .entry(principal.to_string())
            .or_default()
            .insert(role.to_string());
        Ok(())
    }

    async fn revoke_all(&self, principal: &str) -> OrgIamResult<()> {
        let mut state = self.lock();
        state.calls.push(PolicyCall::RevokeAll {
            principal: principal.to_string(),
        });
        if state.failing_revokes.contains(principal) {
            return Err(OrgIamError::Policy(format!(
                "revoke of {principal} rejected"
            )));
        }
        state.bindings.remove(principal);
        Ok(())
    }

    async fn roles_of(&self, principal: &str) -> OrgIamResult<RoleSet> {
        Ok(self.held(principal))
    }
}

#[cfg(test)]
mod tests {
    use orgiam_core::roles::role_set;

    use super::*;
    use crate::sync::PolicySynchronizer;

    #[tokio::test]
    async fn reconcile_grants_only_missing_roles() {
        let store = InMemoryPolicyStore::new();
        let sync = PolicySynchronizer::new(store.clone());

        let report = sync
            .reconcile(
                "a@example.com",
                &role_set(["viewer", "editor", "admin"]),
                &role_set(["viewer", "editor"]),
            )
            .await;

        assert!(report.is_complete());
        assert!(!report.revoked_all);
        assert_eq!(report.granted, vec!["admin".to_string()]);
        assert_eq!(store.grants_to("a@example.com"), vec!["admin".to_string()]);
    }

    #[tokio::test]
    async fn stale_roles_force_full_replace() {
        let store = InMemoryPolicyStore::new();
        let sync = PolicySynchronizer::new(store.clone());
        sync.reconcile("a@example.com", &role_set(["viewer", "admin"]), &RoleSet::new())
            .await;
        store.clear_calls();

        let report = sync
            .reconcile(
                "a@example.com",
                &role_set(["viewer"]),
                &role_set(["viewer", "admin"]),
            )
            .await;

        assert!(report.revoked_all);
        assert_eq!(report.held_after, role_set(["viewer"]));
        assert_eq!(store.held("a@example.com"), role_set(["viewer"]));
        assert_eq!(
            store.calls()[0],
            PolicyCall::RevokeAll {
                principal: "a@example.com".into()
            }
        );
    }

    #[tokio::test]
    async fn partial_failure_is_reported_not_rolled_back() {
        let store = InMemoryPolicyStore::new();
        store.fail_grants_of("admin");
        let sync = PolicySynchronizer::new(store.clone());

        let report = sync
            .reconcile(
                "a@example.com",
                &role_set(["admin", "editor", "viewer"]),
                &RoleSet::new(),
            )
            .await;

        assert!(!report.is_complete());
        assert_eq!(report.failed, vec!["admin".to_string()]);
        assert_eq!(report.held_after, role_set(["editor", "viewer"]));
        assert!(report.error.is_some());
        assert_eq!(store.held("a@example.com"), role_set(["editor", "viewer"]));
    }

    #[tokio::test]
    async fn failed_revoke_keeps_belief_unchanged() {
        let store = InMemoryPolicyStore::new();
        store.fail_revokes_of("a@example.com");
        let sync = PolicySynchronizer::new(store.clone());

        let held = role_set(["admin", "viewer"]);
        let report = sync
            .reconcile("a@example.com", &role_set(["viewer"]), &held)
            .await;

        assert!(!report.is_complete());
        assert!(!report.revoked_all);
        assert_eq!(report.failed, vec!["admin".to_string()]);
        assert_eq!(report.held_after, held);
    }
}
