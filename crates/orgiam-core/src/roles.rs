//! Role set algebra.
//!
//! Pure functions over role-name sets and scope-keyed role maps. The
//! external policy store is scope-blind, so most decisions reduce to set
//! operations over the flattened view of an employee's role map.

use std::collections::{BTreeMap, BTreeSet};

/// A deduplicated, ordered set of role names.
pub type RoleSet = BTreeSet<String>;

/// Role sets keyed by scope (a department id, a team id, or the reserved
/// scope [`RESERVED_SCOPE`]).
pub type ScopeRoles = BTreeMap<String, RoleSet>;

/// Scope key whose roles survive member removal.
pub const RESERVED_SCOPE: &str = "0";

/// Build a [`RoleSet`] from any iterable of names, dropping blank entries.
pub fn role_set<I, S>(roles: I) -> RoleSet
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    roles
        .into_iter()
        .map(Into::into)
        .filter(|r: &String| !r.trim().is_empty())
        .collect()
}

pub fn union(a: &RoleSet, b: &RoleSet) -> RoleSet {
    a.union(b).cloned().collect()
}

/// Role names in `a` that are not in `b`.
pub fn difference(a: &RoleSet, b: &RoleSet) -> RoleSet {
    a.difference(b).cloned().collect()
}

/// Per-scope union of two role maps. Every key present in either map is
/// present in the result.
pub fn merge_scope_maps(a: &ScopeRoles, b: &ScopeRoles) -> ScopeRoles {
    let mut merged = a.clone();
    for (scope, roles) in b {
        merged
            .entry(scope.clone())
            .or_default()
            .extend(roles.iter().cloned());
    }
    merged
}

/// Union of every scope's role set: what the principal should hold in the
/// scope-blind policy store.
pub fn flatten(map: &ScopeRoles) -> RoleSet {
    map.values().flatten().cloned().collect()
}

/// `candidate` minus every role already held under any scope.
pub fn roles_not_already_granted(existing: &ScopeRoles, candidate: &RoleSet) -> RoleSet {
    difference(candidate, &flatten(existing))
}

/// Keep only the scopes accepted by `keep`.
pub fn retain_scopes<F>(map: &mut ScopeRoles, mut keep: F)
where
    F: FnMut(&str) -> bool,
{
    map.retain(|scope, _| keep(scope));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(roles: &[&str]) -> RoleSet {
        role_set(roles.iter().copied())
    }

    fn scopes(entries: &[(&str, &[&str])]) -> ScopeRoles {
        entries
            .iter()
            .map(|(scope, roles)| (scope.to_string(), set(roles)))
            .collect()
    }

    #[test]
    fn role_set_drops_blank_and_duplicate_names() {
        let roles = role_set(["viewer", "", "viewer", "  ", "editor"]);
        assert_eq!(roles, set(&["editor", "viewer"]));
    }

    #[test]
    fn difference_keeps_only_left_side() {
        assert_eq!(
            difference(&set(&["a", "b", "c"]), &set(&["b", "z"])),
            set(&["a", "c"])
        );
        assert!(difference(&RoleSet::new(), &set(&["a"])).is_empty());
    }

    #[test]
    fn merge_keeps_keys_from_both_maps() {
        let a = scopes(&[("dept_1", &["viewer"]), ("0", &["base"])]);
        let b = scopes(&[("dept_1", &["editor"]), ("team_2", &["admin"])]);
        let merged = merge_scope_maps(&a, &b);

        assert_eq!(merged["dept_1"], set(&["editor", "viewer"]));
        assert_eq!(merged["team_2"], set(&["admin"]));
        assert_eq!(merged["0"], set(&["base"]));
    }

    #[test]
    fn not_already_granted_checks_every_scope() {
        let existing = scopes(&[("dept_1", &["viewer", "editor"]), ("team_4", &["ops"])]);
        let delta = roles_not_already_granted(&existing, &set(&["editor", "admin", "ops"]));
        assert_eq!(delta, set(&["admin"]));
    }

    #[test]
    fn not_already_granted_with_empty_inputs() {
        assert!(roles_not_already_granted(&ScopeRoles::new(), &RoleSet::new()).is_empty());
        assert_eq!(
            roles_not_already_granted(&ScopeRoles::new(), &set(&["a"])),
            set(&["a"])
        );
    }

    #[test]
    fn retain_scopes_filters_keys() {
        let mut map = scopes(&[("0", &["base"]), ("team_1", &["x"])]);
        retain_scopes(&mut map, |scope| scope == RESERVED_SCOPE);
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("0"));
    }

    mod proptest_roles {
        use proptest::prelude::*;

        use super::*;

        fn arb_roles() -> impl Strategy<Value = RoleSet> {
            proptest::collection::btree_set("[a-e]{1,3}", 0..8)
        }

        fn arb_scopes() -> impl Strategy<Value = ScopeRoles> {
            proptest::collection::btree_map("(0|dept_[1-3]|team_[1-3])", arb_roles(), 0..4)
        }

        proptest! {
            #[test]
            fn prop_union_commutes(a in arb_roles(), b in arb_roles()) {
                prop_assert_eq!(union(&a, &b), union(&b, &a));
            }

            #[test]
            fn prop_union_is_idempotent(a in arb_roles()) {
                prop_assert_eq!(union(&a, &a), a);
            }

            #[test]
            fn prop_merge_commutes(a in arb_scopes(), b in arb_scopes()) {
                prop_assert_eq!(merge_scope_maps(&a, &b), merge_scope_maps(&b, &a));
            }

            /// A candidate drawn from existing scopes never needs granting.
            #[test]
            fn prop_subset_needs_no_grant(existing in arb_scopes(), pick in any::<prop::sample::Index>()) {
                let all = flatten(&existing);
                let candidate: RoleSet = if all.is_empty() {
                    RoleSet::new()
                } else {
                    let n = pick.index(all.len()) + 1;
                    all.iter().take(n).cloned().collect()
                };
                prop_assert!(roles_not_already_granted(&existing, &candidate).is_empty());
            }

            #[test]
            fn prop_delta_is_disjoint_from_existing(existing in arb_scopes(), candidate in arb_roles()) {
                let delta = roles_not_already_granted(&existing, &candidate);
                let held = flatten(&existing);
                prop_assert!(delta.is_subset(&candidate));
                prop_assert!(delta.is_disjoint(&held));
            }
        }
    }
}
