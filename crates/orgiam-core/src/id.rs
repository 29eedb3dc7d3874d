//! External identifiers (`emp_7`, `team_3`, `dept_1`).
//!
//! Identifiers are a fixed per-kind prefix followed by a decimal counter.
//! Collections may also hold foreign or legacy identifiers whose suffix is
//! not numeric (`dept_abc`); those are skipped when computing the next
//! identifier, never rejected.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kinds of entity that receive allocated identifiers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Employee,
    Team,
    Department,
}

impl EntityKind {
    pub const fn prefix(self) -> &'static str {
        match self {
            EntityKind::Employee => "emp_",
            EntityKind::Team => "team_",
            EntityKind::Department => "dept_",
        }
    }

    /// Name of the backing table / collection.
    pub const fn table(self) -> &'static str {
        match self {
            EntityKind::Employee => "employee",
            EntityKind::Team => "team",
            EntityKind::Department => "department",
        }
    }

    /// Classify an identifier by its prefix.
    pub fn of(id: &str) -> Option<EntityKind> {
        [
            EntityKind::Employee,
            EntityKind::Team,
            EntityKind::Department,
        ]
        .into_iter()
        .find(|kind| id.starts_with(kind.prefix()))
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Parse the numeric suffix of `id` for `kind`.
///
/// Returns `None` for a different prefix, an empty suffix, any non-digit
/// character (including a sign), or a value that overflows `u64`.
pub fn numeric_suffix(kind: EntityKind, id: &str) -> Option<u64> {
    let suffix = id.strip_prefix(kind.prefix())?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

/// Compute the next identifier for `kind` given the identifiers already in
/// its collection: `prefix + (max numeric suffix + 1)`.
///
/// Returns `None` only when the counter space is exhausted.
pub fn next_id<I, S>(kind: EntityKind, existing: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let highest = existing
        .into_iter()
        .filter_map(|id| numeric_suffix(kind, id.as_ref()))
        .max()
        .unwrap_or(0);
    let next = highest.checked_add(1)?;
    Some(format!("{}{next}", kind.prefix()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_collection_starts_at_one() {
        let ids: Vec<String> = Vec::new();
        assert_eq!(
            next_id(EntityKind::Department, ids).as_deref(),
            Some("dept_1")
        );
    }

    #[test]
    fn picks_max_plus_one_not_count() {
        let ids = ["emp_1", "emp_7", "emp_3"];
        assert_eq!(next_id(EntityKind::Employee, ids).as_deref(), Some("emp_8"));
    }

    #[test]
    fn legacy_suffixes_are_skipped() {
        let ids = ["dept_abc", "dept_2", "dept_", "dept_+9", "dept_-4", "dept_1x"];
        assert_eq!(
            next_id(EntityKind::Department, ids).as_deref(),
            Some("dept_3")
        );
    }

    #[test]
    fn foreign_prefixes_are_ignored() {
        let ids = ["team_40", "emp_2"];
        assert_eq!(
            next_id(EntityKind::Department, ids).as_deref(),
            Some("dept_1")
        );
    }

    #[test]
    fn overflowing_suffix_is_treated_as_legacy() {
        let ids = ["team_99999999999999999999999", "team_5"];
        assert_eq!(next_id(EntityKind::Team, ids).as_deref(), Some("team_6"));
    }

    #[test]
    fn exhausted_counter_yields_none() {
        let max = format!("team_{}", u64::MAX);
        assert_eq!(next_id(EntityKind::Team, [max]), None);
    }

    #[test]
    fn classifies_by_prefix() {
        assert_eq!(EntityKind::of("team_9"), Some(EntityKind::Team));
        assert_eq!(EntityKind::of("dept_1"), Some(EntityKind::Department));
        assert_eq!(EntityKind::of("0"), None);
    }

    mod proptest_next_id {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            /// The allocated identifier never collides with an existing
            /// one, whatever mix of numeric and legacy suffixes is present.
            #[test]
            fn prop_next_id_is_fresh(
                numeric in proptest::collection::vec(0u64..10_000, 0..32),
                legacy in proptest::collection::vec("[a-z]{0,6}", 0..8),
            ) {
                let mut ids: Vec<String> =
                    numeric.iter().map(|n| format!("dept_{n}")).collect();
                ids.extend(legacy.iter().map(|s| format!("dept_{s}")));

                let next = next_id(EntityKind::Department, &ids).expect("counter space");
                prop_assert!(!ids.contains(&next));
                prop_assert!(numeric_suffix(EntityKind::Department, &next).is_some());
            }
        }
    }
}
