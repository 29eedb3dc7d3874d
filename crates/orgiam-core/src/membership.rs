//! Membership state machine.
//!
//! Every employee is in exactly one of four states, which together
//! guarantee at most one active department/team lineage:
//!
//! - [`Membership::Unassigned`]: no role, no department, no teams.
//! - [`Membership::DepartmentHead`]: `HOD` of one department, no teams.
//! - [`Membership::TeamLead`]: `Lead` of exactly one team, no department.
//! - [`Membership::TeamMember`]: `Member` of one or more teams, optionally
//!   under one department.
//!
//! All transitions are validated here; the engine never edits the
//! `role`, `department_id` or `team_ids` fields directly.

use std::fmt;

use thiserror::Error;

use crate::models::employee::{Employee, RoleLabel};
use crate::roles::{self, RESERVED_SCOPE};

/// A rejected transition or an employee record that breaks the lineage
/// invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("employee {employee} already belongs to {current}")]
    LineageConflict { employee: String, current: String },

    #[error("employee {employee} holds {held} and cannot also become {requested}")]
    IncompatibleRole {
        employee: String,
        held: RoleLabel,
        requested: RoleLabel,
    },

    #[error("scope {scope} is outside the lineage of employee {employee}")]
    ScopeOutsideLineage { employee: String, scope: String },

    #[error("role {role} cannot be assigned to employee {employee}: {reason}")]
    RoleNotAssignable {
        employee: String,
        role: RoleLabel,
        reason: String,
    },

    #[error("employee {employee} heads department {department}; reassign the head first")]
    HeadRequired { employee: String, department: String },

    #[error("position {position} is already held by {holder}")]
    PositionOccupied { position: String, holder: String },

    #[error("employee {employee} record is inconsistent: {reason}")]
    InconsistentRecord { employee: String, reason: String },
}

/// Where an additive role assignment lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentTarget<'a> {
    Department(&'a str),
    Team {
        team: &'a str,
        /// Owning department of the team, if any.
        department: Option<&'a str>,
    },
}

impl AssignmentTarget<'_> {
    /// The role-map key the assignment writes to.
    pub fn scope(&self) -> &str {
        match self {
            AssignmentTarget::Department(d) => d,
            AssignmentTarget::Team { team, .. } => team,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Membership {
    Unassigned,
    DepartmentHead {
        department: String,
    },
    TeamLead {
        team: String,
    },
    TeamMember {
        teams: Vec<String>,
        department: Option<String>,
    },
}

impl Membership {
    /// Read the membership state off an employee record.
    pub fn of(employee: &Employee) -> Result<Self, Violation> {
        let inconsistent = |reason: &str| Violation::InconsistentRecord {
            employee: employee.id.clone(),
            reason: reason.to_string(),
        };
        let department = employee.department_id.clone().filter(|d| !d.is_empty());
        let mut teams: Vec<String> = Vec::with_capacity(employee.team_ids.len());
        for team in &employee.team_ids {
            if !team.is_empty() && !teams.contains(team) {
                teams.push(team.clone());
            }
        }

        match employee.role {
            None => {
                if department.is_some() || !teams.is_empty() {
                    return Err(inconsistent("references set without a role"));
                }
                Ok(Membership::Unassigned)
            }
            Some(RoleLabel::Hod) => match department {
                Some(department) if teams.is_empty() => {
                    Ok(Membership::DepartmentHead { department })
                }
                Some(_) => Err(inconsistent("HOD must not reference teams")),
                None => Err(inconsistent("HOD without a department")),
            },
            Some(RoleLabel::Lead) => {
                if department.is_some() {
                    return Err(inconsistent("Lead must not reference a department"));
                }
                match teams.as_slice() {
                    [team] => Ok(Membership::TeamLead { team: team.clone() }),
                    _ => Err(inconsistent("Lead must reference exactly one team")),
                }
            }
            Some(RoleLabel::Member) => {
                if teams.is_empty() {
                    return Err(inconsistent("Member without teams"));
                }
                Ok(Membership::TeamMember { teams, department })
            }
        }
    }

    /// Write this state onto the employee record and drop role-map scopes
    /// that fall outside the new lineage. The reserved scope is kept.
    pub fn apply(&self, employee: &mut Employee) {
        employee.role = self.role_label();
        employee.department_id = self.department().map(str::to_string);
        employee.team_ids = self.teams().to_vec();
        roles::retain_scopes(&mut employee.iam_roles, |scope| {
            scope == RESERVED_SCOPE || self.admits_scope(scope)
        });
    }

    pub fn role_label(&self) -> Option<RoleLabel> {
        match self {
            Membership::Unassigned => None,
            Membership::DepartmentHead { .. } => Some(RoleLabel::Hod),
            Membership::TeamLead { .. } => Some(RoleLabel::Lead),
            Membership::TeamMember { .. } => Some(RoleLabel::Member),
        }
    }

    pub fn department(&self) -> Option<&str> {
        match self {
            Membership::DepartmentHead { department } => Some(department),
            Membership::TeamMember { department, .. } => department.as_deref(),
            _ => None,
        }
    }

    pub fn teams(&self) -> &[String] {
        match self {
            Membership::TeamLead { team } => std::slice::from_ref(team),
            Membership::TeamMember { teams, .. } => teams,
            _ => &[],
        }
    }

    pub fn is_unassigned(&self) -> bool {
        matches!(self, Membership::Unassigned)
    }

    /// Whether `scope` is a department or team of this lineage.
    pub fn admits_scope(&self, scope: &str) -> bool {
        self.department() == Some(scope) || self.teams().iter().any(|t| t == scope)
    }

    /// Pre-check for taking a head or lead position: only an unassigned
    /// employee qualifies.
    pub fn ensure_available(&self, employee: &str, requested: RoleLabel) -> Result<(), Violation> {
        match self {
            Membership::Unassigned => Ok(()),
            Membership::DepartmentHead { .. } if requested != RoleLabel::Hod => {
                Err(Violation::IncompatibleRole {
                    employee: employee.to_string(),
                    held: RoleLabel::Hod,
                    requested,
                })
            }
            _ => Err(self.conflict(employee)),
        }
    }

    /// Attach a member to `department`. Valid only for members with no
    /// department yet (or already under the same one).
    pub fn under_department(&self, employee: &str, department: &str) -> Result<Self, Violation> {
        match self {
            Membership::TeamMember {
                teams,
                department: None,
            } => Ok(Membership::TeamMember {
                teams: teams.clone(),
                department: Some(department.to_string()),
            }),
            Membership::TeamMember {
                department: Some(d),
                ..
            } if d == department => Ok(self.clone()),
            Membership::Unassigned => Err(Violation::RoleNotAssignable {
                employee: employee.to_string(),
                role: RoleLabel::Member,
                reason: "a member needs at least one team".into(),
            }),
            _ => Err(self.conflict(employee)),
        }
    }

    /// `Unassigned -> DepartmentHead(d)`. Re-appointing the current head of
    /// the same department is a no-op.
    pub fn appoint_head(&self, employee: &str, department: &str) -> Result<Self, Violation> {
        match self {
            Membership::Unassigned => Ok(Membership::DepartmentHead {
                department: department.to_string(),
            }),
            Membership::DepartmentHead { department: d } if d == department => Ok(self.clone()),
            _ => Err(self.conflict(employee)),
        }
    }

    /// `Unassigned -> TeamLead(t)`. A department head is rejected with
    /// [`Violation::IncompatibleRole`].
    pub fn appoint_lead(&self, employee: &str, team: &str) -> Result<Self, Violation> {
        match self {
            Membership::Unassigned => Ok(Membership::TeamLead {
                team: team.to_string(),
            }),
            Membership::TeamLead { team: t } if t == team => Ok(self.clone()),
            Membership::DepartmentHead { .. } => Err(Violation::IncompatibleRole {
                employee: employee.to_string(),
                held: RoleLabel::Hod,
                requested: RoleLabel::Lead,
            }),
            _ => Err(self.conflict(employee)),
        }
    }

    /// `Unassigned -> TeamMember({t})` or `TeamMember(S) -> TeamMember(S ∪ {t})`.
    ///
    /// A member inherits the team's department when it has none; a team
    /// owned by a different department than the member's is rejected.
    pub fn join_team(
        &self,
        employee: &str,
        team: &str,
        team_department: Option<&str>,
    ) -> Result<Self, Violation> {
        match self {
            Membership::Unassigned => Ok(Membership::TeamMember {
                teams: vec![team.to_string()],
                department: team_department.map(str::to_string),
            }),
            Membership::TeamMember { teams, department } => {
                if let (Some(current), Some(other)) = (department.as_deref(), team_department) {
                    if current != other {
                        return Err(self.conflict(employee));
                    }
                }
                let mut teams = teams.clone();
                if !teams.iter().any(|t| t == team) {
                    teams.push(team.to_string());
                }
                Ok(Membership::TeamMember {
                    teams,
                    department: department
                        .clone()
                        .or_else(|| team_department.map(str::to_string)),
                })
            }
            Membership::TeamLead { team: t } if t == team => Ok(self.clone()),
            Membership::DepartmentHead { .. } => Err(Violation::IncompatibleRole {
                employee: employee.to_string(),
                held: RoleLabel::Hod,
                requested: RoleLabel::Member,
            }),
            Membership::TeamLead { .. } => Err(self.conflict(employee)),
        }
    }

    /// Membership change for an additive role assignment.
    ///
    /// First assignment wins: `label` only matters while the employee is
    /// unassigned, and only `Member` may be assigned that way. An employee
    /// who already has a lineage may receive roles for scopes inside it; a
    /// member may additionally join new teams.
    pub fn assign(
        &self,
        employee: &str,
        label: Option<RoleLabel>,
        target: &AssignmentTarget<'_>,
    ) -> Result<Self, Violation> {
        match (self, target) {
            (Membership::Unassigned, _) => {
                let label = label.unwrap_or(RoleLabel::Member);
                match (label, target) {
                    (RoleLabel::Member, AssignmentTarget::Team { team, department }) => {
                        self.join_team(employee, team, *department)
                    }
                    (RoleLabel::Member, AssignmentTarget::Department(_)) => {
                        Err(Violation::RoleNotAssignable {
                            employee: employee.to_string(),
                            role: RoleLabel::Member,
                            reason: "a member needs at least one team".into(),
                        })
                    }
                    (role, _) => Err(Violation::RoleNotAssignable {
                        employee: employee.to_string(),
                        role,
                        reason: "head and lead positions come from department and team operations"
                            .into(),
                    }),
                }
            }
            (Membership::TeamMember { .. }, AssignmentTarget::Team { team, department }) => {
                self.join_team(employee, team, *department)
            }
            (Membership::DepartmentHead { .. }, AssignmentTarget::Team { .. }) => {
                Err(Violation::IncompatibleRole {
                    employee: employee.to_string(),
                    held: RoleLabel::Hod,
                    requested: label.unwrap_or(RoleLabel::Member),
                })
            }
            _ if self.admits_scope(target.scope()) => Ok(self.clone()),
            _ => Err(Violation::ScopeOutsideLineage {
                employee: employee.to_string(),
                scope: target.scope().to_string(),
            }),
        }
    }

    /// Drop `team` from the lineage. Losing the last team also clears the
    /// department reference.
    pub fn leave_team(&self, team: &str) -> Self {
        match self {
            Membership::TeamLead { team: t } if t == team => Membership::Unassigned,
            Membership::TeamMember { teams, department } => {
                let remaining: Vec<String> =
                    teams.iter().filter(|t| *t != team).cloned().collect();
                if remaining.is_empty() {
                    Membership::Unassigned
                } else {
                    Membership::TeamMember {
                        teams: remaining,
                        department: department.clone(),
                    }
                }
            }
            _ => self.clone(),
        }
    }

    /// Drop every reference to `department`. Members of the department
    /// lose their teams with it.
    pub fn leave_department(&self, department: &str) -> Self {
        if self.department() == Some(department) {
            Membership::Unassigned
        } else {
            self.clone()
        }
    }

    fn conflict(&self, employee: &str) -> Violation {
        Violation::LineageConflict {
            employee: employee.to_string(),
            current: self.to_string(),
        }
    }
}

impl fmt::Display for Membership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Membership::Unassigned => f.write_str("no lineage"),
            Membership::DepartmentHead { department } => {
                write!(f, "department {department} as HOD")
            }
            Membership::TeamLead { team } => write!(f, "team {team} as Lead"),
            Membership::TeamMember { teams, department } => {
                write!(f, "teams {}", teams.join(", "))?;
                if let Some(department) = department {
                    write!(f, " of department {department}")?;
                }
                Ok(())
            }
        }
    }
}

/// Check every lineage invariant on an employee record, including that
/// role-map keys stay within the lineage (plus the reserved scope).
pub fn validate(employee: &Employee) -> Result<Membership, Violation> {
    let membership = Membership::of(employee)?;
    if let Some(scope) = employee
        .iam_roles
        .keys()
        .find(|scope| *scope != RESERVED_SCOPE && !membership.admits_scope(scope))
    {
        return Err(Violation::ScopeOutsideLineage {
            employee: employee.id.clone(),
            scope: scope.clone(),
        });
    }
    Ok(membership)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::employee::SyncState;
    use crate::roles::{ScopeRoles, role_set};

    fn employee(id: &str) -> Employee {
        Employee {
            id: id.into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: format!("{id}@example.com"),
            password_hash: String::new(),
            role: None,
            department_id: None,
            team_ids: Vec::new(),
            iam_roles: ScopeRoles::new(),
            granted_roles: Default::default(),
            sync_state: SyncState::Synced,
            retired_principals: Vec::new(),
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn unassigned_employee_reads_back() {
        assert_eq!(
            Membership::of(&employee("emp_1")).unwrap(),
            Membership::Unassigned
        );
    }

    #[test]
    fn head_appointment_round_trips_through_record() {
        let mut emp = employee("emp_5");
        let state = Membership::Unassigned
            .appoint_head("emp_5", "dept_1")
            .unwrap();
        state.apply(&mut emp);

        assert_eq!(emp.role, Some(RoleLabel::Hod));
        assert_eq!(emp.department_id.as_deref(), Some("dept_1"));
        assert!(emp.team_ids.is_empty());
        assert_eq!(validate(&emp).unwrap(), state);
    }

    #[test]
    fn head_cannot_become_lead() {
        let head = Membership::DepartmentHead {
            department: "dept_1".into(),
        };
        let err = head.appoint_lead("emp_5", "team_2").unwrap_err();
        assert_eq!(
            err,
            Violation::IncompatibleRole {
                employee: "emp_5".into(),
                held: RoleLabel::Hod,
                requested: RoleLabel::Lead,
            }
        );
    }

    #[test]
    fn member_cannot_be_appointed_head() {
        let member = Membership::TeamMember {
            teams: vec!["team_1".into()],
            department: None,
        };
        let err = member.appoint_head("emp_2", "dept_1").unwrap_err();
        assert!(matches!(err, Violation::LineageConflict { .. }));
    }

    #[test]
    fn only_unassigned_employees_are_available_for_positions() {
        assert!(
            Membership::Unassigned
                .ensure_available("emp_1", RoleLabel::Lead)
                .is_ok()
        );
        let head = Membership::DepartmentHead {
            department: "dept_1".into(),
        };
        assert!(matches!(
            head.ensure_available("emp_5", RoleLabel::Lead),
            Err(Violation::IncompatibleRole { .. })
        ));
        assert!(matches!(
            head.ensure_available("emp_5", RoleLabel::Hod),
            Err(Violation::LineageConflict { .. })
        ));
    }

    #[test]
    fn member_can_be_placed_under_one_department() {
        let member = Membership::Unassigned
            .join_team("emp_1", "team_1", None)
            .unwrap();
        let placed = member.under_department("emp_1", "dept_2").unwrap();
        assert_eq!(placed.department(), Some("dept_2"));
        assert_eq!(placed.under_department("emp_1", "dept_2").unwrap(), placed);
        assert!(placed.under_department("emp_1", "dept_3").is_err());
    }

    #[test]
    fn reappointing_same_position_is_a_no_op() {
        let lead = Membership::TeamLead {
            team: "team_3".into(),
        };
        assert_eq!(lead.appoint_lead("emp_1", "team_3").unwrap(), lead);
        assert!(lead.appoint_lead("emp_1", "team_4").is_err());
    }

    #[test]
    fn joining_teams_accumulates_and_inherits_department() {
        let state = Membership::Unassigned
            .join_team("emp_1", "team_1", None)
            .unwrap()
            .join_team("emp_1", "team_2", Some("dept_4"))
            .unwrap()
            .join_team("emp_1", "team_2", Some("dept_4"))
            .unwrap();
        assert_eq!(
            state,
            Membership::TeamMember {
                teams: vec!["team_1".into(), "team_2".into()],
                department: Some("dept_4".into()),
            }
        );
    }

    #[test]
    fn joining_team_of_other_department_conflicts() {
        let state = Membership::TeamMember {
            teams: vec!["team_1".into()],
            department: Some("dept_1".into()),
        };
        assert!(matches!(
            state.join_team("emp_1", "team_9", Some("dept_2")),
            Err(Violation::LineageConflict { .. })
        ));
    }

    #[test]
    fn losing_last_team_clears_department() {
        let state = Membership::TeamMember {
            teams: vec!["team_1".into(), "team_2".into()],
            department: Some("dept_1".into()),
        };
        let after_one = state.leave_team("team_1");
        assert_eq!(after_one.department(), Some("dept_1"));
        assert_eq!(after_one.leave_team("team_2"), Membership::Unassigned);
    }

    #[test]
    fn leaving_department_resets_members_and_head() {
        let member = Membership::TeamMember {
            teams: vec!["team_1".into()],
            department: Some("dept_1".into()),
        };
        let head = Membership::DepartmentHead {
            department: "dept_1".into(),
        };
        assert!(member.leave_department("dept_1").is_unassigned());
        assert!(head.leave_department("dept_1").is_unassigned());
        assert_eq!(head.leave_department("dept_2"), head);
    }

    #[test]
    fn assign_only_admits_member_for_unassigned() {
        let target = AssignmentTarget::Team {
            team: "team_1",
            department: None,
        };
        assert!(
            Membership::Unassigned
                .assign("emp_1", Some(RoleLabel::Lead), &target)
                .is_err()
        );
        assert!(
            Membership::Unassigned
                .assign("emp_1", Some(RoleLabel::Member), &target)
                .is_ok()
        );
        assert!(matches!(
            Membership::Unassigned.assign("emp_1", None, &AssignmentTarget::Department("dept_1")),
            Err(Violation::RoleNotAssignable { .. })
        ));
    }

    #[test]
    fn assign_within_lineage_keeps_state() {
        let head = Membership::DepartmentHead {
            department: "dept_1".into(),
        };
        let same = head
            .assign("emp_5", Some(RoleLabel::Hod), &AssignmentTarget::Department("dept_1"))
            .unwrap();
        assert_eq!(same, head);

        let err = head
            .assign("emp_5", None, &AssignmentTarget::Department("dept_2"))
            .unwrap_err();
        assert!(matches!(err, Violation::ScopeOutsideLineage { .. }));

        let err = head
            .assign(
                "emp_5",
                Some(RoleLabel::Lead),
                &AssignmentTarget::Team {
                    team: "team_1",
                    department: Some("dept_1"),
                },
            )
            .unwrap_err();
        assert!(matches!(err, Violation::IncompatibleRole { .. }));
    }

    #[test]
    fn apply_prunes_scopes_but_keeps_reserved() {
        let mut emp = employee("emp_7");
        Membership::TeamLead {
            team: "team_9".into(),
        }
        .apply(&mut emp);
        emp.iam_roles.insert("team_9".into(), role_set(["ops"]));
        emp.iam_roles.insert("0".into(), role_set(["base"]));

        Membership::Unassigned.apply(&mut emp);

        assert_eq!(emp.role, None);
        assert!(emp.team_ids.is_empty());
        assert_eq!(emp.iam_roles.len(), 1);
        assert_eq!(emp.iam_roles["0"], role_set(["base"]));
    }

    #[test]
    fn validate_rejects_broken_records() {
        let mut lead_with_dept = employee("emp_1");
        lead_with_dept.role = Some(RoleLabel::Lead);
        lead_with_dept.team_ids = vec!["team_1".into()];
        lead_with_dept.department_id = Some("dept_1".into());
        assert!(matches!(
            validate(&lead_with_dept),
            Err(Violation::InconsistentRecord { .. })
        ));

        let mut stray_scope = employee("emp_2");
        stray_scope.role = Some(RoleLabel::Member);
        stray_scope.team_ids = vec!["team_1".into()];
        stray_scope
            .iam_roles
            .insert("team_8".into(), role_set(["x"]));
        assert!(matches!(
            validate(&stray_scope),
            Err(Violation::ScopeOutsideLineage { .. })
        ));
    }
}
