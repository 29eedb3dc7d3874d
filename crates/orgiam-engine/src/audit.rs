//! Orphan audit and repair.
//!
//! A cascade that stops part way leaves references to documents that no
//! longer exist. [`OrgService::audit`] finds them without writing;
//! [`OrgService::repair_orphans`] strips them through the membership state
//! machine and resynchronizes the affected principals.

use std::collections::HashSet;

use orgiam_core::error::{OrgIamError, OrgIamResult};
use orgiam_core::membership::{self, Membership};
use orgiam_core::models::department::Department;
use orgiam_core::models::employee::{Employee, SyncState};
use orgiam_core::models::team::Team;
use orgiam_core::policy::PolicyStore;
use orgiam_core::repository::{
    DepartmentRepository, EmployeeRepository, PaginatedResult, Pagination,
    SyncIncidentRepository, TeamRepository,
};
use orgiam_core::roles::{self, RESERVED_SCOPE};
use serde::Serialize;
use tracing::{info, warn};

use crate::service::OrgService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FindingKind {
    /// A team or employee references a department that does not exist.
    MissingDepartment,
    /// An employee references a team that does not exist.
    MissingTeam,
    /// A department has no head, or its head does not hold `HOD` of it.
    HeadMismatch,
    /// A team's lead does not hold `Lead` of that team.
    LeadMismatch,
    /// An employee record breaks the lineage rules.
    InvariantViolation,
    /// A handover marker is still set.
    PendingHandover,
    /// An employee is not `Synced`.
    Unsynced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub entity_id: String,
    pub detail: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditReport {
    pub findings: Vec<Finding>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn of_kind(&self, kind: FindingKind) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.kind == kind)
    }

    fn push(&mut self, kind: FindingKind, entity_id: &str, detail: impl Into<String>) {
        self.findings.push(Finding {
            kind,
            entity_id: entity_id.to_string(),
            detail: detail.into(),
        });
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairSummary {
    /// Documents rewritten to drop dangling references.
    pub repaired: Vec<String>,
    /// Documents whose repair failed, with the error.
    pub failed: Vec<String>,
}

struct Snapshot {
    departments: Vec<Department>,
    teams: Vec<Team>,
    employees: Vec<Employee>,
}

impl Snapshot {
    fn department_ids(&self) -> HashSet<&str> {
        self.departments.iter().map(|d| d.id.as_str()).collect()
    }

    fn team_ids(&self) -> HashSet<&str> {
        self.teams.iter().map(|t| t.id.as_str()).collect()
    }

    fn employee(&self, id: &str) -> Option<&Employee> {
        self.employees.iter().find(|e| e.id == id)
    }
}

impl<E, T, D, I, P> OrgService<E, T, D, I, P>
where
    E: EmployeeRepository,
    T: TeamRepository,
    D: DepartmentRepository,
    I: SyncIncidentRepository,
    P: PolicyStore,
{
    /// Scan every collection and report dangling references, position
    /// mismatches, lineage violations, pending handovers and employees
    /// that are not synced. Read-only.
    pub async fn audit(&self) -> OrgIamResult<AuditReport> {
        let snapshot = self.snapshot().await?;
        let department_ids = snapshot.department_ids();
        let team_ids = snapshot.team_ids();
        let mut report = AuditReport::default();

        for department in &snapshot.departments {
            if let Some(to) = &department.handover_to {
                report.push(
                    FindingKind::PendingHandover,
                    &department.id,
                    format!("head handover to {to} not completed"),
                );
            }
            let position = Membership::DepartmentHead {
                department: department.id.clone(),
            };
            if department.head_id.is_empty() {
                report.push(FindingKind::HeadMismatch, &department.id, "no head");
            } else if !holds(snapshot.employee(&department.head_id), &position) {
                report.push(
                    FindingKind::HeadMismatch,
                    &department.id,
                    format!("head {} does not hold the position", department.head_id),
                );
            }
        }

        for team in &snapshot.teams {
            if let Some(department_id) = &team.department_id {
                if !department_ids.contains(department_id.as_str()) {
                    report.push(
                        FindingKind::MissingDepartment,
                        &team.id,
                        format!("department {department_id} does not exist"),
                    );
                }
            }
            if let Some(to) = &team.handover_to {
                report.push(
                    FindingKind::PendingHandover,
                    &team.id,
                    format!("lead handover to {to} not completed"),
                );
            }
            if let Some(lead_id) = &team.lead_id {
                let position = Membership::TeamLead {
                    team: team.id.clone(),
                };
                if !holds(snapshot.employee(lead_id), &position) {
                    report.push(
                        FindingKind::LeadMismatch,
                        &team.id,
                        format!("lead {lead_id} does not hold the position"),
                    );
                }
            }
        }

        for employee in &snapshot.employees {
            if let Some(department_id) = &employee.department_id {
                if !department_ids.contains(department_id.as_str()) {
                    report.push(
                        FindingKind::MissingDepartment,
                        &employee.id,
                        format!("department {department_id} does not exist"),
                    );
                }
            }
            for team_id in &employee.team_ids {
                if !team_ids.contains(team_id.as_str()) {
                    report.push(
                        FindingKind::MissingTeam,
                        &employee.id,
                        format!("team {team_id} does not exist"),
                    );
                }
            }
            if let Err(violation) = membership::validate(employee) {
                report.push(
                    FindingKind::InvariantViolation,
                    &employee.id,
                    violation.to_string(),
                );
            }
            if employee.sync_state != SyncState::Synced {
                report.push(
                    FindingKind::Unsynced,
                    &employee.id,
                    format!("sync state {}", employee.sync_state.as_str()),
                );
            }
        }

        if report.is_clean() {
            info!("Audit clean");
        } else {
            warn!(findings = report.findings.len(), "Audit found inconsistencies");
        }
        Ok(report)
    }

    /// Strip references to missing departments and teams, clear stale
    /// leads, and rewrite employees whose records break the lineage rules.
    ///
    /// Teams with a pending handover are left alone; repeat the update to
    /// finish them.
    pub async fn repair_orphans(&self) -> OrgIamResult<RepairSummary> {
        let snapshot = self.snapshot().await?;
        let department_ids = snapshot.department_ids();
        let team_ids = snapshot.team_ids();
        let mut summary = RepairSummary::default();

        for team in &snapshot.teams {
            if team.handover_to.is_some() {
                continue;
            }
            let mut repaired = team.clone();
            if let Some(department_id) = &team.department_id {
                if !department_ids.contains(department_id.as_str()) {
                    repaired.department_id = None;
                }
            }
            if let Some(lead_id) = &team.lead_id {
                let position = Membership::TeamLead {
                    team: team.id.clone(),
                };
                if !holds(snapshot.employee(lead_id), &position) {
                    repaired.lead_id = None;
                }
            }
            if repaired == *team {
                continue;
            }
            match self.teams.save(&repaired).await {
                Ok(_) => {
                    info!(team_id = %team.id, "Team references repaired");
                    summary.repaired.push(team.id.clone());
                }
                Err(err) => summary.failed.push(format!("team {}: {err}", team.id)),
            }
        }

        for employee in &snapshot.employees {
            let mut repaired = employee.clone();
            if repaired
                .department_id
                .as_deref()
                .is_some_and(|d| !department_ids.contains(d))
            {
                repaired.department_id = None;
            }
            repaired
                .team_ids
                .retain(|t| team_ids.contains(t.as_str()));
            roles::retain_scopes(&mut repaired.iam_roles, |scope| {
                scope == RESERVED_SCOPE
                    || department_ids.contains(scope)
                    || team_ids.contains(scope)
            });

            let state = Membership::of(&repaired).unwrap_or(Membership::Unassigned);
            state.apply(&mut repaired);
            if repaired == *employee {
                continue;
            }

            repaired.sync_state = SyncState::Pending;
            let outcome = match self.employees.save(&repaired).await {
                Ok(saved) => self.sync_employee(saved).await,
                Err(err) => Err(err),
            };
            match outcome {
                Ok(_) | Err(OrgIamError::PartialSync { .. }) => {
                    info!(employee_id = %employee.id, state = %state, "Employee references repaired");
                    summary.repaired.push(employee.id.clone());
                }
                Err(err) => summary.failed.push(format!("employee {}: {err}", employee.id)),
            }
        }

        info!(
            repaired = summary.repaired.len(),
            failed = summary.failed.len(),
            "Orphan repair finished"
        );
        Ok(summary)
    }

    async fn snapshot(&self) -> OrgIamResult<Snapshot> {
        let batch = self.config.reconcile_batch_size;
        Ok(Snapshot {
            departments: collect_pages(batch, |page| self.departments.list(page)).await?,
            teams: collect_pages(batch, |page| self.teams.list(page)).await?,
            employees: collect_pages(batch, |page| self.employees.list(page)).await?,
        })
    }
}

fn holds(employee: Option<&Employee>, position: &Membership) -> bool {
    employee.is_some_and(|e| matches!(Membership::of(e), Ok(ref s) if s == position))
}

async fn collect_pages<X, F, Fut>(batch: u64, mut page: F) -> OrgIamResult<Vec<X>>
where
    F: FnMut(Pagination) -> Fut,
    Fut: Future<Output = OrgIamResult<PaginatedResult<X>>>,
{
    let limit = batch.max(1);
    let mut items = Vec::new();
    let mut offset = 0;
    loop {
        let result = page(Pagination { offset, limit }).await?;
        let fetched = result.items.len() as u64;
        items.extend(result.items);
        offset += fetched;
        if fetched < limit || offset >= result.total {
            break;
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn collect_pages_walks_every_page() {
        let data: Vec<u32> = (0..7).collect();
        let items = collect_pages(3, |page| {
            let start = page.offset as usize;
            let end = (start + page.limit as usize).min(data.len());
            let result = PaginatedResult {
                items: data[start..end].to_vec(),
                total: data.len() as u64,
                offset: page.offset,
                limit: page.limit,
            };
            async move { Ok(result) }
        })
        .await
        .unwrap();
        assert_eq!(items, data);
    }

    #[test]
    fn report_filters_by_kind() {
        let mut report = AuditReport::default();
        report.push(FindingKind::MissingTeam, "emp_1", "team team_9 does not exist");
        report.push(FindingKind::Unsynced, "emp_1", "sync state Pending");
        assert!(!report.is_clean());
        assert_eq!(report.of_kind(FindingKind::MissingTeam).count(), 1);
        assert_eq!(report.of_kind(FindingKind::HeadMismatch).count(), 0);
    }
}
