//! Consistency engine: lifecycle operations over employees, teams and
//! departments that keep the documents and the policy store convergent.
//!
//! Every operation validates against the membership state machine before
//! its first write. Once a write has happened, policy-store failures are
//! reported as [`OrgIamError::PartialSync`] and journalled; local state
//! stays authoritative and [`OrgService::reconcile_pending`] re-runs the
//! diff later.

use orgiam_core::error::{OrgIamError, OrgIamResult};
use orgiam_core::id::EntityKind;
use orgiam_core::membership::{self, AssignmentTarget, Membership, Violation};
use orgiam_core::models::employee::{
    AssignRoles, CreateEmployee, Employee, NewEmployee, RevokeRoles, RoleLabel, SyncState,
    UpdateEmployee,
};
use orgiam_core::models::incident::{CreateSyncIncident, IncidentKind, SyncIncident};
use orgiam_core::policy::PolicyStore;
use orgiam_core::repository::{
    DepartmentRepository, EmployeeRepository, PaginatedResult, Pagination,
    SyncIncidentRepository, TeamRepository,
};
use orgiam_core::roles::{self, RESERVED_SCOPE, RoleSet, ScopeRoles, role_set};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::allocator::IdAllocator;
use crate::config::EngineConfig;
use crate::sync::{PolicySynchronizer, SyncReport};

/// Outcome of a [`reconcile_pending`](OrgService::reconcile_pending) pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub converged: Vec<String>,
    pub pending: Vec<String>,
}

/// The consistency engine.
///
/// Generic over storage and policy-store implementations so that the
/// engine has no dependency on the database crate.
pub struct OrgService<
    E: EmployeeRepository,
    T: TeamRepository,
    D: DepartmentRepository,
    I: SyncIncidentRepository,
    P: PolicyStore,
> {
    pub(crate) employees: E,
    pub(crate) teams: T,
    pub(crate) departments: D,
    pub(crate) incidents: I,
    pub(crate) sync: PolicySynchronizer<P>,
    pub(crate) allocator: IdAllocator,
    pub(crate) config: EngineConfig,
}

impl<E, T, D, I, P> OrgService<E, T, D, I, P>
where
    E: EmployeeRepository,
    T: TeamRepository,
    D: DepartmentRepository,
    I: SyncIncidentRepository,
    P: PolicyStore,
{
    pub fn new(
        employees: E,
        teams: T,
        departments: D,
        incidents: I,
        policy: P,
        config: EngineConfig,
    ) -> Self {
        Self {
            employees,
            teams,
            departments,
            incidents,
            sync: PolicySynchronizer::new(policy),
            allocator: IdAllocator::new(config.max_id_allocation_attempts),
            config,
        }
    }

    pub fn policy_store(&self) -> &P {
        self.sync.store()
    }

    // -----------------------------------------------------------------------
    // Employees
    // -----------------------------------------------------------------------

    /// Create an employee, optionally as a member of existing teams.
    ///
    /// Head and lead positions are only granted through department and
    /// team operations.
    pub async fn create_employee(&self, input: CreateEmployee) -> OrgIamResult<Employee> {
        require_name(&input.first_name, "first name")?;
        require_email(&input.email)?;
        if input.password.is_empty() {
            return Err(OrgIamError::validation("password must not be empty"));
        }
        // No id yet; violations name the email.
        let subject = input.email.clone();
        if let Some(role @ (RoleLabel::Hod | RoleLabel::Lead)) = input.role {
            return Err(Violation::RoleNotAssignable {
                employee: subject,
                role,
                reason: "head and lead positions come from department and team operations".into(),
            }
            .into());
        }
        if self.employees.find_by_email(&input.email).await?.is_some() {
            return Err(OrgIamError::AlreadyExists {
                entity: "employee".into(),
                id: format!("email={}", input.email),
            });
        }

        let mut state = Membership::Unassigned;
        for team_id in distinct(&input.team_ids) {
            let team = self.teams.get(team_id).await?;
            state = state.join_team(&subject, &team.id, team.department_id.as_deref())?;
        }
        if let Some(department_id) = input.department_id.as_deref().filter(|d| !d.is_empty()) {
            self.departments.get(department_id).await?;
            state = state.under_department(&subject, department_id)?;
        }
        if input.role == Some(RoleLabel::Member) && state.is_unassigned() {
            return Err(Violation::RoleNotAssignable {
                employee: subject,
                role: RoleLabel::Member,
                reason: "a member needs at least one team".into(),
            }
            .into());
        }

        let iam_roles = clean_role_map(input.iam_roles.clone());
        if let Some(scope) = iam_roles
            .keys()
            .find(|scope| *scope != RESERVED_SCOPE && !state.admits_scope(scope))
        {
            return Err(Violation::ScopeOutsideLineage {
                employee: subject,
                scope: scope.clone(),
            }
            .into());
        }

        let employee = self
            .allocator
            .allocate(
                EntityKind::Employee,
                || self.employees.list_ids(),
                |id| {
                    self.employees.create(NewEmployee {
                        id,
                        first_name: input.first_name.clone(),
                        last_name: input.last_name.clone(),
                        email: input.email.clone(),
                        password: input.password.clone(),
                        role: state.role_label(),
                        department_id: state.department().map(str::to_string),
                        team_ids: state.teams().to_vec(),
                        iam_roles: iam_roles.clone(),
                    })
                },
            )
            .await?;

        info!(
            employee_id = %employee.id,
            principal = %employee.email,
            "Employee created"
        );
        self.sync_employee(employee).await
    }

    pub async fn get_employee(&self, id: &str) -> OrgIamResult<Employee> {
        self.employees.get(id).await
    }

    /// Profile changes and additive team membership.
    ///
    /// An email change moves the principal: the old one is recorded in
    /// `retired_principals` and fully revoked, the new one is granted the
    /// whole role set. A failed revoke is retried by later syncs.
    pub async fn update_employee(&self, id: &str, input: UpdateEmployee) -> OrgIamResult<Employee> {
        let mut employee = self.employees.get(id).await?;
        let mut state = membership::validate(&employee)?;

        for team_id in input.add_teams.keys() {
            let team = self.teams.get(team_id).await?;
            state = state.join_team(&employee.id, &team.id, team.department_id.as_deref())?;
        }
        if let Some(first_name) = &input.first_name {
            require_name(first_name, "first name")?;
        }
        if input.password.as_deref() == Some("") {
            return Err(OrgIamError::validation("password must not be empty"));
        }
        let new_email = input.email.filter(|email| *email != employee.email);
        if let Some(email) = &new_email {
            require_email(email)?;
            if self.employees.find_by_email(email).await?.is_some() {
                return Err(OrgIamError::AlreadyExists {
                    entity: "employee".into(),
                    id: format!("email={email}"),
                });
            }
        }

        if let Some(first_name) = input.first_name {
            employee.first_name = first_name;
        }
        if let Some(last_name) = input.last_name {
            employee.last_name = last_name;
        }
        state.apply(&mut employee);
        for (team_id, team_roles) in input.add_teams {
            add_scope_roles(&mut employee, &team_id, &role_set(team_roles));
        }
        if let Some(email) = new_email {
            let old = std::mem::replace(&mut employee.email, email);
            info!(
                employee_id = %employee.id,
                old_principal = %old,
                principal = %employee.email,
                "Principal moved"
            );
            let current = employee.email.clone();
            employee
                .retired_principals
                .retain(|p| *p != current && *p != old);
            employee.retired_principals.push(old);
            // The new principal starts with nothing.
            employee.granted_roles.clear();
        }
        employee.sync_state = SyncState::Pending;

        let employee = self.employees.save(&employee).await?;
        if let Some(password) = input.password {
            self.employees.set_password(&employee.id, &password).await?;
        }

        info!(employee_id = %employee.id, "Employee updated");
        self.sync_employee(employee).await
    }

    /// Delete an employee. A department head must be replaced first; a
    /// team lead leaves the team without a lead.
    pub async fn delete_employee(&self, id: &str) -> OrgIamResult<()> {
        let employee = self.employees.get(id).await?;
        self.release_position(&employee).await?;

        let employee = self.detach(employee).await?;
        self.employees.delete(&employee.id).await?;

        info!(employee_id = %id, principal = %employee.email, "Employee deleted");
        Ok(())
    }

    pub async fn list_employees(
        &self,
        pagination: Pagination,
    ) -> OrgIamResult<PaginatedResult<Employee>> {
        self.employees.list(pagination).await
    }

    // -----------------------------------------------------------------------
    // Roles
    // -----------------------------------------------------------------------

    /// Additive role assignment under one scope: the team when given,
    /// otherwise the department.
    ///
    /// Membership fields are only filled while the employee has none
    /// (first assignment wins). Only roles the principal does not already
    /// hold under some scope are granted.
    pub async fn assign_roles(&self, employee_id: &str, input: AssignRoles) -> OrgIamResult<Employee> {
        let team_id = input.team_id.as_deref().filter(|t| !t.is_empty());
        let department_id = input.department_id.as_deref().filter(|d| !d.is_empty());

        let mut employee = self.employees.get(employee_id).await?;
        let state = membership::validate(&employee)?;

        let team = match team_id {
            Some(team_id) => Some(self.teams.get(team_id).await?),
            None => None,
        };
        let target = match (&team, department_id) {
            (Some(team), requested) => {
                match (requested, team.department_id.as_deref()) {
                    (Some(requested), Some(owner)) if requested != owner => {
                        return Err(OrgIamError::validation(format!(
                            "team {} belongs to department {owner}, not {requested}",
                            team.id
                        )));
                    }
                    (Some(requested), None) => {
                        return Err(OrgIamError::validation(format!(
                            "team {} has no department, cannot assign under {requested}",
                            team.id
                        )));
                    }
                    _ => {}
                }
                AssignmentTarget::Team {
                    team: &team.id,
                    department: team.department_id.as_deref(),
                }
            }
            (None, Some(department_id)) => {
                self.departments.get(department_id).await?;
                AssignmentTarget::Department(department_id)
            }
            (None, None) => {
                return Err(OrgIamError::validation(
                    "a department or team scope is required",
                ));
            }
        };

        let next = state.assign(&employee.id, input.role, &target)?;
        let scope = target.scope().to_string();
        let new_roles = role_set(input.roles);
        let delta = roles::roles_not_already_granted(&employee.iam_roles, &new_roles);

        next.apply(&mut employee);
        add_scope_roles(&mut employee, &scope, &new_roles);
        employee.sync_state = SyncState::Pending;
        let employee = self.employees.save(&employee).await?;

        debug!(
            employee_id = %employee.id,
            scope = %scope,
            delta = ?delta,
            "Roles assigned"
        );
        self.sync_employee(employee).await
    }

    /// Remove roles from one scope. Roles still held under another scope
    /// stay granted.
    pub async fn revoke_roles(&self, employee_id: &str, input: RevokeRoles) -> OrgIamResult<Employee> {
        if input.scope != RESERVED_SCOPE
            && !matches!(
                EntityKind::of(&input.scope),
                Some(EntityKind::Team | EntityKind::Department)
            )
        {
            return Err(OrgIamError::validation(format!(
                "{} is not a team or department scope",
                input.scope
            )));
        }
        let mut employee = self.employees.get(employee_id).await?;
        membership::validate(&employee)?;

        let Some(current) = employee.iam_roles.get_mut(&input.scope) else {
            return Err(OrgIamError::not_found("scope", input.scope));
        };
        *current = roles::difference(current, &input.roles);
        if current.is_empty() {
            employee.iam_roles.remove(&input.scope);
        }
        employee.sync_state = SyncState::Pending;
        let employee = self.employees.save(&employee).await?;

        debug!(
            employee_id = %employee.id,
            scope = %input.scope,
            roles = ?input.roles,
            "Roles revoked from scope"
        );
        self.sync_employee(employee).await
    }

    /// Return an employee to `Unassigned`: every scope except the reserved
    /// one is cleared and the principal is fully revoked.
    ///
    /// Idempotent. A department head leaves the department without a head
    /// (reported by [`audit`](Self::audit) until a new one is appointed);
    /// a team lead leaves the team without a lead.
    pub async fn remove_member(&self, employee_id: &str) -> OrgIamResult<Employee> {
        let employee = self.employees.get(employee_id).await?;
        self.vacate_position(&employee).await?;
        let employee = self.detach(employee).await?;

        info!(
            employee_id = %employee.id,
            principal = %employee.email,
            "Member removed"
        );
        Ok(employee)
    }

    /// Re-run synchronization for employees not yet `Synced`. Incidents
    /// are not journalled again here.
    pub async fn reconcile_pending(&self) -> OrgIamResult<ReconcileSummary> {
        let unsynced = self
            .employees
            .list_unsynced(self.config.reconcile_batch_size)
            .await?;

        let mut summary = ReconcileSummary::default();
        for employee in unsynced {
            let employee_id = employee.id.clone();
            let outcome = match employee.sync_state {
                SyncState::Revoking => self.revoke_and_regrant(employee).await,
                _ => self.push_roles(employee).await,
            };
            match outcome {
                Ok((_, report)) if report.is_complete() => summary.converged.push(employee_id),
                Ok((_, report)) => {
                    warn!(
                        employee_id = %employee_id,
                        failed = ?report.failed,
                        "Still out of sync"
                    );
                    summary.pending.push(employee_id);
                }
                Err(err) => {
                    warn!(employee_id = %employee_id, error = %err, "Reconciliation failed");
                    summary.pending.push(employee_id);
                }
            }
        }

        if !summary.converged.is_empty() || !summary.pending.is_empty() {
            info!(
                converged = summary.converged.len(),
                pending = summary.pending.len(),
                "Reconciliation pass finished"
            );
        }
        Ok(summary)
    }

    /// Journalled divergences, newest first.
    pub async fn list_incidents(
        &self,
        pagination: Pagination,
    ) -> OrgIamResult<PaginatedResult<SyncIncident>> {
        self.incidents.list(pagination).await
    }

    // -----------------------------------------------------------------------
    // Internals shared by the lifecycle operations
    // -----------------------------------------------------------------------

    /// Reject deletion of a sitting department head; otherwise free any
    /// position the employee holds.
    async fn release_position(&self, employee: &Employee) -> OrgIamResult<()> {
        if let Ok(Membership::DepartmentHead { department }) = Membership::of(employee) {
            match self.departments.get(&department).await {
                Ok(d) if d.head_id == employee.id => {
                    return Err(Violation::HeadRequired {
                        employee: employee.id.clone(),
                        department,
                    }
                    .into());
                }
                Ok(_) => {}
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
        }
        self.vacate_position(employee).await
    }

    /// Clear the parent's reference to a head or lead being removed.
    async fn vacate_position(&self, employee: &Employee) -> OrgIamResult<()> {
        match Membership::of(employee) {
            Ok(Membership::DepartmentHead { department }) => {
                self.vacate_head(&department, &employee.id).await
            }
            Ok(Membership::TeamLead { team }) => self.vacate_lead(&team, &employee.id).await,
            _ => Ok(()),
        }
    }

    async fn vacate_head(&self, department_id: &str, employee_id: &str) -> OrgIamResult<()> {
        let mut department = match self.departments.get(department_id).await {
            Ok(department) => department,
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err),
        };
        if department.head_id == employee_id {
            department.head_id.clear();
            self.departments.save(&department).await?;
            warn!(
                department_id = %department_id,
                employee_id = %employee_id,
                "Head removed, department has no head"
            );
        }
        Ok(())
    }

    async fn vacate_lead(&self, team_id: &str, employee_id: &str) -> OrgIamResult<()> {
        let mut team = match self.teams.get(team_id).await {
            Ok(team) => team,
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err),
        };
        if team.lead_id.as_deref() == Some(employee_id) {
            team.lead_id = None;
            self.teams.save(&team).await?;
            info!(team_id = %team_id, employee_id = %employee_id, "Lead vacated");
        }
        Ok(())
    }

    /// Unassign and fully revoke, without position checks. Used by
    /// cascades and handovers.
    pub(crate) async fn detach(&self, mut employee: Employee) -> OrgIamResult<Employee> {
        Membership::Unassigned.apply(&mut employee);
        employee.sync_state = SyncState::Revoking;
        let employee = self.employees.save(&employee).await?;

        let (employee, report) = self.revoke_and_regrant(employee).await?;
        if report.is_complete() {
            Ok(employee)
        } else {
            let principal = employee.email.clone();
            Err(self.partial_sync(&employee.id, &principal, report).await)
        }
    }

    /// Move an employee to `next` (which must be reachable from its current
    /// state) and push the resulting role set.
    pub(crate) async fn apply_membership(
        &self,
        mut employee: Employee,
        next: Membership,
    ) -> OrgIamResult<Employee> {
        next.apply(&mut employee);
        employee.sync_state = SyncState::Pending;
        let employee = self.employees.save(&employee).await?;
        self.sync_employee(employee).await
    }

    /// Full revoke, then grant whatever the role map still holds (the
    /// reserved scope). Leaves the employee `Revoking` if the revoke fails.
    async fn revoke_and_regrant(&self, mut employee: Employee) -> OrgIamResult<(Employee, SyncReport)> {
        if let Err(err) = self.sync.revoke_all(employee.principal()).await {
            warn!(
                employee_id = %employee.id,
                principal = %employee.email,
                error = %err,
                "Full revoke failed"
            );
            let report = SyncReport {
                failed: employee.granted_roles.iter().cloned().collect(),
                revoke_failed: true,
                held_after: employee.granted_roles.clone(),
                error: Some(err.to_string()),
                ..SyncReport::default()
            };
            return Ok((employee, report));
        }

        employee.granted_roles.clear();
        let (employee, mut report) = self.push_roles(employee).await?;
        report.revoked_all = true;
        Ok((employee, report))
    }

    /// Reconcile the flattened role map against `granted_roles` and persist
    /// the outcome.
    async fn push_roles(&self, mut employee: Employee) -> OrgIamResult<(Employee, SyncReport)> {
        let retire_error = self.retire_principals(&mut employee).await;
        let desired = employee.desired_roles();
        let mut report = self
            .sync
            .reconcile(employee.principal(), &desired, &employee.granted_roles)
            .await;
        if let Some(err) = retire_error {
            report.revoke_failed = true;
            report.error = Some(match report.error.take() {
                Some(first) => format!("{first}; {err}"),
                None => err,
            });
        }

        employee.granted_roles = report.held_after.clone();
        employee.sync_state = if report.is_complete() {
            SyncState::Synced
        } else {
            SyncState::Pending
        };
        let employee = self.employees.save(&employee).await?;
        Ok((employee, report))
    }

    /// Fully revoke every former principal of the employee, keeping the
    /// ones the store refused. Returns the first failure.
    async fn retire_principals(&self, employee: &mut Employee) -> Option<String> {
        let mut failure = None;
        let mut remaining = Vec::new();
        for old in std::mem::take(&mut employee.retired_principals) {
            match self.sync.revoke_all(&old).await {
                Ok(()) => info!(
                    employee_id = %employee.id,
                    old_principal = %old,
                    "Former principal revoked"
                ),
                Err(err) => {
                    warn!(
                        employee_id = %employee.id,
                        old_principal = %old,
                        error = %err,
                        "Former principal still holds roles"
                    );
                    failure.get_or_insert_with(|| format!("revoke of former principal {old}: {err}"));
                    remaining.push(old);
                }
            }
        }
        employee.retired_principals = remaining;
        failure
    }

    /// [`push_roles`](Self::push_roles), journalling and reporting an
    /// incomplete sync as `PartialSync`.
    pub(crate) async fn sync_employee(&self, employee: Employee) -> OrgIamResult<Employee> {
        let (employee, report) = self.push_roles(employee).await?;
        if report.is_complete() {
            return Ok(employee);
        }
        let principal = employee.email.clone();
        Err(self.partial_sync(&employee.id, &principal, report).await)
    }

    async fn partial_sync(&self, entity_id: &str, principal: &str, report: SyncReport) -> OrgIamError {
        let detail = report
            .error
            .unwrap_or_else(|| "policy store call failed".to_string());
        warn!(
            employee_id = %entity_id,
            principal = %principal,
            granted = ?report.granted,
            failed = ?report.failed,
            detail = %detail,
            "Policy sync incomplete"
        );
        self.journal(CreateSyncIncident {
            kind: IncidentKind::PartialSync,
            entity_id: entity_id.to_string(),
            principal: Some(principal.to_string()),
            failed: report.failed.clone(),
            detail: detail.clone(),
        })
        .await;

        OrgIamError::PartialSync {
            principal: principal.to_string(),
            granted: report.granted,
            failed: report.failed,
            detail,
        }
    }

    /// Handover steps once the parent carries the marker: the old holder
    /// is detached if it still holds `position`, then the candidate takes
    /// `position` together with the carried roles under `scope`.
    pub(crate) async fn transfer_position(
        &self,
        old: Option<Employee>,
        mut candidate: Employee,
        position: &Membership,
        scope: &str,
        carried: &RoleSet,
        deferred: &mut Option<OrgIamError>,
    ) -> OrgIamResult<()> {
        if let Some(old) = old {
            if matches!(Membership::of(&old), Ok(ref current) if current == position) {
                defer_partial(self.detach(old).await, deferred)?;
            }
        }

        position.apply(&mut candidate);
        add_scope_roles(&mut candidate, scope, carried);
        candidate.sync_state = SyncState::Pending;
        let candidate = self.employees.save(&candidate).await?;
        defer_partial(self.sync_employee(candidate).await, deferred)
    }

    pub(crate) async fn handover_incomplete(
        &self,
        entity: &str,
        id: &str,
        candidate: &str,
        err: OrgIamError,
    ) -> OrgIamError {
        warn!(
            entity,
            id,
            candidate,
            error = %err,
            "Handover stopped, marker left in place"
        );
        self.journal(CreateSyncIncident {
            kind: IncidentKind::HandoverIncomplete,
            entity_id: id.to_string(),
            principal: None,
            failed: vec![candidate.to_string()],
            detail: format!("handover of {entity} {id} to {candidate} stopped: {err}"),
        })
        .await;
        err
    }

    /// Grant roles newly added to a department or team to its current
    /// holder, if the holder's record still agrees.
    pub(crate) async fn grant_to_holder(
        &self,
        holder_id: &str,
        position: &Membership,
        scope: &str,
        roles: &RoleSet,
        deferred: &mut Option<OrgIamError>,
    ) -> OrgIamResult<()> {
        if roles.is_empty() || holder_id.is_empty() {
            return Ok(());
        }
        let mut holder = match self.employees.get(holder_id).await {
            Ok(holder) => holder,
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err),
        };
        if !matches!(Membership::of(&holder), Ok(ref current) if current == position) {
            warn!(
                employee_id = %holder_id,
                scope,
                "Holder record disagrees with parent, roles not granted"
            );
            return Ok(());
        }
        add_scope_roles(&mut holder, scope, roles);
        holder.sync_state = SyncState::Pending;
        let holder = self.employees.save(&holder).await?;
        defer_partial(self.sync_employee(holder).await, deferred)
    }

    pub(crate) async fn cascade_incomplete(
        &self,
        entity: &str,
        id: &str,
        failures: Vec<String>,
    ) -> OrgIamError {
        warn!(
            entity,
            id,
            failures = ?failures,
            "Cascade incomplete, parent kept"
        );
        self.journal(CreateSyncIncident {
            kind: IncidentKind::CascadeIncomplete,
            entity_id: id.to_string(),
            principal: None,
            failed: failures.clone(),
            detail: format!("{} child operation(s) failed", failures.len()),
        })
        .await;

        OrgIamError::CascadeIncomplete {
            entity: entity.to_string(),
            id: id.to_string(),
            failures,
        }
    }

    /// Append to the incident journal. A journal failure is logged only;
    /// the caller already reports the underlying problem.
    pub(crate) async fn journal(&self, incident: CreateSyncIncident) {
        let kind = incident.kind;
        let entity_id = incident.entity_id.clone();
        if let Err(err) = self.incidents.append(incident).await {
            error!(
                kind = kind.as_str(),
                entity_id = %entity_id,
                error = %err,
                "Failed to journal sync incident"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Merge `roles` into the employee's role set for `scope`.
pub(crate) fn add_scope_roles(employee: &mut Employee, scope: &str, roles: &RoleSet) {
    if roles.is_empty() {
        return;
    }
    employee
        .iam_roles
        .entry(scope.to_string())
        .or_default()
        .extend(roles.iter().cloned());
}

/// Record a child failure of a cascade. Partial syncs are journalled by
/// the child and do not block the parent.
pub(crate) fn collect_failure<X>(result: OrgIamResult<X>, child: &str, failures: &mut Vec<String>) {
    match result {
        Ok(_) | Err(OrgIamError::PartialSync { .. }) => {}
        Err(err) => failures.push(format!("{child}: {err}")),
    }
}

/// Keep the first `PartialSync` for the caller and continue; anything
/// else aborts.
pub(crate) fn defer_partial<X>(
    result: OrgIamResult<X>,
    deferred: &mut Option<OrgIamError>,
) -> OrgIamResult<()> {
    match result {
        Ok(_) => Ok(()),
        Err(err @ OrgIamError::PartialSync { .. }) => {
            deferred.get_or_insert(err);
            Ok(())
        }
        Err(err) => Err(err),
    }
}

pub(crate) fn require_name(value: &str, field: &str) -> OrgIamResult<()> {
    if value.trim().is_empty() {
        return Err(OrgIamError::validation(format!("{field} must not be empty")));
    }
    Ok(())
}

fn require_email(email: &str) -> OrgIamResult<()> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(OrgIamError::validation(format!("invalid email: {email}"))),
    }
}

fn distinct(ids: &[String]) -> Vec<&str> {
    let mut seen: Vec<&str> = Vec::with_capacity(ids.len());
    for id in ids {
        if !id.is_empty() && !seen.contains(&id.as_str()) {
            seen.push(id);
        }
    }
    seen
}

fn clean_role_map(map: ScopeRoles) -> ScopeRoles {
    map.into_iter()
        .filter(|(scope, _)| !scope.is_empty())
        .map(|(scope, set)| (scope, role_set(set)))
        .filter(|(_, set)| !set.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_needs_local_part_and_domain() {
        assert!(require_email("a@example.com").is_ok());
        assert!(require_email("a@").is_err());
        assert!(require_email("@example.com").is_err());
        assert!(require_email("example.com").is_err());
    }

    #[test]
    fn distinct_keeps_first_occurrence() {
        let ids = vec![
            "team_2".to_string(),
            String::new(),
            "team_1".into(),
            "team_2".into(),
        ];
        assert_eq!(distinct(&ids), vec!["team_2", "team_1"]);
    }

    #[test]
    fn clean_role_map_drops_blank_scopes_and_roles() {
        let mut map = ScopeRoles::new();
        map.insert("team_1".into(), role_set(["viewer"]));
        map.insert("team_2".into(), RoleSet::from([" ".to_string()]));
        map.insert(String::new(), role_set(["x"]));
        let cleaned = clean_role_map(map);
        assert_eq!(cleaned.len(), 1);
        assert!(cleaned.contains_key("team_1"));
    }

    #[test]
    fn partial_sync_is_deferred_other_errors_abort() {
        let mut deferred = None;
        let partial: OrgIamResult<()> = Err(OrgIamError::PartialSync {
            principal: "a@example.com".into(),
            granted: vec![],
            failed: vec!["admin".into()],
            detail: "down".into(),
        });
        assert!(defer_partial(partial, &mut deferred).is_ok());
        assert!(deferred.is_some());

        let hard: OrgIamResult<()> = Err(OrgIamError::Database("gone".into()));
        assert!(defer_partial(hard, &mut deferred).is_err());
    }
}
