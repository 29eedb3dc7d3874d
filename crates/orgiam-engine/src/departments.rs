//! Department lifecycle: creation with a head, head handover, cascade delete.

use orgiam_core::error::{OrgIamError, OrgIamResult};
use orgiam_core::id::EntityKind;
use orgiam_core::membership::{self, Membership};
use orgiam_core::models::department::{
    CreateDepartment, Department, NewDepartment, UpdateDepartment,
};
use orgiam_core::models::employee::{Employee, RoleLabel, SyncState};
use orgiam_core::policy::PolicyStore;
use orgiam_core::repository::{
    DepartmentRepository, EmployeeRepository, PaginatedResult, Pagination,
    SyncIncidentRepository, TeamRepository,
};
use orgiam_core::roles::{self, RoleSet, role_set};
use tracing::{error, info};

use crate::service::{OrgService, add_scope_roles, collect_failure, require_name};

impl<E, T, D, I, P> OrgService<E, T, D, I, P>
where
    E: EmployeeRepository,
    T: TeamRepository,
    D: DepartmentRepository,
    I: SyncIncidentRepository,
    P: PolicyStore,
{
    /// Create a department. The head must be unassigned; it becomes
    /// `HOD` and is granted the default roles.
    pub async fn create_department(&self, input: CreateDepartment) -> OrgIamResult<Department> {
        require_name(&input.name, "department name")?;
        if input.head_id.is_empty() {
            return Err(OrgIamError::validation("a department needs a head"));
        }
        let head = self.employees.get(&input.head_id).await?;
        let state = membership::validate(&head)?;
        state.ensure_available(&head.id, RoleLabel::Hod)?;

        let default_roles = role_set(input.default_roles);
        let department = self
            .allocator
            .allocate(
                EntityKind::Department,
                || self.departments.list_ids(),
                |id| {
                    self.departments.create(NewDepartment {
                        id,
                        name: input.name.clone(),
                        default_roles: default_roles.clone(),
                        head_id: head.id.clone(),
                    })
                },
            )
            .await?;
        info!(department_id = %department.id, head_id = %head.id, "Department created");

        let head = match self.install_head(head, &state, &department).await {
            Ok(head) => head,
            Err(err) => {
                self.discard_department(&department.id).await;
                return Err(err);
            }
        };
        self.sync_employee(head).await?;
        Ok(department)
    }

    pub async fn get_department(&self, id: &str) -> OrgIamResult<Department> {
        self.departments.get(id).await
    }

    /// Rename, add default roles (granted to the current head) and hand
    /// the department over to a new head.
    ///
    /// A handover left incomplete keeps `handover_to` set; calling again
    /// with the same head, or with no head at all, resumes it.
    pub async fn update_department(
        &self,
        id: &str,
        input: UpdateDepartment,
    ) -> OrgIamResult<Department> {
        if let Some(name) = &input.name {
            require_name(name, "department name")?;
        }
        let mut department = self.departments.get(id).await?;
        let mut deferred = None;

        let candidate = input
            .head_id
            .filter(|h| !h.is_empty())
            .or_else(|| department.handover_to.clone());
        if let Some(candidate) = candidate.filter(|c| *c != department.head_id) {
            department = self
                .hand_over_department(department, &candidate, &mut deferred)
                .await?;
        }

        let added = role_set(input.add_roles);
        let added = roles::difference(&added, &department.default_roles);
        let renamed = input.name.filter(|name| *name != department.name);
        if renamed.is_some() || !added.is_empty() {
            if let Some(name) = renamed {
                department.name = name;
            }
            department.default_roles.extend(added.iter().cloned());
            department = self.departments.save(&department).await?;

            let position = Membership::DepartmentHead {
                department: department.id.clone(),
            };
            self.grant_to_holder(
                &department.head_id,
                &position,
                &department.id,
                &added,
                &mut deferred,
            )
            .await?;
        }

        info!(department_id = %department.id, "Department updated");
        match deferred {
            Some(err) => Err(err),
            None => Ok(department),
        }
    }

    /// Delete a department and everything hanging off it.
    ///
    /// Teams go first, then the head, then any employee still referencing
    /// the department. Child failures are collected; the department
    /// document is only removed once every child is clean.
    pub async fn delete_department(&self, id: &str) -> OrgIamResult<()> {
        let department = self.departments.get(id).await?;
        let mut failures = Vec::new();

        match self.teams.list_by_department(id).await {
            Ok(teams) => {
                for team in teams {
                    let child = format!("team {}", team.id);
                    collect_failure(self.delete_team(&team.id).await, &child, &mut failures);
                }
            }
            Err(err) => failures.push(format!("teams of {id}: {err}")),
        }

        if !department.head_id.is_empty() {
            let position = Membership::DepartmentHead {
                department: id.to_string(),
            };
            match self.employees.get(&department.head_id).await {
                Ok(head) if matches!(Membership::of(&head), Ok(ref s) if *s == position) => {
                    let child = format!("head {}", head.id);
                    collect_failure(self.detach(head).await, &child, &mut failures);
                }
                Ok(_) => {}
                Err(err) if err.is_not_found() => {}
                Err(err) => failures.push(format!("head {}: {err}", department.head_id)),
            }
        }

        match self.employees.list_by_department(id).await {
            Ok(stragglers) => {
                for employee in stragglers {
                    let child = format!("employee {}", employee.id);
                    let result = match Membership::of(&employee) {
                        Ok(state) => {
                            let next = state.leave_department(id);
                            self.apply_membership(employee, next).await
                        }
                        Err(_) => self.detach(employee).await,
                    };
                    collect_failure(result, &child, &mut failures);
                }
            }
            Err(err) => failures.push(format!("employees of {id}: {err}")),
        }

        if !failures.is_empty() {
            return Err(self.cascade_incomplete("department", id, failures).await);
        }

        self.departments.delete(id).await?;
        info!(department_id = %id, "Department deleted");
        Ok(())
    }

    pub async fn list_departments(
        &self,
        pagination: Pagination,
    ) -> OrgIamResult<PaginatedResult<Department>> {
        self.departments.list(pagination).await
    }

    async fn install_head(
        &self,
        mut head: Employee,
        state: &Membership,
        department: &Department,
    ) -> OrgIamResult<Employee> {
        let next = state.appoint_head(&head.id, &department.id)?;
        next.apply(&mut head);
        add_scope_roles(&mut head, &department.id, &department.default_roles);
        head.sync_state = SyncState::Pending;
        self.employees.save(&head).await
    }

    async fn discard_department(&self, id: &str) {
        if let Err(err) = self.departments.delete(id).await {
            error!(department_id = %id, error = %err, "Failed to discard department");
        }
    }

    async fn hand_over_department(
        &self,
        mut department: Department,
        candidate_id: &str,
        deferred: &mut Option<OrgIamError>,
    ) -> OrgIamResult<Department> {
        let old = if department.head_id.is_empty() {
            None
        } else {
            match self.employees.get(&department.head_id).await {
                Ok(old) => Some(old),
                Err(err) if err.is_not_found() => None,
                Err(err) => return Err(err),
            }
        };
        let candidate = self.employees.get(candidate_id).await?;
        let next = membership::validate(&candidate)?.appoint_head(&candidate.id, &department.id)?;

        let mut carried = department.default_roles.clone();
        if let Some(previous) = old.as_ref().and_then(|o| o.iam_roles.get(&department.id)) {
            carried = roles::union(&carried, previous);
        }

        department.handover_to = Some(candidate.id.clone());
        let department = self.departments.save(&department).await?;
        info!(
            department_id = %department.id,
            from = %department.head_id,
            to = %candidate.id,
            "Head handover started"
        );

        let id = department.id.clone();
        match self
            .finish_department_handover(department, old, candidate, &next, &carried, deferred)
            .await
        {
            Ok(department) => Ok(department),
            Err(err) => Err(self
                .handover_incomplete("department", &id, candidate_id, err)
                .await),
        }
    }

    async fn finish_department_handover(
        &self,
        mut department: Department,
        old: Option<Employee>,
        candidate: Employee,
        position: &Membership,
        carried: &RoleSet,
        deferred: &mut Option<OrgIamError>,
    ) -> OrgIamResult<Department> {
        let candidate_id = candidate.id.clone();
        self.transfer_position(old, candidate, position, &department.id, carried, deferred)
            .await?;

        department.head_id = candidate_id;
        department.handover_to = None;
        let department = self.departments.save(&department).await?;
        info!(
            department_id = %department.id,
            head_id = %department.head_id,
            "Head handover completed"
        );
        Ok(department)
    }
}
