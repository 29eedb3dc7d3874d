//! Team lifecycle: creation with an optional lead, lead handover, delete.

use orgiam_core::error::{OrgIamError, OrgIamResult};
use orgiam_core::id::EntityKind;
use orgiam_core::membership::{self, Membership};
use orgiam_core::models::employee::{Employee, RoleLabel, SyncState};
use orgiam_core::models::team::{CreateTeam, NewTeam, Team, UpdateTeam};
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
    /// Create a team, optionally under a department and with a lead.
    ///
    /// The lead must be unassigned; a department head is rejected with
    /// `IncompatibleRole` before anything is written.
    pub async fn create_team(&self, input: CreateTeam) -> OrgIamResult<Team> {
        require_name(&input.name, "team name")?;
        let department_id = input.department_id.filter(|d| !d.is_empty());
        if let Some(department_id) = &department_id {
            self.departments.get(department_id).await?;
        }

        let lead = match input.lead_id.as_deref().filter(|l| !l.is_empty()) {
            Some(lead_id) => {
                let lead = self.employees.get(lead_id).await?;
                let state = membership::validate(&lead)?;
                state.ensure_available(&lead.id, RoleLabel::Lead)?;
                Some((lead, state))
            }
            None => None,
        };

        let team_roles = role_set(input.roles);
        let lead_id = lead.as_ref().map(|(lead, _)| lead.id.clone());
        let team = self
            .allocator
            .allocate(
                EntityKind::Team,
                || self.teams.list_ids(),
                |id| {
                    self.teams.create(NewTeam {
                        id,
                        name: input.name.clone(),
                        roles: team_roles.clone(),
                        lead_id: lead_id.clone(),
                        department_id: department_id.clone(),
                    })
                },
            )
            .await?;
        info!(
            team_id = %team.id,
            department_id = ?team.department_id,
            lead_id = ?team.lead_id,
            "Team created"
        );

        let Some((lead, state)) = lead else {
            return Ok(team);
        };
        let lead = match self.install_lead(lead, &state, &team).await {
            Ok(lead) => lead,
            Err(err) => {
                self.discard_team(&team.id).await;
                return Err(err);
            }
        };
        self.sync_employee(lead).await?;
        Ok(team)
    }

    pub async fn get_team(&self, id: &str) -> OrgIamResult<Team> {
        self.teams.get(id).await
    }

    /// Rename, add team roles (granted to the current lead) and hand the
    /// team over to a new lead. Same resume semantics as department
    /// handovers.
    pub async fn update_team(&self, id: &str, input: UpdateTeam) -> OrgIamResult<Team> {
        if let Some(name) = &input.name {
            require_name(name, "team name")?;
        }
        let mut team = self.teams.get(id).await?;
        let mut deferred = None;

        let candidate = input
            .lead_id
            .filter(|l| !l.is_empty())
            .or_else(|| team.handover_to.clone());
        if let Some(candidate) = candidate.filter(|c| team.lead_id.as_ref() != Some(c)) {
            team = self.hand_over_team(team, &candidate, &mut deferred).await?;
        }

        let added = roles::difference(&role_set(input.add_roles), &team.roles);
        let renamed = input.name.filter(|name| *name != team.name);
        if renamed.is_some() || !added.is_empty() {
            if let Some(name) = renamed {
                team.name = name;
            }
            team.roles.extend(added.iter().cloned());
            team = self.teams.save(&team).await?;

            if let Some(lead_id) = team.lead_id.clone() {
                let position = Membership::TeamLead {
                    team: team.id.clone(),
                };
                self.grant_to_holder(&lead_id, &position, &team.id, &added, &mut deferred)
                    .await?;
            }
        }

        info!(team_id = %team.id, "Team updated");
        match deferred {
            Some(err) => Err(err),
            None => Ok(team),
        }
    }

    /// Delete a team: the lead is removed, every member loses the team,
    /// then the document goes. Member failures are collected and keep the
    /// team document in place.
    pub async fn delete_team(&self, id: &str) -> OrgIamResult<()> {
        let team = self.teams.get(id).await?;
        let mut failures = Vec::new();

        if let Some(lead_id) = team.lead_id.as_deref() {
            let position = Membership::TeamLead {
                team: id.to_string(),
            };
            match self.employees.get(lead_id).await {
                Ok(lead) if matches!(Membership::of(&lead), Ok(ref s) if *s == position) => {
                    let child = format!("lead {}", lead.id);
                    collect_failure(self.detach(lead).await, &child, &mut failures);
                }
                Ok(_) => {}
                Err(err) if err.is_not_found() => {}
                Err(err) => failures.push(format!("lead {lead_id}: {err}")),
            }
        }

        match self.employees.list_by_team(id).await {
            Ok(members) => {
                for member in members {
                    let child = format!("member {}", member.id);
                    let result = match Membership::of(&member) {
                        Ok(state) => {
                            let next = state.leave_team(id);
                            self.apply_membership(member, next).await
                        }
                        Err(_) => self.detach(member).await,
                    };
                    collect_failure(result, &child, &mut failures);
                }
            }
            Err(err) => failures.push(format!("members of {id}: {err}")),
        }

        if !failures.is_empty() {
            return Err(self.cascade_incomplete("team", id, failures).await);
        }

        self.teams.delete(id).await?;
        info!(team_id = %id, "Team deleted");
        Ok(())
    }

    pub async fn list_teams(&self, pagination: Pagination) -> OrgIamResult<PaginatedResult<Team>> {
        self.teams.list(pagination).await
    }

    async fn install_lead(
        &self,
        mut lead: Employee,
        state: &Membership,
        team: &Team,
    ) -> OrgIamResult<Employee> {
        let next = state.appoint_lead(&lead.id, &team.id)?;
        next.apply(&mut lead);
        add_scope_roles(&mut lead, &team.id, &team.roles);
        lead.sync_state = SyncState::Pending;
        self.employees.save(&lead).await
    }

    async fn discard_team(&self, id: &str) {
        if let Err(err) = self.teams.delete(id).await {
            error!(team_id = %id, error = %err, "Failed to discard team");
        }
    }

    async fn hand_over_team(
        &self,
        mut team: Team,
        candidate_id: &str,
        deferred: &mut Option<OrgIamError>,
    ) -> OrgIamResult<Team> {
        let old = match team.lead_id.as_deref() {
            Some(lead_id) => match self.employees.get(lead_id).await {
                Ok(old) => Some(old),
                Err(err) if err.is_not_found() => None,
                Err(err) => return Err(err),
            },
            None => None,
        };
        let candidate = self.employees.get(candidate_id).await?;
        let next = membership::validate(&candidate)?.appoint_lead(&candidate.id, &team.id)?;

        let mut carried = team.roles.clone();
        if let Some(previous) = old.as_ref().and_then(|o| o.iam_roles.get(&team.id)) {
            carried = roles::union(&carried, previous);
        }

        team.handover_to = Some(candidate.id.clone());
        let team = self.teams.save(&team).await?;
        info!(
            team_id = %team.id,
            from = ?team.lead_id,
            to = %candidate.id,
            "Lead handover started"
        );

        let id = team.id.clone();
        match self
            .finish_team_handover(team, old, candidate, &next, &carried, deferred)
            .await
        {
            Ok(team) => Ok(team),
            Err(err) => Err(self.handover_incomplete("team", &id, candidate_id, err).await),
        }
    }

    async fn finish_team_handover(
        &self,
        mut team: Team,
        old: Option<Employee>,
        candidate: Employee,
        position: &Membership,
        carried: &RoleSet,
        deferred: &mut Option<OrgIamError>,
    ) -> OrgIamResult<Team> {
        let candidate_id = candidate.id.clone();
        self.transfer_position(old, candidate, position, &team.id, carried, deferred)
            .await?;

        team.lead_id = Some(candidate_id);
        team.handover_to = None;
        let team = self.teams.save(&team).await?;
        info!(team_id = %team.id, lead_id = ?team.lead_id, "Lead handover completed");
        Ok(team)
    }
}
