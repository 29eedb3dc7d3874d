//! SurrealDB implementation of [`TeamRepository`].

use chrono::{DateTime, Utc};
use orgiam_core::error::OrgIamResult;
use orgiam_core::models::team::{NewTeam, Team};
use orgiam_core::repository::{PaginatedResult, Pagination, TeamRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;

use super::{CountRow, IdRow, VersionRow};
use crate::error::DbError;

const TABLE: &str = "team";

#[derive(Debug, SurrealValue)]
struct TeamRow {
    record_id: String,
    name: String,
    roles: Vec<String>,
    lead_id: Option<String>,
    department_id: Option<String>,
    handover_to: Option<String>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<TeamRow> for Team {
    fn from(row: TeamRow) -> Self {
        Team {
            id: row.record_id,
            name: row.name,
            roles: row.roles.into_iter().collect(),
            lead_id: row.lead_id,
            department_id: row.department_id,
            handover_to: row.handover_to,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// SurrealDB implementation of the Team repository.
#[derive(Clone)]
pub struct SurrealTeamRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTeamRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> TeamRepository for SurrealTeamRepository<C> {
    async fn create(&self, input: NewTeam) -> OrgIamResult<Team> {
        let roles: Vec<String> = input.roles.into_iter().collect();

        self.db
            .query(
                "CREATE type::record('team', $id) SET \
                 name = $name, roles = $roles, lead_id = $lead_id, \
                 department_id = $department_id, version = 1 \
                 RETURN NONE",
            )
            .bind(("id", input.id.clone()))
            .bind(("name", input.name))
            .bind(("roles", roles))
            .bind(("lead_id", input.lead_id))
            .bind(("department_id", input.department_id))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::on_create(TABLE, &input.id, e))?;

        self.get(&input.id).await
    }

    async fn get(&self, id: &str) -> OrgIamResult<Team> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('team', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TeamRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: TABLE.into(),
            id: id.to_string(),
        })?;

        Ok(row.into())
    }

    async fn save(&self, team: &Team) -> OrgIamResult<Team> {
        let roles: Vec<String> = team.roles.iter().cloned().collect();

        let mut result = self
            .db
            .query(
                "UPDATE type::record('team', $id) SET \
                 name = $name, roles = $roles, lead_id = $lead_id, \
                 department_id = $department_id, \
                 handover_to = $handover_to, \
                 version = version + 1, updated_at = time::now() \
                 WHERE version = $expected \
                 RETURN version",
            )
            .bind(("id", team.id.clone()))
            .bind(("name", team.name.clone()))
            .bind(("roles", roles))
            .bind(("lead_id", team.lead_id.clone()))
            .bind(("department_id", team.department_id.clone()))
            .bind(("handover_to", team.handover_to.clone()))
            .bind(("expected", team.version))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<VersionRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            self.get(&team.id).await?;
            return Err(DbError::Conflict {
                entity: TABLE.into(),
                id: team.id.clone(),
            }
            .into());
        }

        self.get(&team.id).await
    }

    async fn delete(&self, id: &str) -> OrgIamResult<()> {
        self.db
            .query("DELETE type::record('team', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> OrgIamResult<PaginatedResult<Team>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM team GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM team \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TeamRow> = result.take(0).map_err(DbError::from)?;

        Ok(PaginatedResult {
            items: rows.into_iter().map(Team::from).collect(),
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_ids(&self) -> OrgIamResult<Vec<String>> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id FROM team")
            .await
            .map_err(DbError::from)?;
        let rows: Vec<IdRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().map(|r| r.record_id).collect())
    }

    async fn list_by_department(&self, department_id: &str) -> OrgIamResult<Vec<Team>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM team \
                 WHERE department_id = $department_id \
                 ORDER BY created_at ASC",
            )
            .bind(("department_id", department_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TeamRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().map(Team::from).collect())
    }
}
