//! SurrealDB implementation of [`DepartmentRepository`].

use chrono::{DateTime, Utc};
use orgiam_core::error::OrgIamResult;
use orgiam_core::models::department::{Department, NewDepartment};
use orgiam_core::repository::{DepartmentRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;

use super::{CountRow, IdRow, VersionRow};
use crate::error::DbError;

const TABLE: &str = "department";

#[derive(Debug, SurrealValue)]
struct DepartmentRow {
    record_id: String,
    name: String,
    default_roles: Vec<String>,
    head_id: String,
    handover_to: Option<String>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<DepartmentRow> for Department {
    fn from(row: DepartmentRow) -> Self {
        Department {
            id: row.record_id,
            name: row.name,
            default_roles: row.default_roles.into_iter().collect(),
            head_id: row.head_id,
            handover_to: row.handover_to,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// SurrealDB implementation of the Department repository.
#[derive(Clone)]
pub struct SurrealDepartmentRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealDepartmentRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> DepartmentRepository for SurrealDepartmentRepository<C> {
    async fn create(&self, input: NewDepartment) -> OrgIamResult<Department> {
        let default_roles: Vec<String> = input.default_roles.into_iter().collect();

        self.db
            .query(
                "CREATE type::record('department', $id) SET \
                 name = $name, default_roles = $default_roles, \
                 head_id = $head_id, version = 1 \
                 RETURN NONE",
            )
            .bind(("id", input.id.clone()))
            .bind(("name", input.name))
            .bind(("default_roles", default_roles))
            .bind(("head_id", input.head_id))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::on_create(TABLE, &input.id, e))?;

        self.get(&input.id).await
    }

    async fn get(&self, id: &str) -> OrgIamResult<Department> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('department', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<DepartmentRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: TABLE.into(),
            id: id.to_string(),
        })?;

        Ok(row.into())
    }

    async fn save(&self, department: &Department) -> OrgIamResult<Department> {
        let default_roles: Vec<String> = department.default_roles.iter().cloned().collect();

        let mut result = self
            .db
            .query(
                "UPDATE type::record('department', $id) SET \
                 name = $name, default_roles = $default_roles, \
                 head_id = $head_id, handover_to = $handover_to, \
                 version = version + 1, updated_at = time::now() \
                 WHERE version = $expected \
                 RETURN version",
            )
            .bind(("id", department.id.clone()))
            .bind(("name", department.name.clone()))
            .bind(("default_roles", default_roles))
            .bind(("head_id", department.head_id.clone()))
            .bind(("handover_to", department.handover_to.clone()))
            .bind(("expected", department.version))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<VersionRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            self.get(&department.id).await?;
            return Err(DbError::Conflict {
                entity: TABLE.into(),
                id: department.id.clone(),
            }
            .into());
        }

        self.get(&department.id).await
    }

    async fn delete(&self, id: &str) -> OrgIamResult<()> {
        self.db
            .query("DELETE type::record('department', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> OrgIamResult<PaginatedResult<Department>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM department GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM department \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<DepartmentRow> = result.take(0).map_err(DbError::from)?;

        Ok(PaginatedResult {
            items: rows.into_iter().map(Department::from).collect(),
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_ids(&self) -> OrgIamResult<Vec<String>> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id FROM department")
            .await
            .map_err(DbError::from)?;
        let rows: Vec<IdRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().map(|r| r.record_id).collect())
    }
}
