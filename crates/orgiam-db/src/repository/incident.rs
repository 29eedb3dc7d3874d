//! SurrealDB implementation of [`SyncIncidentRepository`].

use chrono::{DateTime, Utc};
use orgiam_core::error::OrgIamResult;
use orgiam_core::models::incident::{CreateSyncIncident, IncidentKind, SyncIncident};
use orgiam_core::repository::{PaginatedResult, Pagination, SyncIncidentRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::CountRow;
use crate::error::DbError;

const TABLE: &str = "sync_incident";

#[derive(Debug, SurrealValue)]
struct IncidentRow {
    record_id: String,
    kind: String,
    entity_id: String,
    principal: Option<String>,
    failed: Vec<String>,
    detail: String,
    recorded_at: DateTime<Utc>,
}

impl IncidentRow {
    fn try_into_incident(self) -> Result<SyncIncident, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::malformed(TABLE, format!("invalid UUID: {e}")))?;
        let kind = IncidentKind::parse(&self.kind)
            .ok_or_else(|| DbError::malformed(TABLE, format!("unknown kind: {}", self.kind)))?;
        Ok(SyncIncident {
            id,
            kind,
            entity_id: self.entity_id,
            principal: self.principal,
            failed: self.failed,
            detail: self.detail,
            recorded_at: self.recorded_at,
        })
    }
}

/// SurrealDB implementation of the sync incident journal.
#[derive(Clone)]
pub struct SurrealSyncIncidentRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealSyncIncidentRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> SyncIncidentRepository for SurrealSyncIncidentRepository<C> {
    async fn append(&self, input: CreateSyncIncident) -> OrgIamResult<SyncIncident> {
        let id_str = Uuid::new_v4().to_string();

        self.db
            .query(
                "CREATE type::record('sync_incident', $id) SET \
                 kind = $kind, entity_id = $entity_id, \
                 principal = $principal, failed = $failed, \
                 detail = $detail \
                 RETURN NONE",
            )
            .bind(("id", id_str.clone()))
            .bind(("kind", input.kind.as_str().to_string()))
            .bind(("entity_id", input.entity_id))
            .bind(("principal", input.principal))
            .bind(("failed", input.failed))
            .bind(("detail", input.detail))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::on_create(TABLE, &id_str, e))?;

        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('sync_incident', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<IncidentRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: TABLE.into(),
            id: id_str,
        })?;

        Ok(row.try_into_incident()?)
    }

    async fn list(&self, pagination: Pagination) -> OrgIamResult<PaginatedResult<SyncIncident>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM sync_incident GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM sync_incident \
                 ORDER BY recorded_at DESC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<IncidentRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(IncidentRow::try_into_incident)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
