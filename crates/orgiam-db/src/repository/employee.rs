//! SurrealDB implementation of [`EmployeeRepository`].
//!
//! Only Argon2id hashes of passwords are stored; a server-side pepper can
//! be supplied through [`SurrealEmployeeRepository::with_pepper`].

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHasher};
use chrono::{DateTime, Utc};
use orgiam_core::error::OrgIamResult;
use orgiam_core::models::employee::{Employee, NewEmployee, RoleLabel, SyncState};
use orgiam_core::repository::{EmployeeRepository, PaginatedResult, Pagination};
use orgiam_core::roles::{RoleSet, ScopeRoles};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;

use super::{CountRow, IdRow, VersionRow};
use crate::error::DbError;

const TABLE: &str = "employee";

const SELECT_FIELDS: &str = "meta::id(id) AS record_id, *";

#[derive(Debug, SurrealValue)]
struct EmployeeRow {
    record_id: String,
    first_name: String,
    last_name: String,
    email: String,
    password_hash: String,
    role: Option<String>,
    department_id: Option<String>,
    team_ids: Vec<String>,
    iam_roles: serde_json::Value,
    granted_roles: Vec<String>,
    sync_state: String,
    retired_principals: Vec<String>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl EmployeeRow {
    fn try_into_employee(self) -> Result<Employee, DbError> {
        let role = match self.role.as_deref() {
            None => None,
            Some(s) => Some(
                RoleLabel::parse(s)
                    .ok_or_else(|| DbError::malformed(TABLE, format!("unknown role: {s}")))?,
            ),
        };
        let sync_state = SyncState::parse(&self.sync_state).ok_or_else(|| {
            DbError::malformed(TABLE, format!("unknown sync state: {}", self.sync_state))
        })?;
        let iam_roles: ScopeRoles = serde_json::from_value(self.iam_roles)
            .map_err(|e| DbError::malformed(TABLE, format!("iam_roles: {e}")))?;

        Ok(Employee {
            id: self.record_id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            password_hash: self.password_hash,
            role,
            department_id: self.department_id,
            team_ids: self.team_ids,
            iam_roles,
            granted_roles: self.granted_roles.into_iter().collect::<RoleSet>(),
            sync_state,
            retired_principals: self.retired_principals,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn encode_roles(map: &ScopeRoles) -> Result<serde_json::Value, DbError> {
    serde_json::to_value(map).map_err(|e| DbError::malformed(TABLE, format!("iam_roles: {e}")))
}

/// Argon2id (m=19 MiB, t=2, p=1) over `pepper || password`.
fn hash_password(password: &str, pepper: Option<&str>) -> Result<String, DbError> {
    let params = argon2::Params::new(19_456, 2, 1, None)
        .map_err(|e| DbError::PasswordHash(format!("argon2 params: {e}")))?;
    let hasher = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let input = [pepper.unwrap_or_default(), password].concat();
    let salt = SaltString::generate(&mut OsRng);
    hasher
        .hash_password(input.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DbError::PasswordHash(e.to_string()))
}

/// SurrealDB implementation of the Employee repository.
#[derive(Clone)]
pub struct SurrealEmployeeRepository<C: Connection> {
    db: Surreal<C>,
    /// Optional server-side pepper for password hashing.
    pepper: Option<String>,
}

impl<C: Connection> SurrealEmployeeRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db, pepper: None }
    }

    pub fn with_pepper(db: Surreal<C>, pepper: String) -> Self {
        Self {
            db,
            pepper: Some(pepper),
        }
    }

    async fn select(
        &self,
        filter: &str,
        bind: (&'static str, String),
    ) -> OrgIamResult<Vec<Employee>> {
        let query = format!(
            "SELECT {SELECT_FIELDS} FROM employee WHERE {filter} ORDER BY created_at ASC"
        );
        let mut result = self
            .db
            .query(query)
            .bind(bind)
            .await
            .map_err(DbError::from)?;

        let rows: Vec<EmployeeRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(EmployeeRow::try_into_employee)
            .collect::<Result<Vec<_>, DbError>>()?)
    }
}

impl<C: Connection> EmployeeRepository for SurrealEmployeeRepository<C> {
    async fn create(&self, input: NewEmployee) -> OrgIamResult<Employee> {
        let password_hash = hash_password(&input.password, self.pepper.as_deref())?;
        let iam_roles = encode_roles(&input.iam_roles)?;

        let result = self
            .db
            .query(
                "CREATE type::record('employee', $id) SET \
                 first_name = $first_name, last_name = $last_name, \
                 email = $email, password_hash = $password_hash, \
                 role = $role, department_id = $department_id, \
                 team_ids = $team_ids, iam_roles = $iam_roles, \
                 granted_roles = [], sync_state = 'Pending', \
                 retired_principals = [], version = 1 \
                 RETURN NONE",
            )
            .bind(("id", input.id.clone()))
            .bind(("first_name", input.first_name))
            .bind(("last_name", input.last_name))
            .bind(("email", input.email.clone()))
            .bind(("password_hash", password_hash))
            .bind(("role", input.role.map(|r| r.as_str().to_string())))
            .bind(("department_id", input.department_id))
            .bind(("team_ids", input.team_ids))
            .bind(("iam_roles", iam_roles))
            .await
            .map_err(DbError::from)?;

        result.check().map_err(|e| {
            let email_taken = e.to_string().contains("idx_employee_email");
            match DbError::on_create(TABLE, &input.id, e) {
                DbError::AlreadyExists { entity, .. } if email_taken => DbError::AlreadyExists {
                    entity,
                    id: format!("email={}", input.email),
                },
                other => other,
            }
        })?;

        self.get(&input.id).await
    }

    async fn get(&self, id: &str) -> OrgIamResult<Employee> {
        let mut result = self
            .db
            .query(format!(
                "SELECT {SELECT_FIELDS} FROM type::record('employee', $id)"
            ))
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<EmployeeRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: TABLE.into(),
            id: id.to_string(),
        })?;

        Ok(row.try_into_employee()?)
    }

    async fn find_by_email(&self, email: &str) -> OrgIamResult<Option<Employee>> {
        let mut found = self.select("email = $email", ("email", email.to_string())).await?;
        Ok(found.pop())
    }

    async fn save(&self, employee: &Employee) -> OrgIamResult<Employee> {
        let iam_roles = encode_roles(&employee.iam_roles)?;
        let granted: Vec<String> = employee.granted_roles.iter().cloned().collect();

        let result = self
            .db
            .query(
                "UPDATE type::record('employee', $id) SET \
                 first_name = $first_name, last_name = $last_name, \
                 email = $email, role = $role, \
                 department_id = $department_id, team_ids = $team_ids, \
                 iam_roles = $iam_roles, granted_roles = $granted_roles, \
                 sync_state = $sync_state, \
                 retired_principals = $retired_principals, \
                 version = version + 1, updated_at = time::now() \
                 WHERE version = $expected \
                 RETURN version",
            )
            .bind(("id", employee.id.clone()))
            .bind(("first_name", employee.first_name.clone()))
            .bind(("last_name", employee.last_name.clone()))
            .bind(("email", employee.email.clone()))
            .bind(("role", employee.role.map(|r| r.as_str().to_string())))
            .bind(("department_id", employee.department_id.clone()))
            .bind(("team_ids", employee.team_ids.clone()))
            .bind(("iam_roles", iam_roles))
            .bind(("granted_roles", granted))
            .bind(("sync_state", employee.sync_state.as_str().to_string()))
            .bind(("retired_principals", employee.retired_principals.clone()))
            .bind(("expected", employee.version))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| DbError::on_create(TABLE, &employee.id, e))?;
        let rows: Vec<VersionRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            // Either the record is gone or someone else wrote first.
            self.get(&employee.id).await?;
            return Err(DbError::Conflict {
                entity: TABLE.into(),
                id: employee.id.clone(),
            }
            .into());
        }

        self.get(&employee.id).await
    }

    async fn set_password(&self, id: &str, password: &str) -> OrgIamResult<()> {
        let password_hash = hash_password(password, self.pepper.as_deref())?;

        let mut result = self
            .db
            .query(
                "UPDATE type::record('employee', $id) SET \
                 password_hash = $password_hash, updated_at = time::now() \
                 RETURN version",
            )
            .bind(("id", id.to_string()))
            .bind(("password_hash", password_hash))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<VersionRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(DbError::NotFound {
                entity: TABLE.into(),
                id: id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> OrgIamResult<()> {
        self.db
            .query("DELETE type::record('employee', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> OrgIamResult<PaginatedResult<Employee>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM employee GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(format!(
                "SELECT {SELECT_FIELDS} FROM employee \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset"
            ))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<EmployeeRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(EmployeeRow::try_into_employee)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_ids(&self) -> OrgIamResult<Vec<String>> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id FROM employee")
            .await
            .map_err(DbError::from)?;
        let rows: Vec<IdRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().map(|r| r.record_id).collect())
    }

    async fn list_by_department(&self, department_id: &str) -> OrgIamResult<Vec<Employee>> {
        self.select(
            "department_id = $department_id",
            ("department_id", department_id.to_string()),
        )
        .await
    }

    async fn list_by_team(&self, team_id: &str) -> OrgIamResult<Vec<Employee>> {
        self.select("team_ids CONTAINS $team_id", ("team_id", team_id.to_string()))
            .await
    }

    async fn list_unsynced(&self, limit: u64) -> OrgIamResult<Vec<Employee>> {
        let mut result = self
            .db
            .query(format!(
                "SELECT {SELECT_FIELDS} FROM employee \
                 WHERE sync_state != 'Synced' \
                 ORDER BY updated_at ASC LIMIT $limit"
            ))
            .bind(("limit", limit))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<EmployeeRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(EmployeeRow::try_into_employee)
            .collect::<Result<Vec<_>, DbError>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_argon2id_and_salted() {
        let a = hash_password("hunter2", None).unwrap();
        let b = hash_password("hunter2", None).unwrap();
        assert!(a.starts_with("$argon2id$"));
        assert_ne!(a, b);
    }

    #[test]
    fn pepper_changes_hash_input() {
        use argon2::{PasswordHash, PasswordVerifier};

        let hash = hash_password("hunter2", Some("pepper")).unwrap();
        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(
            Argon2::default()
                .verify_password(b"pepperhunter2", &parsed)
                .is_ok()
        );
        assert!(Argon2::default().verify_password(b"hunter2", &parsed).is_err());
    }
}
