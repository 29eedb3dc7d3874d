//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! Entity ids (`emp_N`, `team_N`, `dept_N`) are the record keys, so a
//! `CREATE type::record(..)` on a taken id fails instead of overwriting.
//! Enums are stored as strings with ASSERT constraints for validation.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, info};

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct AppliedVersion {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "organization_schema",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "policy_sync_tracking",
        sql: SCHEMA_V2,
    },
    Migration {
        version: 3,
        name: "retired_principals",
        sql: SCHEMA_V3,
    },
];

// -----------------------------------------------------------------------
// Schema v1: employees, teams, departments
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Departments
-- =======================================================================
DEFINE TABLE department SCHEMAFULL;
DEFINE FIELD name ON TABLE department TYPE string;
DEFINE FIELD default_roles ON TABLE department TYPE array<string> \
    DEFAULT [];
DEFINE FIELD head_id ON TABLE department TYPE string;
DEFINE FIELD handover_to ON TABLE department TYPE option<string>;
DEFINE FIELD version ON TABLE department TYPE int DEFAULT 1;
DEFINE FIELD created_at ON TABLE department TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE department TYPE option<datetime>;

-- =======================================================================
-- Teams (optionally owned by a department)
-- =======================================================================
DEFINE TABLE team SCHEMAFULL;
DEFINE FIELD name ON TABLE team TYPE string;
DEFINE FIELD roles ON TABLE team TYPE array<string> DEFAULT [];
DEFINE FIELD lead_id ON TABLE team TYPE option<string>;
DEFINE FIELD department_id ON TABLE team TYPE option<string>;
DEFINE FIELD handover_to ON TABLE team TYPE option<string>;
DEFINE FIELD version ON TABLE team TYPE int DEFAULT 1;
DEFINE FIELD created_at ON TABLE team TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE team TYPE option<datetime>;
DEFINE INDEX idx_team_department ON TABLE team COLUMNS department_id;

-- =======================================================================
-- Employees
-- =======================================================================
DEFINE TABLE employee SCHEMAFULL;
DEFINE FIELD first_name ON TABLE employee TYPE string;
DEFINE FIELD last_name ON TABLE employee TYPE string;
DEFINE FIELD email ON TABLE employee TYPE string;
DEFINE FIELD password_hash ON TABLE employee TYPE string;
DEFINE FIELD role ON TABLE employee TYPE option<string> \
    ASSERT $value = NONE OR $value IN ['HOD', 'Lead', 'Member'];
DEFINE FIELD department_id ON TABLE employee TYPE option<string>;
DEFINE FIELD team_ids ON TABLE employee TYPE array<string> DEFAULT [];
DEFINE FIELD iam_roles ON TABLE employee TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD version ON TABLE employee TYPE int DEFAULT 1;
DEFINE FIELD created_at ON TABLE employee TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE employee TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_employee_email ON TABLE employee COLUMNS email UNIQUE;
DEFINE INDEX idx_employee_department ON TABLE employee \
    COLUMNS department_id;
";

// -----------------------------------------------------------------------
// Schema v2: policy sync tracking
// -----------------------------------------------------------------------

const SCHEMA_V2: &str = "\
-- Roles the policy store is believed to hold, and convergence state.
DEFINE FIELD granted_roles ON TABLE employee TYPE array<string> \
    DEFAULT [];
DEFINE FIELD sync_state ON TABLE employee TYPE string \
    DEFAULT 'Synced' \
    ASSERT $value IN ['Synced', 'Pending', 'Revoking'];
DEFINE INDEX idx_employee_sync_state ON TABLE employee \
    COLUMNS sync_state;

-- =======================================================================
-- Sync incidents (append-only)
-- =======================================================================
DEFINE TABLE sync_incident SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update NONE
        FOR delete NONE;
DEFINE FIELD kind ON TABLE sync_incident TYPE string \
    ASSERT $value IN ['PartialSync', 'CascadeIncomplete', \
    'HandoverIncomplete'];
DEFINE FIELD entity_id ON TABLE sync_incident TYPE string;
DEFINE FIELD principal ON TABLE sync_incident TYPE option<string>;
DEFINE FIELD failed ON TABLE sync_incident TYPE array<string> DEFAULT [];
DEFINE FIELD detail ON TABLE sync_incident TYPE string;
DEFINE FIELD recorded_at ON TABLE sync_incident TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_sync_incident_time ON TABLE sync_incident \
    COLUMNS recorded_at;

-- =======================================================================
-- Role bindings (principal -> role), backing the bundled policy store
-- =======================================================================
DEFINE TABLE role_binding SCHEMAFULL;
DEFINE FIELD principal ON TABLE role_binding TYPE string;
DEFINE FIELD role ON TABLE role_binding TYPE string;
DEFINE FIELD granted_at ON TABLE role_binding TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_role_binding_principal_role ON TABLE role_binding \
    COLUMNS principal, role UNIQUE;
";

// -----------------------------------------------------------------------
// Schema v3: principals left behind by an email change
// -----------------------------------------------------------------------

const SCHEMA_V3: &str = "\
DEFINE FIELD retired_principals ON TABLE employee TYPE array<string> \
    DEFAULT [];
UPDATE employee SET retired_principals = [] \
    WHERE retired_principals = NONE;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Bring the schema up to [`latest_version`].
///
/// Applied versions are recorded in `_migration`; a migration runs at most
/// once per database, in ascending order.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(format!("_migration table: {e}")))?;

    let applied = applied_version(db).await?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > applied).collect();
    if pending.is_empty() {
        debug!(version = applied, "Schema up to date");
        return Ok(());
    }

    for migration in pending {
        apply(db, migration).await?;
    }
    Ok(())
}

async fn applied_version<C: Connection>(db: &Surreal<C>) -> Result<u32, DbError> {
    let mut result = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let rows: Vec<AppliedVersion> = result.take(0)?;
    Ok(rows.first().map_or(0, |row| row.version))
}

async fn apply<C: Connection>(db: &Surreal<C>, migration: &Migration) -> Result<(), DbError> {
    let label = format!("v{} {}", migration.version, migration.name);
    info!(migration = %label, "Applying schema migration");

    db.query(migration.sql)
        .await?
        .check()
        .map_err(|e| DbError::Migration(format!("{label}: {e}")))?;
    db.query("CREATE _migration SET version = $version, name = $name")
        .bind(("version", migration.version))
        .bind(("name", migration.name))
        .await?
        .check()
        .map_err(|e| DbError::Migration(format!("recording {label}: {e}")))?;

    info!(migration = %label, "Schema migration applied");
    Ok(())
}

/// Latest schema version known to this build.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schemas_are_nonempty() {
        for migration in MIGRATIONS {
            assert!(!migration.sql.is_empty(), "{} is empty", migration.name);
        }
    }

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
        assert_eq!(latest_version(), 3);
    }

    #[test]
    fn employee_email_is_unique() {
        assert!(SCHEMA_V1.contains("idx_employee_email ON TABLE employee COLUMNS email UNIQUE"));
    }
}
