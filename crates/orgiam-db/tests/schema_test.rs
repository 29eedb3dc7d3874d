//! Integration tests for schema initialization using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::Mem;

#[tokio::test]
async fn schema_migration_applies_successfully() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    orgiam_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: Option<surrealdb_types::Value> = result.take(0).unwrap();
    let info = info.expect("INFO FOR DB should return a value");
    let info_str = format!("{:?}", info);

    assert!(info_str.contains("employee"), "missing employee table");
    assert!(info_str.contains("team"), "missing team table");
    assert!(info_str.contains("department"), "missing department table");
    assert!(
        info_str.contains("sync_incident"),
        "missing sync_incident table"
    );
    assert!(
        info_str.contains("role_binding"),
        "missing role_binding table"
    );
    assert!(info_str.contains("_migration"), "missing _migration table");
}

#[tokio::test]
async fn migration_is_idempotent() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    orgiam_db::run_migrations(&db).await.unwrap();
    orgiam_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("SELECT * FROM _migration").await.unwrap();
    let records: Vec<surrealdb_types::Value> = result.take(0).unwrap();
    assert_eq!(
        records.len(),
        orgiam_db::latest_version() as usize,
        "expected one record per migration"
    );
}

#[tokio::test]
async fn employee_role_label_is_constrained() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    orgiam_db::run_migrations(&db).await.unwrap();

    let result = db
        .query(
            "CREATE employee:emp_1 SET first_name = 'a', last_name = 'b', \
             email = 'a@b.c', password_hash = 'x', role = 'Owner'",
        )
        .await
        .unwrap();
    assert!(result.check().is_err(), "unknown role label must be rejected");
}
