//! Integration tests for the Employee repository using in-memory SurrealDB.

use orgiam_core::error::OrgIamError;
use orgiam_core::models::employee::{NewEmployee, RoleLabel, SyncState};
use orgiam_core::repository::{EmployeeRepository, Pagination};
use orgiam_core::roles::{ScopeRoles, role_set};
use orgiam_db::repository::SurrealEmployeeRepository;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    orgiam_db::run_migrations(&db).await.unwrap();
    db
}

fn new_employee(id: &str, email: &str) -> NewEmployee {
    NewEmployee {
        id: id.into(),
        first_name: "Grace".into(),
        last_name: "Hopper".into(),
        email: email.into(),
        password: "SuperSecret123!".into(),
        role: None,
        department_id: None,
        team_ids: Vec::new(),
        iam_roles: ScopeRoles::new(),
    }
}

#[tokio::test]
async fn create_and_get_employee() {
    let repo = SurrealEmployeeRepository::new(setup().await);

    let mut input = new_employee("emp_1", "grace@example.com");
    input.role = Some(RoleLabel::Member);
    input.team_ids = vec!["team_1".into()];
    input
        .iam_roles
        .insert("team_1".into(), role_set(["viewer", "editor"]));

    let emp = repo.create(input).await.unwrap();

    assert_eq!(emp.id, "emp_1");
    assert_eq!(emp.role, Some(RoleLabel::Member));
    assert_eq!(emp.team_ids, vec!["team_1".to_string()]);
    assert_eq!(emp.iam_roles["team_1"], role_set(["editor", "viewer"]));
    assert_eq!(emp.sync_state, SyncState::Pending);
    assert!(emp.granted_roles.is_empty());
    assert!(emp.retired_principals.is_empty());
    assert_eq!(emp.version, 1);
    assert!(emp.password_hash.starts_with("$argon2id$"));

    let fetched = repo.get("emp_1").await.unwrap();
    assert_eq!(fetched, emp);
}

#[tokio::test]
async fn create_rejects_taken_id_and_email() {
    let repo = SurrealEmployeeRepository::new(setup().await);
    repo.create(new_employee("emp_1", "a@example.com"))
        .await
        .unwrap();

    let err = repo
        .create(new_employee("emp_1", "b@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrgIamError::AlreadyExists { .. }), "{err}");

    let err = repo
        .create(new_employee("emp_2", "a@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrgIamError::AlreadyExists { .. }), "{err}");

    // The first document is untouched.
    let original = repo.get("emp_1").await.unwrap();
    assert_eq!(original.email, "a@example.com");
}

#[tokio::test]
async fn get_missing_employee_is_not_found() {
    let repo = SurrealEmployeeRepository::new(setup().await);
    let err = repo.get("emp_404").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn save_bumps_version_and_rejects_stale_writes() {
    let repo = SurrealEmployeeRepository::new(setup().await);
    let emp = repo
        .create(new_employee("emp_1", "a@example.com"))
        .await
        .unwrap();

    let mut first = emp.clone();
    first.first_name = "Ada".into();
    first.sync_state = SyncState::Synced;
    first.granted_roles = role_set(["viewer"]);
    first.retired_principals = vec!["old@example.com".into()];
    let saved = repo.save(&first).await.unwrap();
    assert_eq!(saved.version, 2);
    assert_eq!(saved.first_name, "Ada");
    assert_eq!(saved.sync_state, SyncState::Synced);
    assert_eq!(saved.granted_roles, role_set(["viewer"]));
    assert_eq!(saved.retired_principals, vec!["old@example.com".to_string()]);

    // A writer still holding version 1 loses.
    let mut stale = emp;
    stale.last_name = "Byron".into();
    let err = repo.save(&stale).await.unwrap_err();
    assert!(matches!(err, OrgIamError::Conflict { .. }), "{err}");
    assert_eq!(repo.get("emp_1").await.unwrap().last_name, "Hopper");
}

#[tokio::test]
async fn save_of_deleted_employee_is_not_found() {
    let repo = SurrealEmployeeRepository::new(setup().await);
    let emp = repo
        .create(new_employee("emp_1", "a@example.com"))
        .await
        .unwrap();
    repo.delete("emp_1").await.unwrap();

    let err = repo.save(&emp).await.unwrap_err();
    assert!(err.is_not_found(), "{err}");
}

#[tokio::test]
async fn set_password_rehashes() {
    let repo = SurrealEmployeeRepository::new(setup().await);
    let emp = repo
        .create(new_employee("emp_1", "a@example.com"))
        .await
        .unwrap();

    repo.set_password("emp_1", "AnotherSecret456!")
        .await
        .unwrap();
    let after = repo.get("emp_1").await.unwrap();
    assert_ne!(after.password_hash, emp.password_hash);
    assert_eq!(after.version, emp.version);

    assert!(
        repo.set_password("emp_9", "x")
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn list_queries() {
    let repo = SurrealEmployeeRepository::new(setup().await);

    let mut member = new_employee("emp_1", "m@example.com");
    member.role = Some(RoleLabel::Member);
    member.team_ids = vec!["team_1".into(), "team_2".into()];
    member.department_id = Some("dept_1".into());
    repo.create(member).await.unwrap();

    let mut head = new_employee("emp_2", "h@example.com");
    head.role = Some(RoleLabel::Hod);
    head.department_id = Some("dept_1".into());
    let head = repo.create(head).await.unwrap();

    repo.create(new_employee("emp_3", "u@example.com"))
        .await
        .unwrap();

    let page = repo
        .list(Pagination {
            offset: 0,
            limit: 2,
        })
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 2);

    let mut ids = repo.list_ids().await.unwrap();
    ids.sort();
    assert_eq!(ids, vec!["emp_1", "emp_2", "emp_3"]);

    let in_dept = repo.list_by_department("dept_1").await.unwrap();
    assert_eq!(in_dept.len(), 2);

    let in_team = repo.list_by_team("team_2").await.unwrap();
    assert_eq!(in_team.len(), 1);
    assert_eq!(in_team[0].id, "emp_1");

    let by_email = repo.find_by_email("h@example.com").await.unwrap();
    assert_eq!(by_email.map(|e| e.id), Some("emp_2".to_string()));
    assert!(repo.find_by_email("x@example.com").await.unwrap().is_none());

    // New documents start unsynced.
    assert_eq!(repo.list_unsynced(10).await.unwrap().len(), 3);
    let mut synced = head;
    synced.sync_state = SyncState::Synced;
    repo.save(&synced).await.unwrap();
    assert_eq!(repo.list_unsynced(10).await.unwrap().len(), 2);
}
