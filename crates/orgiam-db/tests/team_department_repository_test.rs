//! Integration tests for Team and Department repositories.

use orgiam_core::error::OrgIamError;
use orgiam_core::models::department::NewDepartment;
use orgiam_core::models::team::NewTeam;
use orgiam_core::repository::{DepartmentRepository, Pagination, TeamRepository};
use orgiam_core::roles::role_set;
use orgiam_db::repository::{SurrealDepartmentRepository, SurrealTeamRepository};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    orgiam_db::run_migrations(&db).await.unwrap();
    db
}

fn new_team(id: &str, department_id: Option<&str>) -> NewTeam {
    NewTeam {
        id: id.into(),
        name: format!("Team {id}"),
        roles: role_set(["deployer"]),
        lead_id: None,
        department_id: department_id.map(str::to_string),
    }
}

#[tokio::test]
async fn team_crud_round_trip() {
    let repo = SurrealTeamRepository::new(setup().await);

    let team = repo.create(new_team("team_1", Some("dept_1"))).await.unwrap();
    assert_eq!(team.id, "team_1");
    assert_eq!(team.roles, role_set(["deployer"]));
    assert_eq!(team.department_id.as_deref(), Some("dept_1"));
    assert!(team.updated_at.is_none());
    assert_eq!(team.version, 1);

    let mut changed = team.clone();
    changed.lead_id = Some("emp_3".into());
    changed.handover_to = Some("emp_3".into());
    let saved = repo.save(&changed).await.unwrap();
    assert_eq!(saved.version, 2);
    assert_eq!(saved.lead_id.as_deref(), Some("emp_3"));
    assert_eq!(saved.handover_to.as_deref(), Some("emp_3"));
    assert!(saved.updated_at.is_some());

    let err = repo.save(&team).await.unwrap_err();
    assert!(matches!(err, OrgIamError::Conflict { .. }));

    repo.delete("team_1").await.unwrap();
    assert!(repo.get("team_1").await.unwrap_err().is_not_found());
    // Deleting again is harmless.
    repo.delete("team_1").await.unwrap();
}

#[tokio::test]
async fn team_create_is_conditional() {
    let repo = SurrealTeamRepository::new(setup().await);
    repo.create(new_team("team_1", None)).await.unwrap();

    let err = repo.create(new_team("team_1", None)).await.unwrap_err();
    assert!(matches!(err, OrgIamError::AlreadyExists { .. }), "{err}");
}

#[tokio::test]
async fn teams_by_department() {
    let repo = SurrealTeamRepository::new(setup().await);
    repo.create(new_team("team_1", Some("dept_1"))).await.unwrap();
    repo.create(new_team("team_2", Some("dept_2"))).await.unwrap();
    repo.create(new_team("team_3", Some("dept_1"))).await.unwrap();
    repo.create(new_team("team_4", None)).await.unwrap();

    let mut owned: Vec<String> = repo
        .list_by_department("dept_1")
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    owned.sort();
    assert_eq!(owned, vec!["team_1", "team_3"]);

    let page = repo.list(Pagination::default()).await.unwrap();
    assert_eq!(page.total, 4);
    assert_eq!(repo.list_ids().await.unwrap().len(), 4);
}

#[tokio::test]
async fn department_crud_round_trip() {
    let repo = SurrealDepartmentRepository::new(setup().await);

    let dept = repo
        .create(NewDepartment {
            id: "dept_1".into(),
            name: "Engineering".into(),
            default_roles: role_set(["viewer", "editor"]),
            head_id: "emp_5".into(),
        })
        .await
        .unwrap();
    assert_eq!(dept.head_id, "emp_5");
    assert_eq!(dept.default_roles, role_set(["editor", "viewer"]));
    assert!(dept.handover_to.is_none());

    let mut renamed = dept.clone();
    renamed.name = "R&D".into();
    renamed.default_roles.insert("admin".into());
    let saved = repo.save(&renamed).await.unwrap();
    assert_eq!(saved.name, "R&D");
    assert_eq!(saved.version, dept.version + 1);

    let err = repo
        .create(NewDepartment {
            id: "dept_1".into(),
            name: "Dup".into(),
            default_roles: Default::default(),
            head_id: "emp_6".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, OrgIamError::AlreadyExists { .. }));

    assert_eq!(repo.list_ids().await.unwrap(), vec!["dept_1"]);
    repo.delete("dept_1").await.unwrap();
    assert_eq!(repo.list(Pagination::default()).await.unwrap().total, 0);
}
