//! Integration tests for the table-backed policy store and the sync
//! incident journal.

use orgiam_core::models::incident::{CreateSyncIncident, IncidentKind};
use orgiam_core::policy::PolicyStore;
use orgiam_core::repository::{Pagination, SyncIncidentRepository};
use orgiam_core::roles::role_set;
use orgiam_db::repository::{SurrealPolicyStore, SurrealSyncIncidentRepository};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    orgiam_db::run_migrations(&db).await.unwrap();
    db
}

#[tokio::test]
async fn grant_is_idempotent() {
    let store = SurrealPolicyStore::new(setup().await);

    store.grant("a@example.com", "viewer").await.unwrap();
    store.grant("a@example.com", "viewer").await.unwrap();
    store.grant("a@example.com", "editor").await.unwrap();
    store.grant("b@example.com", "viewer").await.unwrap();

    assert_eq!(
        store.roles_of("a@example.com").await.unwrap(),
        role_set(["editor", "viewer"])
    );
}

#[tokio::test]
async fn revoke_all_only_touches_one_principal() {
    let store = SurrealPolicyStore::new(setup().await);
    store.grant("a@example.com", "viewer").await.unwrap();
    store.grant("b@example.com", "viewer").await.unwrap();

    store.revoke_all("a@example.com").await.unwrap();
    store.revoke_all("a@example.com").await.unwrap();

    assert!(store.roles_of("a@example.com").await.unwrap().is_empty());
    assert_eq!(
        store.roles_of("b@example.com").await.unwrap(),
        role_set(["viewer"])
    );
}

#[tokio::test]
async fn incidents_are_appended_and_listed() {
    let repo = SurrealSyncIncidentRepository::new(setup().await);

    let first = repo
        .append(CreateSyncIncident {
            kind: IncidentKind::PartialSync,
            entity_id: "emp_1".into(),
            principal: Some("a@example.com".into()),
            failed: vec!["admin".into()],
            detail: "policy store unavailable".into(),
        })
        .await
        .unwrap();
    assert_eq!(first.kind, IncidentKind::PartialSync);
    assert_eq!(first.failed, vec!["admin".to_string()]);

    repo.append(CreateSyncIncident {
        kind: IncidentKind::CascadeIncomplete,
        entity_id: "dept_1".into(),
        principal: None,
        failed: vec!["emp_2".into()],
        detail: "1 member not detached".into(),
    })
    .await
    .unwrap();

    let page = repo.list(Pagination::default()).await.unwrap();
    assert_eq!(page.total, 2);
    assert!(page.items.iter().any(|i| i.id == first.id));
    assert!(
        page.items
            .iter()
            .any(|i| i.kind == IncidentKind::CascadeIncomplete && i.principal.is_none())
    );
}
