//! Integration tests for tenant provisioning using in-memory SurrealDB.

use stagehand_core::error::StagehandError;
use stagehand_core::repository::TenantProvisioner;
use stagehand_db::repository::SurrealTenantProvisioner;
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use uuid::Uuid;

/// Helper: spin up in-memory DB and run migrations.
async fn setup() -> Surreal<surrealdb::engine::local::Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    stagehand_db::run_migrations(&db).await.unwrap();
    db
}

async fn store_count(db: &Surreal<surrealdb::engine::local::Db>, tenant_id: Uuid) -> usize {
    let mut result = db
        .query("SELECT name FROM tenant_store WHERE tenant_id = $id")
        .bind(("id", tenant_id.to_string()))
        .await
        .unwrap();
    let rows: Vec<surrealdb_types::Value> = result.take(0).unwrap();
    rows.len()
}

#[tokio::test]
async fn ensure_tenant_creates_tenant_and_stores() {
    let db = setup().await;
    let provisioner = SurrealTenantProvisioner::new(db.clone());
    let tenant_id = Uuid::new_v4();

    let status = provisioner
        .ensure_tenant(tenant_id, "principal-1")
        .await
        .unwrap();
    assert!(status.created);
    assert!(status.storage_ready);

    let tenant = provisioner.get_tenant(tenant_id).await.unwrap();
    assert_eq!(tenant.owner_principal_id, "principal-1");
    assert!(tenant.is_active);
    assert!(tenant.storage_ready);

    assert_eq!(store_count(&db, tenant_id).await, 4);
}

#[tokio::test]
async fn ensure_tenant_is_idempotent() {
    let db = setup().await;
    let provisioner = SurrealTenantProvisioner::new(db.clone());
    let tenant_id = Uuid::new_v4();

    let first = provisioner
        .ensure_tenant(tenant_id, "principal-1")
        .await
        .unwrap();
    let second = provisioner
        .ensure_tenant(tenant_id, "principal-1")
        .await
        .unwrap();

    assert!(first.created);
    // The second call observes the existing tenant instead of
    // recreating it.
    assert!(!second.created);
    assert!(second.storage_ready);
    assert_eq!(store_count(&db, tenant_id).await, 4);
}

#[tokio::test]
async fn concurrent_provisioning_creates_exactly_one_tenant() {
    let db = setup().await;
    let tenant_id = Uuid::new_v4();

    let a = SurrealTenantProvisioner::new(db.clone());
    let b = SurrealTenantProvisioner::new(db.clone());

    let (left, right) = tokio::join!(
        a.ensure_tenant(tenant_id, "principal-1"),
        b.ensure_tenant(tenant_id, "principal-1"),
    );

    // Both callers succeed: exactly one performs the creation, the
    // loser re-reads the committed row (waiting out commit visibility
    // if it has to) and observes ready storage.
    let left = left.unwrap();
    let right = right.unwrap();
    assert!(left.storage_ready);
    assert!(right.storage_ready);
    assert_eq!(
        [left, right].iter().filter(|s| s.created).count(),
        1,
        "exactly one caller creates the tenant"
    );

    assert_eq!(store_count(&db, tenant_id).await, 4);
    let tenant = a.get_tenant(tenant_id).await.unwrap();
    assert!(tenant.storage_ready);
}

#[tokio::test]
async fn foreign_owner_is_a_conflict() {
    let provisioner = SurrealTenantProvisioner::new(setup().await);
    let tenant_id = Uuid::new_v4();

    provisioner
        .ensure_tenant(tenant_id, "principal-1")
        .await
        .unwrap();

    match provisioner.ensure_tenant(tenant_id, "principal-2").await {
        Err(StagehandError::TenantIdConflict {
            tenant_id: conflicted,
            owner,
            claimant,
        }) => {
            assert_eq!(conflicted, tenant_id);
            assert_eq!(owner, "principal-1");
            assert_eq!(claimant, "principal-2");
        }
        other => panic!("expected TenantIdConflict, got {other:?}"),
    }
}

#[tokio::test]
async fn deactivate_keeps_the_row() {
    let provisioner = SurrealTenantProvisioner::new(setup().await);
    let tenant_id = Uuid::new_v4();

    provisioner
        .ensure_tenant(tenant_id, "principal-1")
        .await
        .unwrap();
    provisioner.deactivate(tenant_id).await.unwrap();

    let tenant = provisioner.get_tenant(tenant_id).await.unwrap();
    assert!(!tenant.is_active);
    assert!(tenant.storage_ready);
}

#[tokio::test]
async fn deactivate_unknown_tenant_is_not_found() {
    let provisioner = SurrealTenantProvisioner::new(setup().await);
    match provisioner.deactivate(Uuid::new_v4()).await {
        Err(StagehandError::NotFound { .. }) => {}
        other => panic!("expected NotFound, got {other:?}"),
    }
}
