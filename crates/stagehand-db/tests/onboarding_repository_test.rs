//! Integration tests for the onboarding repository using in-memory
//! SurrealDB.

use stagehand_core::error::StagehandError;
use stagehand_core::models::onboarding::{OnboardingPatch, StoreKind};
use stagehand_core::repository::OnboardingRepository;
use stagehand_core::stage::{Stage, compute_stage};
use stagehand_db::repository::SurrealOnboardingRepository;
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

fn patch(source: StoreKind) -> OnboardingPatch {
    OnboardingPatch {
        source,
        ..Default::default()
    }
}

#[tokio::test]
async fn get_missing_record_is_none() {
    let repo = SurrealOnboardingRepository::new(setup().await);
    assert!(repo.get("nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn patch_creates_the_record_on_first_use() {
    let repo = SurrealOnboardingRepository::new(setup().await);
    let tenant = Uuid::new_v4();

    let record = repo
        .patch(
            "principal-1",
            OnboardingPatch {
                tenant_id: Some(tenant),
                ..patch(StoreKind::Backend)
            },
        )
        .await
        .unwrap();

    assert_eq!(record.facts.tenant_id, Some(tenant));
    assert!(!record.tombstoned);
    assert_eq!(compute_stage(&record.facts), Stage::Subscription);

    let fetched = repo.get("principal-1").await.unwrap().unwrap();
    assert_eq!(fetched.facts, record.facts);
}

#[tokio::test]
async fn patch_is_idempotent() {
    let repo = SurrealOnboardingRepository::new(setup().await);
    let update = OnboardingPatch {
        subscription_plan: Some("pro".into()),
        payment_verified: Some(true),
        ..patch(StoreKind::Backend)
    };

    let first = repo.patch("principal-1", update.clone()).await.unwrap();
    let second = repo.patch("principal-1", update).await.unwrap();

    assert_eq!(first.facts, second.facts);
    assert_eq!(first.provenance, second.provenance);
}

#[tokio::test]
async fn tenant_id_is_write_once() {
    let repo = SurrealOnboardingRepository::new(setup().await);
    let original = Uuid::new_v4();
    let imposter = Uuid::new_v4();

    repo.patch(
        "principal-1",
        OnboardingPatch {
            tenant_id: Some(original),
            ..patch(StoreKind::Backend)
        },
    )
    .await
    .unwrap();

    // A later patch with a different tenant id is dropped, not an
    // error.
    let record = repo
        .patch(
            "principal-1",
            OnboardingPatch {
                tenant_id: Some(imposter),
                ..patch(StoreKind::Reconciler)
            },
        )
        .await
        .unwrap();

    assert_eq!(record.facts.tenant_id, Some(original));
}

#[tokio::test]
async fn reconciliation_never_lowers_completion_flags() {
    let repo = SurrealOnboardingRepository::new(setup().await);

    repo.patch(
        "principal-1",
        OnboardingPatch {
            payment_verified: Some(true),
            setup_done: Some(true),
            ..patch(StoreKind::Backend)
        },
    )
    .await
    .unwrap();

    let record = repo
        .patch(
            "principal-1",
            OnboardingPatch {
                payment_verified: Some(false),
                setup_done: Some(false),
                ..patch(StoreKind::Reconciler)
            },
        )
        .await
        .unwrap();

    assert!(record.facts.payment_verified);
    assert!(record.facts.setup_done);

    // An explicit administrative reset is the one path that can.
    let record = repo
        .patch(
            "principal-1",
            OnboardingPatch {
                setup_done: Some(false),
                ..patch(StoreKind::Admin)
            },
        )
        .await
        .unwrap();
    assert!(!record.facts.setup_done);
    assert!(record.facts.payment_verified);
}

#[tokio::test]
async fn provenance_tracks_the_writing_store() {
    use stagehand_core::models::onboarding::FactField;

    let repo = SurrealOnboardingRepository::new(setup().await);
    repo.patch(
        "principal-1",
        OnboardingPatch {
            subscription_plan: Some("starter".into()),
            ..patch(StoreKind::Backend)
        },
    )
    .await
    .unwrap();

    let record = repo
        .patch(
            "principal-1",
            OnboardingPatch {
                payment_verified: Some(true),
                ..patch(StoreKind::Reconciler)
            },
        )
        .await
        .unwrap();

    assert_eq!(
        record.provenance.get(&FactField::SubscriptionPlan),
        Some(&StoreKind::Backend)
    );
    assert_eq!(
        record.provenance.get(&FactField::PaymentVerified),
        Some(&StoreKind::Reconciler)
    );
}

#[tokio::test]
async fn tombstone_marks_without_deleting() {
    let repo = SurrealOnboardingRepository::new(setup().await);
    repo.patch("principal-1", patch(StoreKind::Backend))
        .await
        .unwrap();

    repo.tombstone("principal-1").await.unwrap();

    let record = repo.get("principal-1").await.unwrap().unwrap();
    assert!(record.tombstoned);
}

#[tokio::test]
async fn tombstone_of_missing_record_is_not_found() {
    let repo = SurrealOnboardingRepository::new(setup().await);
    match repo.tombstone("nobody").await {
        Err(StagehandError::NotFound { .. }) => {}
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn drop_server_session_is_idempotent() {
    let db = setup().await;
    let repo = SurrealOnboardingRepository::new(db.clone());

    db.query("CREATE server_session SET principal_id = 'principal-1'")
        .await
        .unwrap()
        .check()
        .unwrap();
    db.query("CREATE server_session SET principal_id = 'principal-1'")
        .await
        .unwrap()
        .check()
        .unwrap();
    db.query("CREATE server_session SET principal_id = 'someone-else'")
        .await
        .unwrap()
        .check()
        .unwrap();

    assert_eq!(repo.drop_server_session("principal-1").await.unwrap(), 2);
    // Second invocation finds nothing to drop, and that is fine.
    assert_eq!(repo.drop_server_session("principal-1").await.unwrap(), 0);
}
