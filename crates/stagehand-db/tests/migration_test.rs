//! Migration runner tests using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::Mem;

#[tokio::test]
async fn migrations_run_cleanly_on_a_fresh_database() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    stagehand_db::run_migrations(&db).await.unwrap();

    // Every table from the initial schema is queryable.
    for table in ["onboarding", "tenant", "tenant_store", "server_session", "audit_log"] {
        db.query(format!("SELECT * FROM {table}"))
            .await
            .unwrap()
            .check()
            .unwrap();
    }
}

#[tokio::test]
async fn rerunning_migrations_is_a_noop() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    stagehand_db::run_migrations(&db).await.unwrap();
    stagehand_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("SELECT * FROM _migration").await.unwrap();
    let rows: Vec<surrealdb_types::Value> = result.take(0).unwrap();
    assert_eq!(rows.len(), 1);
}
