//! STAGEHAND Server — application entry point.

use stagehand_db::{DbConfig, DbManager};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("stagehand=info".parse().unwrap()),
        )
        .json()
        .init();

    tracing::info!("Starting STAGEHAND server...");

    let db_config = DbConfig::from_env();
    match DbManager::connect(&db_config).await {
        Ok(manager) => {
            if let Err(err) = stagehand_db::run_migrations(manager.client()).await {
                tracing::error!(error = %err, "migration run failed");
                return;
            }
            tracing::info!("Database ready");
        }
        Err(err) => {
            tracing::error!(error = %err, "database connection failed");
            return;
        }
    }

    // TODO: wire the edge middleware (RedirectGate + ReconService)
    //       once the HTTP tier lands.

    tracing::info!("STAGEHAND server stopped.");
}
