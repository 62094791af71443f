//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs are stored as strings. Every tenant-scoped table carries a
//! `tenant_id` field and the row-level isolation PERMISSIONS predicate
//! (`tenant_id = $auth.tenant_id OR $auth.is_admin = true`) — that
//! predicate is the only enforcement boundary between tenants, and a
//! table without it does not count as provisioned.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

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
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1 — initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Onboarding records (backend system-of-record, one per principal)
--
-- Facts only: the stage is always derived, never stored, so it can
-- never disagree with the booleans it summarizes. Records are never
-- deleted; account closure sets `tombstoned`.
-- =======================================================================
DEFINE TABLE onboarding SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE onboarding TYPE option<string>;
DEFINE FIELD subscription_plan ON TABLE onboarding TYPE option<string>;
DEFINE FIELD payment_verified ON TABLE onboarding TYPE bool \
    DEFAULT false;
DEFINE FIELD setup_done ON TABLE onboarding TYPE bool DEFAULT false;
DEFINE FIELD tombstoned ON TABLE onboarding TYPE bool DEFAULT false;
DEFINE FIELD provenance ON TABLE onboarding TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD created_at ON TABLE onboarding TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE onboarding TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_onboarding_tenant ON TABLE onboarding \
    COLUMNS tenant_id;

-- =======================================================================
-- Tenants (unit of isolation; the record id doubles as the unique
-- constraint that serializes concurrent provisioning)
-- =======================================================================
DEFINE TABLE tenant SCHEMAFULL
    PERMISSIONS
        FOR select, update
            WHERE meta::id(id) = $auth.tenant_id \
                OR $auth.is_admin = true
        FOR delete NONE;
DEFINE FIELD owner_principal_id ON TABLE tenant TYPE string;
DEFINE FIELD is_active ON TABLE tenant TYPE bool DEFAULT true;
DEFINE FIELD storage_ready ON TABLE tenant TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();

-- =======================================================================
-- Tenant-scoped storage objects, created transactionally during
-- provisioning. The PERMISSIONS predicate is the isolation boundary.
-- =======================================================================
DEFINE TABLE tenant_store SCHEMAFULL
    PERMISSIONS
        FOR select, create, update, delete
            WHERE tenant_id = $auth.tenant_id \
                OR $auth.is_admin = true;
DEFINE FIELD tenant_id ON TABLE tenant_store TYPE string;
DEFINE FIELD name ON TABLE tenant_store TYPE string;
DEFINE FIELD created_at ON TABLE tenant_store TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_tenant_store_name ON TABLE tenant_store \
    COLUMNS tenant_id, name UNIQUE;

-- =======================================================================
-- Server-side session records (best-effort sign-out target)
-- =======================================================================
DEFINE TABLE server_session SCHEMAFULL;
DEFINE FIELD principal_id ON TABLE server_session TYPE string;
DEFINE FIELD created_at ON TABLE server_session TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_server_session_principal ON TABLE server_session \
    COLUMNS principal_id;

-- =======================================================================
-- Audit Log (append-only)
-- =======================================================================
DEFINE TABLE audit_log SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update NONE
        FOR delete NONE;
DEFINE FIELD actor ON TABLE audit_log TYPE string;
DEFINE FIELD action ON TABLE audit_log TYPE string \
    ASSERT $value IN ['DriftDetected', 'TenantProvisioned', \
    'TenantIdConflict', 'TenantDeactivated', 'RecordTombstoned', \
    'ClaimsPatched', 'ProvisionalDecision'];
DEFINE FIELD tenant_id ON TABLE audit_log TYPE option<string>;
DEFINE FIELD metadata ON TABLE audit_log TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD timestamp ON TABLE audit_log TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_audit_tenant_time ON TABLE audit_log \
    COLUMNS tenant_id, timestamp;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
/// All DEFINE statements are idempotent so re-running is safe.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    // Ensure migration tracking table exists (idempotent).
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    // Determine current schema version.
    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            db.query(migration.sql).await?.check().map_err(|e| {
                DbError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

            // Record the applied migration.
            db.query(
                "CREATE _migration SET version = $version, \
                 name = $name",
            )
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

            info!(
                version = migration.version,
                "Migration applied successfully"
            );
        }
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
///
/// Exposed for testing with in-memory SurrealDB instances that
/// bypass the migration runner.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
