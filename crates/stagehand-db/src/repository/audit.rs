//! SurrealDB implementation of [`AuditLogRepository`] (append-only).

use chrono::{DateTime, Utc};
use stagehand_core::error::StagehandResult;
use stagehand_core::models::audit::{AuditAction, AuditLogEntry, CreateAuditLogEntry};
use stagehand_core::repository::AuditLogRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct AuditRow {
    actor: String,
    action: String,
    tenant_id: Option<String>,
    metadata: serde_json::Value,
    timestamp: DateTime<Utc>,
}

/// Row struct that includes the record id via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct AuditRowWithId {
    record_id: String,
    actor: String,
    action: String,
    tenant_id: Option<String>,
    metadata: serde_json::Value,
    timestamp: DateTime<Utc>,
}

fn action_to_str(action: &AuditAction) -> &'static str {
    match action {
        AuditAction::DriftDetected => "DriftDetected",
        AuditAction::TenantProvisioned => "TenantProvisioned",
        AuditAction::TenantIdConflict => "TenantIdConflict",
        AuditAction::TenantDeactivated => "TenantDeactivated",
        AuditAction::RecordTombstoned => "RecordTombstoned",
        AuditAction::ClaimsPatched => "ClaimsPatched",
        AuditAction::ProvisionalDecision => "ProvisionalDecision",
    }
}

fn action_from_str(raw: &str) -> Result<AuditAction, DbError> {
    match raw {
        "DriftDetected" => Ok(AuditAction::DriftDetected),
        "TenantProvisioned" => Ok(AuditAction::TenantProvisioned),
        "TenantIdConflict" => Ok(AuditAction::TenantIdConflict),
        "TenantDeactivated" => Ok(AuditAction::TenantDeactivated),
        "RecordTombstoned" => Ok(AuditAction::RecordTombstoned),
        "ClaimsPatched" => Ok(AuditAction::ClaimsPatched),
        "ProvisionalDecision" => Ok(AuditAction::ProvisionalDecision),
        other => Err(DbError::Migration(format!("unknown audit action: {other}"))),
    }
}

fn row_to_entry(
    id: Uuid,
    actor: String,
    action: String,
    tenant_id: Option<String>,
    metadata: serde_json::Value,
    timestamp: DateTime<Utc>,
) -> Result<AuditLogEntry, DbError> {
    let tenant_id = match tenant_id {
        Some(raw) => Some(
            Uuid::parse_str(&raw)
                .map_err(|e| DbError::Migration(format!("invalid tenant UUID: {e}")))?,
        ),
        None => None,
    };
    Ok(AuditLogEntry {
        id,
        actor,
        action: action_from_str(&action)?,
        tenant_id,
        metadata,
        timestamp,
    })
}

/// SurrealDB implementation of the audit log repository.
#[derive(Clone)]
pub struct SurrealAuditLogRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAuditLogRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AuditLogRepository for SurrealAuditLogRepository<C> {
    async fn append(&self, input: CreateAuditLogEntry) -> StagehandResult<AuditLogEntry> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('audit_log', $id) SET \
                 actor = $actor, \
                 action = $action, \
                 tenant_id = $tenant_id, \
                 metadata = $metadata",
            )
            .bind(("id", id_str.clone()))
            .bind(("actor", input.actor))
            .bind(("action", action_to_str(&input.action).to_string()))
            .bind(("tenant_id", input.tenant_id.map(|t| t.to_string())))
            .bind(("metadata", input.metadata))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<AuditRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "audit_log".into(),
            id: id_str,
        })?;

        Ok(row_to_entry(
            id,
            row.actor,
            row.action,
            row.tenant_id,
            row.metadata,
            row.timestamp,
        )?)
    }

    async fn list_recent(&self, tenant_id: Uuid, limit: u64) -> StagehandResult<Vec<AuditLogEntry>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * \
                 FROM audit_log \
                 WHERE tenant_id = $tenant_id \
                 ORDER BY timestamp DESC \
                 LIMIT $limit",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("limit", limit))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AuditRowWithId> = result.take(0).map_err(DbError::from)?;

        let entries = rows
            .into_iter()
            .map(|row| {
                let id = Uuid::parse_str(&row.record_id)
                    .map_err(|e| DbError::Migration(format!("invalid UUID: {e}")))?;
                row_to_entry(id, row.actor, row.action, row.tenant_id, row.metadata, row.timestamp)
            })
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(entries)
    }
}
