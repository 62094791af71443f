//! Audit log domain model (append-only).
//!
//! Drift events, provisioning outcomes, tombstones and identity-
//! provider patch-backs are all recorded here. Entries are never
//! updated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    DriftDetected,
    TenantProvisioned,
    TenantIdConflict,
    TenantDeactivated,
    RecordTombstoned,
    ClaimsPatched,
    ProvisionalDecision,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    /// Principal or system component that caused the entry.
    pub actor: String,
    pub action: AuditAction,
    pub tenant_id: Option<Uuid>,
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuditLogEntry {
    pub actor: String,
    pub action: AuditAction,
    pub tenant_id: Option<Uuid>,
    pub metadata: serde_json::Value,
}
