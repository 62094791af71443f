//! Error types for the STAGEHAND system.
//!
//! Drift is deliberately absent here: disagreement between stores is
//! not an error, it is resolver output that gets logged and patched
//! asynchronously.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StagehandError {
    /// Session artifact failed signature or payload verification.
    /// Callers must treat this as "no snapshot", never as a user-facing
    /// failure.
    #[error("invalid session artifact: {0}")]
    InvalidArtifact(String),

    /// Backend system-of-record unreachable or timed out. Transient;
    /// reconciliation proceeds provisionally on claims + session.
    #[error("backend unavailable: {reason}")]
    BackendUnavailable { reason: String },

    /// Tenant id already owned by a different principal. Fatal, never
    /// retried automatically; surfaced to an operator path.
    #[error("tenant {tenant_id} is owned by {owner}, not {claimant}")]
    TenantIdConflict {
        tenant_id: Uuid,
        owner: String,
        claimant: String,
    },

    /// Transient storage failure during provisioning. Retried with
    /// bounded exponential backoff by the caller.
    #[error("storage unavailable: {reason}")]
    StorageUnavailable { reason: String },

    #[error("entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("database error: {0}")]
    Database(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl StagehandError {
    /// Whether the error is transient and safe to retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StagehandError::BackendUnavailable { .. } | StagehandError::StorageUnavailable { .. }
        )
    }
}

pub type StagehandResult<T> = Result<T, StagehandError>;
