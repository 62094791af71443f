//! Repository and provider trait definitions for data access
//! abstraction.
//!
//! All operations are async. The reconciliation layer is generic over
//! these traits so it carries no dependency on the database crate or
//! on any concrete identity provider.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::error::StagehandResult;
use crate::models::{
    audit::{AuditLogEntry, CreateAuditLogEntry},
    onboarding::{OnboardingPatch, OnboardingRecord},
    tenant::{ProvisionStatus, Tenant},
};

/// Backend system-of-record for onboarding state.
pub trait OnboardingRepository: Send + Sync {
    /// Fetch the record for a principal; `Ok(None)` means the
    /// principal has never started onboarding (a valid state, distinct
    /// from the backend being unavailable).
    fn get(
        &self,
        principal_id: &str,
    ) -> impl Future<Output = StagehandResult<Option<OnboardingRecord>>> + Send;

    /// Create the record at first sign-up, or replace the stored facts
    /// wholesale. Write-once `tenant_id` is still enforced.
    fn upsert(
        &self,
        record: OnboardingRecord,
    ) -> impl Future<Output = StagehandResult<OnboardingRecord>> + Send;

    /// Idempotent partial update, used by reconciliation patch-back.
    /// A non-null stored `tenant_id` is never overwritten; a
    /// conflicting patch value is dropped and logged, not an error.
    fn patch(
        &self,
        principal_id: &str,
        patch: OnboardingPatch,
    ) -> impl Future<Output = StagehandResult<OnboardingRecord>> + Send;

    /// Mark the record tombstoned on account closure. History is never
    /// physically deleted.
    fn tombstone(
        &self,
        principal_id: &str,
    ) -> impl Future<Output = StagehandResult<()>> + Send;

    /// Drop any server-side session state for the principal.
    /// Best-effort target of sign-out; idempotent.
    fn drop_server_session(
        &self,
        principal_id: &str,
    ) -> impl Future<Output = StagehandResult<u64>> + Send;
}

/// Idempotent, concurrency-safe tenant provisioning.
pub trait TenantProvisioner: Send + Sync {
    /// Ensure the tenant and all of its isolated storage objects
    /// exist. Calling N ≥ 1 times (including concurrently) performs at
    /// most one physical creation; every caller that does not conflict
    /// on ownership observes success.
    ///
    /// Returns whether this call performed the creation and whether
    /// the tenant's storage is ready. Fails with `TenantIdConflict`
    /// when the id is owned by a different principal (fatal) or
    /// `StorageUnavailable` on transient failure (retried with backoff
    /// by the caller).
    fn ensure_tenant(
        &self,
        tenant_id: Uuid,
        owner_principal_id: &str,
    ) -> impl Future<Output = StagehandResult<ProvisionStatus>> + Send;

    fn get_tenant(
        &self,
        tenant_id: Uuid,
    ) -> impl Future<Output = StagehandResult<Tenant>> + Send;

    /// Mark a tenant inactive on account closure. The row is kept.
    fn deactivate(
        &self,
        tenant_id: Uuid,
    ) -> impl Future<Output = StagehandResult<()>> + Send;
}

/// Append-only audit log.
pub trait AuditLogRepository: Send + Sync {
    /// Append a new entry. No update or delete operations exist.
    fn append(
        &self,
        input: CreateAuditLogEntry,
    ) -> impl Future<Output = StagehandResult<AuditLogEntry>> + Send;

    fn list_recent(
        &self,
        tenant_id: Uuid,
        limit: u64,
    ) -> impl Future<Output = StagehandResult<Vec<AuditLogEntry>>> + Send;
}

/// The identity-provider attribute boundary.
///
/// Reads are consumed by the claims normalizer. `patch_claims` is the
/// only write path to the provider and every call is audited by the
/// reconciliation service.
pub trait ClaimsProvider: Send + Sync {
    fn get_claims(
        &self,
        subject: &str,
    ) -> impl Future<Output = StagehandResult<BTreeMap<String, String>>> + Send;

    fn patch_claims(
        &self,
        subject: &str,
        claims: BTreeMap<String, String>,
    ) -> impl Future<Output = StagehandResult<()>> + Send;
}
