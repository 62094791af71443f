//! Session invalidation — sign-out and account closure.

use stagehand_core::error::StagehandResult;
use stagehand_core::models::audit::{AuditAction, CreateAuditLogEntry};
use stagehand_core::repository::{AuditLogRepository, OnboardingRepository, TenantProvisioner};
use stagehand_session::artifact::CLEARED_ARTIFACT;
use tracing::{info, warn};
use uuid::Uuid;

/// Clears the three stores consistently on sign-out and tenant
/// closure. Never mutates onboarding facts on sign-out, and never
/// physically deletes anything on closure.
pub struct SessionInvalidator<R, P, A> {
    repo: R,
    tenants: P,
    audit: A,
}

impl<R, P, A> SessionInvalidator<R, P, A>
where
    R: OnboardingRepository + Clone + 'static,
    P: TenantProvisioner,
    A: AuditLogRepository,
{
    pub fn new(repo: R, tenants: P, audit: A) -> Self {
        Self {
            repo,
            tenants,
            audit,
        }
    }

    /// Sign the principal out.
    ///
    /// Returns the cookie value that clears the session artifact. The
    /// backend session drop is best-effort and detached — a failure
    /// there never blocks or fails the sign-out itself.
    pub fn sign_out(&self, principal_id: &str) -> &'static str {
        let repo = self.repo.clone();
        let principal_id = principal_id.to_string();
        tokio::spawn(async move {
            match repo.drop_server_session(&principal_id).await {
                Ok(dropped) => {
                    info!(principal = %principal_id, dropped, "server-side sessions dropped");
                }
                Err(err) => {
                    warn!(principal = %principal_id, error = %err, "server session drop failed");
                }
            }
        });
        CLEARED_ARTIFACT
    }

    /// Close the account: deactivate the tenant and tombstone the
    /// onboarding record. History is kept — the audit trail requires
    /// it.
    pub async fn close_account(
        &self,
        principal_id: &str,
        tenant_id: Uuid,
    ) -> StagehandResult<()> {
        self.tenants.deactivate(tenant_id).await?;
        self.audit
            .append(CreateAuditLogEntry {
                actor: principal_id.to_string(),
                action: AuditAction::TenantDeactivated,
                tenant_id: Some(tenant_id),
                metadata: serde_json::json!({}),
            })
            .await?;

        self.repo.tombstone(principal_id).await?;
        self.audit
            .append(CreateAuditLogEntry {
                actor: principal_id.to_string(),
                action: AuditAction::RecordTombstoned,
                tenant_id: Some(tenant_id),
                metadata: serde_json::json!({}),
            })
            .await?;

        // The artifact itself is cleared by the caller with the
        // sign-out path; nothing else to do here.
        Ok(())
    }
}
