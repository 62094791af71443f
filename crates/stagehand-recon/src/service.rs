//! Reconciliation service — request-time orchestration.
//!
//! Generic over the repository, provisioner, claims-provider and audit
//! traits so the reconciliation layer has no dependency on the
//! database crate.
//!
//! Propagation policy: reconciliation-layer failures (bad artifact,
//! backend timeout) never surface to the caller — the worst outcome is
//! a provisional decision and an extra redirect. Provisioning failures
//! do surface, since proceeding would risk serving a tenant without
//! isolated storage.

use chrono::{DateTime, Utc};
use stagehand_core::error::{StagehandError, StagehandResult};
use stagehand_core::models::audit::{AuditAction, CreateAuditLogEntry};
use stagehand_core::models::onboarding::{
    OnboardingFacts, OnboardingPatch, SessionSnapshot, StoreKind,
};
use stagehand_core::models::principal::Principal;
use stagehand_core::models::tenant::ProvisionStatus;
use stagehand_core::repository::{
    AuditLogRepository, ClaimsProvider, OnboardingRepository, TenantProvisioner,
};
use stagehand_core::stage::{Stage, compute_stage};
use stagehand_session::config::SessionConfig;
use stagehand_session::{artifact, claims};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::ReconConfig;
use crate::resolver::{DriftPatch, resolve};

/// Result of one reconciliation pass, consumed by the redirect gate
/// and the edge middleware.
#[derive(Debug)]
pub struct ReconOutcome {
    pub principal_id: String,
    /// The merged facts used for this request's decision, regardless
    /// of whether patch-back has completed.
    pub facts: OnboardingFacts,
    pub stage: Stage,
    /// Decision made without the backend (timeout or unavailability).
    pub provisional: bool,
    pub drift: Vec<DriftPatch>,
    /// Whether the tenant's isolated storage is ready. Only meaningful
    /// once the stage has reached `Setup`.
    pub tenant_ready: bool,
    /// A fresh artifact for the edge tier to set whenever the session
    /// snapshot was absent, stale or behind the merged facts.
    pub refreshed_artifact: Option<String>,
}

impl ReconOutcome {
    pub fn drift_detected(&self) -> bool {
        !self.drift.is_empty()
    }
}

/// Reconciliation service.
pub struct ReconService<R, P, C, A> {
    repo: R,
    tenants: P,
    claims_provider: C,
    audit: A,
    session: SessionConfig,
    config: ReconConfig,
}

impl<R, P, C, A> ReconService<R, P, C, A>
where
    R: OnboardingRepository + Clone + 'static,
    P: TenantProvisioner,
    C: ClaimsProvider + Clone + 'static,
    A: AuditLogRepository + Clone + 'static,
{
    pub fn new(
        repo: R,
        tenants: P,
        claims_provider: C,
        audit: A,
        session: SessionConfig,
        config: ReconConfig,
    ) -> Self {
        Self {
            repo,
            tenants,
            claims_provider,
            audit,
            session,
            config,
        }
    }

    /// One reconciliation pass for an authenticated request.
    pub async fn reconcile(
        &self,
        principal: &Principal,
        raw_artifact: Option<&str>,
        now: DateTime<Utc>,
    ) -> StagehandResult<ReconOutcome> {
        // 1. Decode the session artifact. Any decode failure means
        //    "no snapshot" — the artifact is a disposable cache.
        let snapshot = raw_artifact
            .and_then(|raw| match artifact::decode_artifact(raw, &self.session) {
                Ok(snapshot) => Some(snapshot),
                Err(err) => {
                    let err = StagehandError::from(err);
                    debug!(error = %err, "session artifact rejected, treating as absent");
                    None
                }
            })
            .filter(|snapshot| {
                // A snapshot minted for another principal carries no
                // information about this one.
                let matches = snapshot.principal_id == principal.subject;
                if !matches {
                    warn!(
                        snapshot_principal = %snapshot.principal_id,
                        "session artifact principal mismatch"
                    );
                }
                matches
            });
        let session_view = snapshot.as_ref().map(|s| s.view());

        // 2. Normalize identity-provider claims.
        let claims_view = claims::normalize_claims(&principal.claims).into_view();

        // 3. Backend lookup, bounded by a short timeout. Unavailability
        //    is not an error here: the decision proceeds provisionally.
        let timeout = std::time::Duration::from_millis(self.config.backend_timeout_ms);
        let lookup = match tokio::time::timeout(timeout, self.repo.get(&principal.subject)).await {
            Ok(result) => result,
            Err(_) => Err(StagehandError::BackendUnavailable {
                reason: format!(
                    "lookup timed out after {}ms",
                    self.config.backend_timeout_ms
                ),
            }),
        };
        let (record, backend_unavailable) = match lookup {
            Ok(record) => (record, false),
            Err(err) => {
                warn!(error = %err, "backend lookup failed, proceeding provisionally");
                (None, true)
            }
        };
        let backend_view = record.as_ref().map(|r| r.view());

        // 4. Merge the three candidate views.
        let resolution = resolve(
            &claims_view,
            session_view.as_ref(),
            backend_view.as_ref(),
            backend_unavailable,
            now,
            chrono::Duration::seconds(self.session.snapshot_ttl_secs as i64),
        );
        let merged = resolution.merged.clone();

        // 5. Derive the canonical stage.
        let stage = compute_stage(&merged);

        // 6. Provision tenant storage once the facts support Setup.
        //    Idempotent at the data layer, so no in-process "already
        //    ran" guard is needed; skipped on provisional decisions
        //    because storage is likely degraded too.
        let mut tenant_ready = false;
        if stage >= Stage::Setup && !resolution.provisional {
            if let Some(tenant_id) = merged.tenant_id {
                let status = self
                    .provision_with_backoff(tenant_id, &principal.subject)
                    .await?;
                tenant_ready = status.storage_ready;
                if status.created {
                    let audit = self.audit.clone();
                    let entry = CreateAuditLogEntry {
                        actor: principal.subject.clone(),
                        action: AuditAction::TenantProvisioned,
                        tenant_id: Some(tenant_id),
                        metadata: serde_json::json!({}),
                    };
                    tokio::spawn(async move {
                        if let Err(err) = audit.append(entry).await {
                            warn!(error = %err, "failed to record tenant provisioning");
                        }
                    });
                }
            }
        }

        // 7. Re-issue the artifact whenever the session was absent,
        //    stale or behind. Synchronous — the caller persists it as
        //    a cookie on this response.
        let session_current = snapshot
            .as_ref()
            .is_some_and(|s| s.facts == merged && now.signed_duration_since(s.issued_at).num_seconds() <= self.session.snapshot_ttl_secs as i64);
        let refreshed_artifact = if session_current {
            None
        } else {
            match artifact::encode_artifact(
                &SessionSnapshot {
                    principal_id: principal.subject.clone(),
                    facts: merged.clone(),
                    issued_at: now,
                },
                &self.session,
            ) {
                Ok(raw) => Some(raw),
                Err(err) => {
                    // Never user-facing: the old (or no) artifact
                    // simply stays in place.
                    warn!(error = %err, "artifact re-issue failed");
                    None
                }
            }
        };

        // 8. Detached patch-back for lagging stores. Fire-and-forget:
        //    it repairs shared state other requests depend on, so it
        //    is not scoped to this request's lifetime.
        if !resolution.drift.is_empty() {
            self.spawn_patch_back(
                principal.subject.clone(),
                merged.clone(),
                resolution.drift.clone(),
                backend_unavailable,
            );
        }

        // 9. Provisional decisions are recorded for offline audit.
        if resolution.provisional {
            let audit = self.audit.clone();
            let actor = principal.subject.clone();
            let tenant_id = merged.tenant_id;
            tokio::spawn(async move {
                let entry = CreateAuditLogEntry {
                    actor,
                    action: AuditAction::ProvisionalDecision,
                    tenant_id,
                    metadata: serde_json::json!({}),
                };
                if let Err(err) = audit.append(entry).await {
                    warn!(error = %err, "failed to record provisional decision");
                }
            });
        }

        Ok(ReconOutcome {
            principal_id: principal.subject.clone(),
            facts: merged,
            stage,
            provisional: resolution.provisional,
            drift: resolution.drift,
            tenant_ready,
            refreshed_artifact,
        })
    }

    /// Retry transient provisioning failures with bounded exponential
    /// backoff. `TenantIdConflict` is fatal and never retried.
    async fn provision_with_backoff(
        &self,
        tenant_id: Uuid,
        owner: &str,
    ) -> StagehandResult<ProvisionStatus> {
        let mut backoff_ms = self.config.provision_initial_backoff_ms;
        let mut attempt = 1u32;
        loop {
            match self.tenants.ensure_tenant(tenant_id, owner).await {
                Ok(status) => return Ok(status),
                Err(err @ StagehandError::StorageUnavailable { .. })
                    if attempt < self.config.provision_attempts =>
                {
                    warn!(
                        %tenant_id,
                        attempt,
                        backoff_ms,
                        error = %err,
                        "provisioning failed, retrying"
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(backoff_ms)).await;
                    backoff_ms =
                        (backoff_ms as f64 * self.config.provision_backoff_multiplier) as u64;
                    attempt += 1;
                }
                Err(err @ StagehandError::TenantIdConflict { .. }) => {
                    let audit = self.audit.clone();
                    let entry = CreateAuditLogEntry {
                        actor: owner.to_string(),
                        action: AuditAction::TenantIdConflict,
                        tenant_id: Some(tenant_id),
                        metadata: serde_json::json!({ "error": err.to_string() }),
                    };
                    tokio::spawn(async move {
                        if let Err(audit_err) = audit.append(entry).await {
                            warn!(error = %audit_err, "failed to record tenant conflict");
                        }
                    });
                    return Err(err);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Repair the lagging stores. Detached from the request: runs to
    /// completion even if the originating request is cancelled.
    fn spawn_patch_back(
        &self,
        principal_id: String,
        merged: OnboardingFacts,
        drift: Vec<DriftPatch>,
        backend_unavailable: bool,
    ) {
        let repo = self.repo.clone();
        let provider = self.claims_provider.clone();
        let audit = self.audit.clone();

        tokio::spawn(async move {
            let stores: Vec<StoreKind> = {
                let mut stores: Vec<StoreKind> = drift.iter().map(|d| d.store).collect();
                stores.sort();
                stores.dedup();
                stores
            };

            let entry = CreateAuditLogEntry {
                actor: principal_id.clone(),
                action: AuditAction::DriftDetected,
                tenant_id: merged.tenant_id,
                metadata: serde_json::json!({ "drift": drift }),
            };
            if let Err(err) = audit.append(entry).await {
                warn!(error = %err, "failed to record drift event");
            }

            // Backend patch-back: idempotent partial update; safe to
            // apply twice. Skipped while the backend is unavailable —
            // the next pass will find the same drift.
            if stores.contains(&StoreKind::Backend) && !backend_unavailable {
                let patch = OnboardingPatch::from_facts(&merged, StoreKind::Reconciler);
                if let Err(err) = repo.patch(&principal_id, patch).await {
                    warn!(error = %err, "backend patch-back failed");
                }
            }

            // Identity-provider patch-back: the explicit, audited
            // write path. Primary fields are never touched.
            if stores.contains(&StoreKind::Claims) {
                match provider
                    .patch_claims(&principal_id, claims::canonical_claims(&merged))
                    .await
                {
                    Ok(()) => {
                        let entry = CreateAuditLogEntry {
                            actor: principal_id.clone(),
                            action: AuditAction::ClaimsPatched,
                            tenant_id: merged.tenant_id,
                            metadata: serde_json::json!({}),
                        };
                        if let Err(err) = audit.append(entry).await {
                            warn!(error = %err, "failed to record claims patch");
                        }
                    }
                    Err(err) => warn!(error = %err, "claims patch-back failed"),
                }
            }
        });
    }
}
