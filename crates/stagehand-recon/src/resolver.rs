//! Reconciliation resolver.
//!
//! Applies precedence and staleness rules across the three candidate
//! views and merges them into one set of facts, emitting a drift list
//! for the stores that are behind.
//!
//! Precedence rules:
//! - `tenant_id`: backend is authoritative once non-null (write-once
//!   invariant). A different non-null value in another source is a
//!   drift event, never an error.
//! - `subscription_plan`: first non-null in backend > session > claims.
//! - booleans: logical OR across trusted sources. A step is done if
//!   *any* trusted source says it is done — re-running a completed
//!   step is merely annoying, blocking a completed user is a
//!   conversion-killing bug.
//! - a session snapshot older than the TTL is ignored entirely.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use stagehand_core::models::onboarding::{FactField, OnboardingFacts, OnboardingView, StoreKind};
use tracing::{debug, warn};

/// One field of one store lagging behind the merged truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftPatch {
    /// The store that is behind.
    pub store: StoreKind,
    pub field: FactField,
    /// The merged (authoritative) value the store should converge to.
    pub value: serde_json::Value,
}

/// Resolver output: the merged facts, the stores that need patch-back,
/// and whether the decision was made without the backend.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub merged: OnboardingFacts,
    pub drift: Vec<DriftPatch>,
    /// True when the backend view was unavailable (not merely absent)
    /// and the merge used claims + session only. Logged for offline
    /// audit; availability is favored over strict consistency.
    pub provisional: bool,
}

impl Resolution {
    pub fn drifted_stores(&self) -> Vec<StoreKind> {
        let mut stores: Vec<StoreKind> = self.drift.iter().map(|d| d.store).collect();
        stores.sort();
        stores.dedup();
        stores
    }
}

/// Merge the three candidate views.
///
/// `backend` is `None` both when the principal has no record (an
/// authoritative answer) and when the backend was unavailable; the two
/// are distinguished by `backend_unavailable`.
pub fn resolve(
    claims: &OnboardingView,
    session: Option<&OnboardingView>,
    backend: Option<&OnboardingView>,
    backend_unavailable: bool,
    now: DateTime<Utc>,
    snapshot_ttl: Duration,
) -> Resolution {
    // A stale snapshot is treated as absent so it cannot mask backend
    // progress beyond the TTL.
    let session = session.filter(|view| match view.observed_at {
        Some(observed) => now.signed_duration_since(observed) <= snapshot_ttl,
        None => false,
    });
    if session.is_none() {
        debug!("session snapshot absent or stale, merging without it");
    }

    let mut merged = OnboardingFacts::default();

    // Tenant id: backend wins once non-null.
    merged.tenant_id = backend
        .and_then(|v| v.facts.tenant_id)
        .or_else(|| session.and_then(|v| v.facts.tenant_id))
        .or(claims.facts.tenant_id);

    if let (Some(authoritative), Some(backend_view)) = (merged.tenant_id, backend) {
        if backend_view.facts.tenant_id == Some(authoritative) {
            for view in [Some(claims), session].into_iter().flatten() {
                if let Some(other) = view.facts.tenant_id {
                    if other != authoritative {
                        warn!(
                            store = ?view.store,
                            backend_tenant = %authoritative,
                            other_tenant = %other,
                            "conflicting non-null tenant ids, backend wins"
                        );
                    }
                }
            }
        }
    }

    // Plan: first non-null by precedence.
    merged.subscription_plan = backend
        .and_then(|v| v.facts.subscription_plan.clone())
        .or_else(|| session.and_then(|v| v.facts.subscription_plan.clone()))
        .or_else(|| claims.facts.subscription_plan.clone());

    // Booleans: OR across trusted sources.
    for view in [backend, session, Some(claims)].into_iter().flatten() {
        merged.payment_verified |= view.facts.payment_verified;
        merged.setup_done |= view.facts.setup_done;
    }

    let mut drift = Vec::new();
    for view in [Some(claims), session, backend].into_iter().flatten() {
        collect_drift(view, &merged, &mut drift);
    }

    Resolution {
        merged,
        drift,
        provisional: backend_unavailable,
    }
}

/// Record every field where `view` disagrees with the merged truth.
fn collect_drift(view: &OnboardingView, merged: &OnboardingFacts, out: &mut Vec<DriftPatch>) {
    if view.facts.tenant_id != merged.tenant_id {
        out.push(DriftPatch {
            store: view.store,
            field: FactField::TenantId,
            value: serde_json::json!(merged.tenant_id),
        });
    }
    if view.facts.subscription_plan != merged.subscription_plan {
        out.push(DriftPatch {
            store: view.store,
            field: FactField::SubscriptionPlan,
            value: serde_json::json!(merged.subscription_plan),
        });
    }
    if view.facts.payment_verified != merged.payment_verified {
        out.push(DriftPatch {
            store: view.store,
            field: FactField::PaymentVerified,
            value: serde_json::json!(merged.payment_verified),
        });
    }
    if view.facts.setup_done != merged.setup_done {
        out.push(DriftPatch {
            store: view.store,
            field: FactField::SetupDone,
            value: serde_json::json!(merged.setup_done),
        });
    }
}

#[cfg(test)]
mod tests {
    use stagehand_core::stage::{Stage, compute_stage};
    use uuid::Uuid;

    use super::*;

    fn view(store: StoreKind, facts: OnboardingFacts, observed_at: Option<DateTime<Utc>>) -> OnboardingView {
        OnboardingView {
            store,
            observed_at,
            facts,
        }
    }

    fn blank_claims() -> OnboardingView {
        view(StoreKind::Claims, OnboardingFacts::default(), None)
    }

    fn ttl() -> Duration {
        Duration::minutes(30)
    }

    #[test]
    fn no_sources_at_all_is_not_started() {
        let claims = blank_claims();
        let resolution = resolve(&claims, None, None, false, Utc::now(), ttl());
        assert!(resolution.merged.is_blank());
        assert!(resolution.drift.is_empty());
        assert!(!resolution.provisional);
        assert_eq!(compute_stage(&resolution.merged), Stage::NotStarted);
    }

    #[test]
    fn stale_session_is_ignored() {
        // Backend: tenant set, no plan. Session claims a plan, but is
        // 40 minutes old against a 30-minute TTL.
        let now = Utc::now();
        let tenant = Uuid::new_v4();
        let backend = view(
            StoreKind::Backend,
            OnboardingFacts {
                tenant_id: Some(tenant),
                ..Default::default()
            },
            Some(now),
        );
        let session = view(
            StoreKind::Session,
            OnboardingFacts {
                tenant_id: Some(tenant),
                subscription_plan: Some("pro".into()),
                ..Default::default()
            },
            Some(now - Duration::minutes(40)),
        );

        let resolution = resolve(&blank_claims(), Some(&session), Some(&backend), false, now, ttl());

        assert_eq!(resolution.merged.subscription_plan, None);
        assert_eq!(compute_stage(&resolution.merged), Stage::Subscription);
    }

    #[test]
    fn fresh_session_boolean_ors_with_backend() {
        // Backend says setup done; a fresh session still claims it is
        // not. OR wins: the completed user stays complete.
        let now = Utc::now();
        let tenant = Uuid::new_v4();
        let done = OnboardingFacts {
            tenant_id: Some(tenant),
            subscription_plan: Some("pro".into()),
            payment_verified: true,
            setup_done: true,
        };
        let backend = view(StoreKind::Backend, done.clone(), Some(now));
        let session = view(
            StoreKind::Session,
            OnboardingFacts {
                setup_done: false,
                ..done.clone()
            },
            Some(now - Duration::minutes(5)),
        );

        let resolution = resolve(&blank_claims(), Some(&session), Some(&backend), false, now, ttl());

        assert!(resolution.merged.setup_done);
        assert_eq!(compute_stage(&resolution.merged), Stage::Complete);
        // The session is the lagging store.
        assert!(resolution
            .drift
            .iter()
            .any(|d| d.store == StoreKind::Session && d.field == FactField::SetupDone));
    }

    #[test]
    fn backend_tenant_id_wins_over_conflicting_claims() {
        let now = Utc::now();
        let backend_tenant = Uuid::new_v4();
        let claims_tenant = Uuid::new_v4();
        let backend = view(
            StoreKind::Backend,
            OnboardingFacts {
                tenant_id: Some(backend_tenant),
                ..Default::default()
            },
            Some(now),
        );
        let claims = view(
            StoreKind::Claims,
            OnboardingFacts {
                tenant_id: Some(claims_tenant),
                ..Default::default()
            },
            None,
        );

        let resolution = resolve(&claims, None, Some(&backend), false, now, ttl());

        assert_eq!(resolution.merged.tenant_id, Some(backend_tenant));
        assert!(resolution
            .drift
            .iter()
            .any(|d| d.store == StoreKind::Claims && d.field == FactField::TenantId));
    }

    #[test]
    fn missing_backend_view_is_provisional() {
        let now = Utc::now();
        let session = view(
            StoreKind::Session,
            OnboardingFacts {
                tenant_id: Some(Uuid::new_v4()),
                subscription_plan: Some("starter".into()),
                ..Default::default()
            },
            Some(now),
        );

        let resolution = resolve(&blank_claims(), Some(&session), None, true, now, ttl());

        assert!(resolution.provisional);
        assert_eq!(compute_stage(&resolution.merged), Stage::Payment);
    }

    #[test]
    fn lagging_backend_is_listed_for_patch_back() {
        // Session knows about a completed payment the backend missed.
        let now = Utc::now();
        let tenant = Uuid::new_v4();
        let backend = view(
            StoreKind::Backend,
            OnboardingFacts {
                tenant_id: Some(tenant),
                subscription_plan: Some("pro".into()),
                ..Default::default()
            },
            Some(now),
        );
        let session = view(
            StoreKind::Session,
            OnboardingFacts {
                tenant_id: Some(tenant),
                subscription_plan: Some("pro".into()),
                payment_verified: true,
                setup_done: false,
            },
            Some(now - Duration::minutes(1)),
        );

        let resolution = resolve(&blank_claims(), Some(&session), Some(&backend), false, now, ttl());

        assert!(resolution.merged.payment_verified);
        assert!(resolution
            .drift
            .iter()
            .any(|d| d.store == StoreKind::Backend && d.field == FactField::PaymentVerified));
        assert!(resolution.drifted_stores().contains(&StoreKind::Backend));
    }
}
