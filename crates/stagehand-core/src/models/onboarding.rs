//! Onboarding domain model.
//!
//! The backend-owned [`OnboardingRecord`] stores *facts only* — the
//! stage is always re-derived by [`crate::stage::compute_stage`] and
//! never persisted, so stored state can never disagree with the
//! booleans it is derived from.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which store a value was observed in (or last written by).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StoreKind {
    /// Identity-provider custom attributes.
    Claims,
    /// Signed session artifact held by the edge tier.
    Session,
    /// Backend system-of-record.
    Backend,
    /// Explicit administrative action.
    Admin,
    /// Reconciliation patch-back acting on merged sources.
    #[default]
    Reconciler,
}

/// The logical onboarding fields subject to reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FactField {
    TenantId,
    SubscriptionPlan,
    PaymentVerified,
    SetupDone,
}

/// The four facts the canonical stage is derived from.
///
/// `tenant_id` is write-once: once non-null in the backend it is never
/// reassigned (enforced at the repository layer).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingFacts {
    pub tenant_id: Option<Uuid>,
    pub subscription_plan: Option<String>,
    pub payment_verified: bool,
    pub setup_done: bool,
}

impl OnboardingFacts {
    /// True when no onboarding activity has been observed at all.
    pub fn is_blank(&self) -> bool {
        self.tenant_id.is_none()
            && self.subscription_plan.is_none()
            && !self.payment_verified
            && !self.setup_done
    }
}

/// Canonical business state for one principal, owned by the backend
/// system-of-record. Never deleted — account closure sets `tombstoned`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingRecord {
    pub principal_id: String,
    pub facts: OnboardingFacts,
    pub tombstoned: bool,
    /// Which store last wrote each fact.
    pub provenance: BTreeMap<FactField, StoreKind>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OnboardingRecord {
    pub fn view(&self) -> OnboardingView {
        OnboardingView {
            store: StoreKind::Backend,
            observed_at: Some(self.updated_at),
            facts: self.facts.clone(),
        }
    }
}

/// One source's candidate view of the onboarding facts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingView {
    pub store: StoreKind,
    /// When the source produced this view, if it is time-stamped.
    pub observed_at: Option<DateTime<Utc>>,
    pub facts: OnboardingFacts,
}

/// Idempotent partial update applied to an [`OnboardingRecord`].
///
/// `None` fields are left untouched; applying the same patch twice is
/// a no-op the second time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OnboardingPatch {
    pub tenant_id: Option<Uuid>,
    pub subscription_plan: Option<String>,
    pub payment_verified: Option<bool>,
    pub setup_done: Option<bool>,
    /// Provenance recorded for every field this patch sets.
    pub source: StoreKind,
}

impl OnboardingPatch {
    /// A patch that brings a lagging backend record up to the merged
    /// facts. Booleans are only patched upward ("has completed step"
    /// is never un-set by reconciliation).
    pub fn from_facts(facts: &OnboardingFacts, source: StoreKind) -> Self {
        Self {
            tenant_id: facts.tenant_id,
            subscription_plan: facts.subscription_plan.clone(),
            payment_verified: facts.payment_verified.then_some(true),
            setup_done: facts.setup_done.then_some(true),
            source,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tenant_id.is_none()
            && self.subscription_plan.is_none()
            && self.payment_verified.is_none()
            && self.setup_done.is_none()
    }
}

/// A denormalized, time-stamped copy of the onboarding facts carried
/// inside the signed session artifact.
///
/// Explicitly allowed to be stale; never treated as source of truth
/// for `tenant_id` once a backend value exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub principal_id: String,
    pub facts: OnboardingFacts,
    pub issued_at: DateTime<Utc>,
}

impl SessionSnapshot {
    pub fn view(&self) -> OnboardingView {
        OnboardingView {
            store: StoreKind::Session,
            observed_at: Some(self.issued_at),
            facts: self.facts.clone(),
        }
    }
}
