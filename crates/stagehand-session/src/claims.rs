//! Identity-provider claims normalization.
//!
//! The provider's custom attributes accumulated several historical key
//! variants for the same logical field. Each alias chain below is a
//! single declarative table, highest priority first — first non-empty
//! value wins. Unknown or malformed claims are ignored, never an
//! error: absence of a claim is a valid state (onboarding not
//! started).

use std::collections::BTreeMap;

use stagehand_core::models::onboarding::{OnboardingFacts, OnboardingView, StoreKind};
use uuid::Uuid;

/// Alias priority for the tenant id. `custom:tenant_id` is the current
/// key; the other two were written by earlier sign-up flows.
const TENANT_ID_ALIASES: &[&str] = &["custom:tenant_id", "custom:tenantId", "tenant_id"];

/// Alias priority for the subscription plan.
const PLAN_ALIASES: &[&str] = &["custom:subscription_plan", "custom:plan"];

/// Alias priority for payment verification.
const PAYMENT_ALIASES: &[&str] = &["custom:payment_verified", "custom:payment_status"];

/// Alias priority for setup completion.
const SETUP_ALIASES: &[&str] = &["custom:setup_done", "custom:setup_complete"];

/// Normalized view over the provider's attributes: one field per
/// logical concept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedClaims {
    pub tenant_id: Option<Uuid>,
    pub subscription_plan: Option<String>,
    pub payment_verified: bool,
    pub setup_done: bool,
}

impl NormalizedClaims {
    pub fn into_view(self) -> OnboardingView {
        OnboardingView {
            store: StoreKind::Claims,
            observed_at: None,
            facts: OnboardingFacts {
                tenant_id: self.tenant_id,
                subscription_plan: self.subscription_plan,
                payment_verified: self.payment_verified,
                setup_done: self.setup_done,
            },
        }
    }
}

/// Map a raw claim set to the normalized struct. Infallible by design.
pub fn normalize_claims(raw: &BTreeMap<String, String>) -> NormalizedClaims {
    NormalizedClaims {
        tenant_id: first_nonempty(raw, TENANT_ID_ALIASES)
            .and_then(|v| Uuid::parse_str(v).ok()),
        subscription_plan: first_nonempty(raw, PLAN_ALIASES).map(str::to_owned),
        payment_verified: first_nonempty(raw, PAYMENT_ALIASES)
            .map(parse_flag)
            .unwrap_or(false),
        setup_done: first_nonempty(raw, SETUP_ALIASES)
            .map(parse_flag)
            .unwrap_or(false),
    }
}

/// The canonical (highest-priority) spelling of each logical field,
/// used when patching lagging identity-provider attributes. Only
/// affirmative values are written: patch-back never clears a claim.
pub fn canonical_claims(facts: &OnboardingFacts) -> BTreeMap<String, String> {
    let mut claims = BTreeMap::new();
    if let Some(tenant_id) = facts.tenant_id {
        claims.insert(TENANT_ID_ALIASES[0].to_string(), tenant_id.to_string());
    }
    if let Some(plan) = &facts.subscription_plan {
        claims.insert(PLAN_ALIASES[0].to_string(), plan.clone());
    }
    if facts.payment_verified {
        claims.insert(PAYMENT_ALIASES[0].to_string(), "true".to_string());
    }
    if facts.setup_done {
        claims.insert(SETUP_ALIASES[0].to_string(), "true".to_string());
    }
    claims
}

fn first_nonempty<'a>(raw: &'a BTreeMap<String, String>, aliases: &[&str]) -> Option<&'a str> {
    aliases
        .iter()
        .filter_map(|key| raw.get(*key))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
}

/// Historical flows wrote booleans in several spellings; anything not
/// recognized as affirmative reads as false.
fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "verified" | "paid" | "complete" | "done"
    )
}
