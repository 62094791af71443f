//! The onboarding stage machine.
//!
//! The stage is a pure derivation over the four reconciled facts and
//! is never stored. Historically the stage was persisted as a string
//! alongside the booleans it was supposed to summarize, and the two
//! drifted apart; deriving it on every request removes that entire
//! class of defect.

use serde::{Deserialize, Serialize};

use crate::models::onboarding::OnboardingFacts;

/// Canonical onboarding step, strictly ordered.
///
/// Ordering matters: the resolver and gate compare stages with `<`/`>`
/// and reconciliation may never move a principal backward — only an
/// explicit administrative reset can lower the facts a stage is
/// derived from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Stage {
    NotStarted,
    BusinessInfo,
    Subscription,
    Payment,
    Setup,
    Complete,
}

impl Stage {
    /// All stages in ascending order.
    pub const ALL: [Stage; 6] = [
        Stage::NotStarted,
        Stage::BusinessInfo,
        Stage::Subscription,
        Stage::Payment,
        Stage::Setup,
        Stage::Complete,
    ];
}

/// Derive the canonical stage from the facts.
///
/// The derivation never advances past the first unmet precondition,
/// so internally contradictory facts (e.g. `setup_done = true` with no
/// tenant id) resolve to the weakest stage the facts support. This
/// guards both failure modes at once: a completed user is never pushed
/// back into onboarding by a single lagging flag (the flags are OR-ed
/// upstream), and a half-onboarded user is never waved through on the
/// strength of one stray "done" marker.
pub fn compute_stage(facts: &OnboardingFacts) -> Stage {
    if facts.tenant_id.is_none() {
        return if facts.is_blank() {
            Stage::NotStarted
        } else {
            // Some activity exists but no tenant yet: business info is
            // the first step that produces one.
            Stage::BusinessInfo
        };
    }
    if facts.subscription_plan.is_none() {
        return Stage::Subscription;
    }
    if !facts.payment_verified {
        return Stage::Payment;
    }
    if !facts.setup_done {
        return Stage::Setup;
    }
    Stage::Complete
}
