//! Redirect gate.
//!
//! Request-time decision function consumed by the edge middleware:
//! given the reconciled facts and the current request path, decide
//! whether to pass the request through, send the principal to their
//! next onboarding step, or send a completed principal home.
//!
//! Liveness outranks correctness here: a request that already carries
//! the redirect marker for the same target is always allowed, so no
//! sequence of disagreeing upstream signals can produce an infinite
//! redirect loop.

use serde::{Deserialize, Serialize};
use stagehand_core::models::onboarding::OnboardingFacts;
use stagehand_core::stage::{Stage, compute_stage};
use uuid::Uuid;

/// Where a redirect pointed. Carried back by the client as a request
/// marker (`redirected=<slug>`) on the follow-up request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RedirectTarget {
    Stage(Stage),
    Home,
}

impl RedirectTarget {
    /// The marker value encoded into the redirect query string.
    pub fn marker(&self) -> &'static str {
        match self {
            RedirectTarget::Stage(Stage::NotStarted) | RedirectTarget::Stage(Stage::BusinessInfo) => {
                "business-info"
            }
            RedirectTarget::Stage(Stage::Subscription) => "subscription",
            RedirectTarget::Stage(Stage::Payment) => "payment",
            RedirectTarget::Stage(Stage::Setup) => "setup",
            RedirectTarget::Stage(Stage::Complete) | RedirectTarget::Home => "home",
        }
    }

    /// Parse a marker from the follow-up request, if present.
    pub fn from_marker(marker: &str) -> Option<RedirectTarget> {
        match marker {
            "business-info" => Some(RedirectTarget::Stage(Stage::BusinessInfo)),
            "subscription" => Some(RedirectTarget::Stage(Stage::Subscription)),
            "payment" => Some(RedirectTarget::Stage(Stage::Payment)),
            "setup" => Some(RedirectTarget::Stage(Stage::Setup)),
            "home" => Some(RedirectTarget::Home),
            _ => None,
        }
    }
}

/// The request facts the gate needs.
#[derive(Debug, Clone)]
pub struct GateRequest<'a> {
    pub path: &'a str,
    /// Target of a redirect this request is already the result of.
    pub redirected_to: Option<RedirectTarget>,
}

/// Gate output, consumed by the middleware as a 3xx or pass-through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    RedirectToStage(Stage),
    RedirectToHome { tenant_id: Option<Uuid> },
}

/// Path layout for the gate.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Prefixes never subject to the gate: public pages, auth
    /// endpoints and the reconciliation endpoints themselves (gating
    /// those would self-deadlock).
    pub exempt_prefixes: Vec<String>,
    pub onboarding_prefix: String,
    pub home_path: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            exempt_prefixes: vec![
                "/auth".into(),
                "/public".into(),
                "/recon".into(),
                "/health".into(),
                "/static".into(),
            ],
            onboarding_prefix: "/onboarding".into(),
            home_path: "/dashboard".into(),
        }
    }
}

impl GateConfig {
    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Path of the onboarding step a stage maps to. `NotStarted` maps
    /// to the first actionable step.
    pub fn stage_path(&self, stage: Stage) -> String {
        format!(
            "{}/{}",
            self.onboarding_prefix,
            RedirectTarget::Stage(stage).marker()
        )
    }

    /// Full redirect location for a decision, including the loop
    /// marker and, when the resolution found drift, a hint for the
    /// client to refresh its local copy of onboarding state. The hint
    /// is advisory only — it is never re-trusted as authoritative.
    pub fn redirect_location(&self, decision: &GateDecision, drift: bool) -> Option<String> {
        let (base, marker) = match decision {
            GateDecision::Allow => return None,
            GateDecision::RedirectToStage(stage) => {
                (self.stage_path(*stage), RedirectTarget::Stage(*stage).marker())
            }
            GateDecision::RedirectToHome { .. } => {
                (self.home_path.clone(), RedirectTarget::Home.marker())
            }
        };
        let mut location = format!("{base}?redirected={marker}");
        if drift {
            location.push_str("&recheck=1");
        }
        Some(location)
    }
}

/// Decide the disposition of one request.
pub fn decide(config: &GateConfig, request: &GateRequest<'_>, facts: &OnboardingFacts) -> GateDecision {
    if config.is_exempt(request.path) {
        return GateDecision::Allow;
    }

    let stage = compute_stage(facts);

    let target = if stage == Stage::Complete {
        // Completed principals only get bounced off onboarding paths.
        if request.path.starts_with(config.onboarding_prefix.as_str()) {
            RedirectTarget::Home
        } else {
            return GateDecision::Allow;
        }
    } else {
        // NotStarted has no page of its own: the first actionable
        // step is business info.
        let step = if stage == Stage::NotStarted {
            Stage::BusinessInfo
        } else {
            stage
        };
        // Already on the right step: nothing to do.
        if request.path.starts_with(config.stage_path(step).as_str()) {
            return GateDecision::Allow;
        }
        RedirectTarget::Stage(step)
    };

    // Termination rule: a request that is itself the result of a
    // redirect to this target passes, even if the computed state is
    // momentarily wrong.
    if request.redirected_to == Some(target) {
        return GateDecision::Allow;
    }

    match target {
        RedirectTarget::Home => GateDecision::RedirectToHome {
            tenant_id: facts.tenant_id,
        },
        RedirectTarget::Stage(stage) => GateDecision::RedirectToStage(stage),
    }
}
