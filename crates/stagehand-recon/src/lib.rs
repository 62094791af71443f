//! STAGEHAND Recon — merges the three candidate onboarding states
//! (claims, session snapshot, backend record), derives the canonical
//! stage, decides request disposition and repairs lagging stores
//! asynchronously.

pub mod config;
pub mod gate;
pub mod invalidator;
pub mod resolver;
pub mod service;

pub use config::ReconConfig;
pub use gate::{GateConfig, GateDecision, GateRequest, RedirectTarget};
pub use invalidator::SessionInvalidator;
pub use resolver::{DriftPatch, Resolution, resolve};
pub use service::{ReconOutcome, ReconService};
