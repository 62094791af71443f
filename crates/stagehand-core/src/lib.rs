//! STAGEHAND Core — domain models, repository traits, error taxonomy
//! and the pure onboarding stage machine.
//!
//! This crate has no I/O dependencies. Storage and identity-provider
//! implementations live in `stagehand-db` and behind the traits in
//! [`repository`].

pub mod error;
pub mod models;
pub mod repository;
pub mod stage;

pub use error::{StagehandError, StagehandResult};
pub use stage::{Stage, compute_stage};
