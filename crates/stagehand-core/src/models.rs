//! Domain models for STAGEHAND.
//!
//! These are the core types shared across all crates.

pub mod audit;
pub mod onboarding;
pub mod principal;
pub mod tenant;
