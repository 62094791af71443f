//! STAGEHAND Session — identity-provider claims normalization and the
//! opaque signed session artifact carrying a cached onboarding
//! snapshot.

pub mod artifact;
pub mod claims;
pub mod config;
pub mod error;

pub use artifact::{decode_artifact, encode_artifact};
pub use claims::{NormalizedClaims, canonical_claims, normalize_claims};
pub use config::SessionConfig;
pub use error::ArtifactError;
