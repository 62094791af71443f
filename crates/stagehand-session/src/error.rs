//! Session artifact error types.

use stagehand_core::error::StagehandError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    /// Signature, issuer or payload verification failed. The caller
    /// must treat the artifact as absent, not as an error page.
    #[error("invalid artifact: {0}")]
    InvalidArtifact(String),

    /// The artifact's hard lifetime elapsed. Also treated as absent.
    #[error("artifact has expired")]
    Expired,

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<ArtifactError> for StagehandError {
    fn from(err: ArtifactError) -> Self {
        match err {
            ArtifactError::InvalidArtifact(msg) => StagehandError::InvalidArtifact(msg),
            ArtifactError::Expired => StagehandError::InvalidArtifact("expired".into()),
            ArtifactError::Crypto(msg) => StagehandError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_errors_map_into_the_core_taxonomy() {
        // Tamper and expiry both read as "no snapshot" upstream.
        assert!(matches!(
            StagehandError::from(ArtifactError::InvalidArtifact("bad signature".into())),
            StagehandError::InvalidArtifact(_)
        ));
        assert!(matches!(
            StagehandError::from(ArtifactError::Expired),
            StagehandError::InvalidArtifact(_)
        ));
        // Key problems are ours, not the caller's.
        assert!(matches!(
            StagehandError::from(ArtifactError::Crypto("bad private key".into())),
            StagehandError::Internal(_)
        ));
    }
}
