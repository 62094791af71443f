//! Session configuration.

/// Configuration for the session artifact codec and snapshot staleness.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// PEM-encoded Ed25519 private key for artifact signing.
    pub artifact_private_key_pem: String,
    /// PEM-encoded Ed25519 public key for artifact verification.
    pub artifact_public_key_pem: String,
    /// Artifact issuer (`iss` claim).
    pub issuer: String,
    /// Hard lifetime of the signed artifact in seconds
    /// (default: 86_400 = 24 hours). Past this the signature check
    /// rejects the artifact outright.
    pub artifact_lifetime_secs: u64,
    /// Staleness bound for the snapshot *contents* in seconds
    /// (default: 1_800 = 30 minutes). A verified snapshot older than
    /// this is ignored by reconciliation — this bounds how long a
    /// stale cache can mask backend progress.
    pub snapshot_ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            artifact_private_key_pem: String::new(),
            artifact_public_key_pem: String::new(),
            issuer: "stagehand".into(),
            artifact_lifetime_secs: 86_400,
            snapshot_ttl_secs: 1_800,
        }
    }
}
