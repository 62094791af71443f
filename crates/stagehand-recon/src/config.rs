//! Reconciliation configuration.

/// Configuration for the reconciliation service.
#[derive(Debug, Clone)]
pub struct ReconConfig {
    /// Backend lookup timeout in milliseconds (default: 250). On
    /// timeout the decision proceeds provisionally on claims +
    /// session.
    pub backend_timeout_ms: u64,
    /// Max provisioning attempts on transient storage failure
    /// (default: 3).
    pub provision_attempts: u32,
    /// Initial provisioning backoff in milliseconds (default: 100).
    pub provision_initial_backoff_ms: u64,
    /// Exponential backoff multiplier between attempts (default: 2.0).
    pub provision_backoff_multiplier: f64,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            backend_timeout_ms: 250,
            provision_attempts: 3,
            provision_initial_backoff_ms: 100,
            provision_backoff_multiplier: 2.0,
        }
    }
}
