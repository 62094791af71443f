//! SurrealDB repository implementations.

mod audit;
mod onboarding;
mod tenant;

pub use audit::SurrealAuditLogRepository;
pub use onboarding::SurrealOnboardingRepository;
pub use tenant::SurrealTenantProvisioner;
