//! Tenant domain model.
//!
//! A tenant is the provisioned unit of isolation for one business
//! account. At most one tenant row exists per id — provisioning is
//! idempotent keyed on the id, not on the principal, so retries cannot
//! create duplicates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What `ensure_tenant` observed: whether this call performed the
/// physical creation, and whether the tenant's storage is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionStatus {
    pub created: bool,
    pub storage_ready: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    /// Generated once, never reassigned.
    pub id: Uuid,
    pub owner_principal_id: String,
    pub is_active: bool,
    /// Set only after every tenant-scoped storage object and its
    /// isolation policy exists.
    pub storage_ready: bool,
    pub created_at: DateTime<Utc>,
}
