//! SurrealDB implementation of [`TenantProvisioner`].
//!
//! Provisioning rides on the record id as a unique constraint: the
//! whole creation — tenant row, every tenant-scoped storage object and
//! the isolation policies their table carries — happens in one
//! transaction keyed on `tenant:<id>`. Exactly one concurrent caller
//! performs the physical creation; the rest observe "already exists"
//! and re-read the committed row.

use chrono::{DateTime, Utc};
use stagehand_core::error::{StagehandError, StagehandResult};
use stagehand_core::models::tenant::{ProvisionStatus, Tenant};
use stagehand_core::repository::TenantProvisioner;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{info, warn};
use uuid::Uuid;

/// The storage objects every tenant gets at provisioning time. Their
/// table carries the row-level isolation predicate; a tenant is only
/// `storage_ready` once all of them exist.
const TENANT_STORES: &[&str] = &["documents", "invoices", "payroll", "inventory"];

/// How often and how long to re-read the tenant row after losing the
/// creation race before the winner's commit becomes visible.
const VISIBILITY_RETRIES: u32 = 5;
const VISIBILITY_BACKOFF: std::time::Duration = std::time::Duration::from_millis(10);

#[derive(Debug, SurrealValue)]
struct TenantRow {
    owner_principal_id: String,
    is_active: bool,
    storage_ready: bool,
    created_at: DateTime<Utc>,
}

impl TenantRow {
    fn into_tenant(self, id: Uuid) -> Tenant {
        Tenant {
            id,
            owner_principal_id: self.owner_principal_id,
            is_active: self.is_active,
            storage_ready: self.storage_ready,
            created_at: self.created_at,
        }
    }
}

/// SurrealDB implementation of the tenant provisioner.
#[derive(Clone)]
pub struct SurrealTenantProvisioner<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTenantProvisioner<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch(&self, tenant_id: Uuid) -> StagehandResult<Option<Tenant>> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('tenant', $id)")
            .bind(("id", tenant_id.to_string()))
            .await
            .map_err(transient)?;

        let rows: Vec<TenantRow> = result.take(0).map_err(transient)?;
        Ok(rows.into_iter().next().map(|row| row.into_tenant(tenant_id)))
    }

    fn creation_query() -> String {
        let stores: String = TENANT_STORES
            .iter()
            .map(|name| format!("CREATE tenant_store SET tenant_id = $id, name = '{name}'; "))
            .collect();
        format!(
            "BEGIN TRANSACTION; \
             CREATE type::record('tenant', $id) SET \
             owner_principal_id = $owner, \
             is_active = true, \
             storage_ready = false; \
             {stores}\
             UPDATE type::record('tenant', $id) SET storage_ready = true; \
             COMMIT TRANSACTION;"
        )
    }
}

/// Storage errors during provisioning are transient by contract: the
/// transaction rolled back, the tenant does not exist, and a retry is
/// safe.
fn transient(err: surrealdb::Error) -> StagehandError {
    StagehandError::StorageUnavailable {
        reason: err.to_string(),
    }
}

impl<C: Connection> TenantProvisioner for SurrealTenantProvisioner<C> {
    async fn ensure_tenant(
        &self,
        tenant_id: Uuid,
        owner_principal_id: &str,
    ) -> StagehandResult<ProvisionStatus> {
        let created = self
            .db
            .query(Self::creation_query())
            .bind(("id", tenant_id.to_string()))
            .bind(("owner", owner_principal_id.to_string()))
            .await
            .map_err(transient)?
            .check();

        match created {
            Ok(_) => {
                info!(%tenant_id, owner = %owner_principal_id, "tenant provisioned");
                Ok(ProvisionStatus {
                    created: true,
                    storage_ready: true,
                })
            }
            Err(err) if err.to_string().contains("already exists") => {
                // Lost the creation race, or the tenant predates this
                // call. Either way the committed row decides. The
                // winner's commit may not be visible yet, so re-read
                // with a short bounded wait: every non-conflicting
                // caller must observe success.
                let mut attempt = 0u32;
                loop {
                    match self.fetch(tenant_id).await? {
                        Some(tenant) if tenant.owner_principal_id == owner_principal_id => {
                            return Ok(ProvisionStatus {
                                created: false,
                                storage_ready: tenant.storage_ready,
                            });
                        }
                        Some(tenant) => {
                            return Err(StagehandError::TenantIdConflict {
                                tenant_id,
                                owner: tenant.owner_principal_id,
                                claimant: owner_principal_id.to_string(),
                            });
                        }
                        None if attempt < VISIBILITY_RETRIES => {
                            attempt += 1;
                            tokio::time::sleep(VISIBILITY_BACKOFF).await;
                        }
                        None => {
                            warn!(%tenant_id, "tenant row still not visible after creation conflict");
                            return Err(StagehandError::StorageUnavailable {
                                reason: "tenant row not visible after creation conflict".into(),
                            });
                        }
                    }
                }
            }
            Err(err) => Err(transient(err)),
        }
    }

    async fn get_tenant(&self, tenant_id: Uuid) -> StagehandResult<Tenant> {
        self.fetch(tenant_id)
            .await?
            .ok_or_else(|| StagehandError::NotFound {
                entity: "tenant".into(),
                id: tenant_id.to_string(),
            })
    }

    async fn deactivate(&self, tenant_id: Uuid) -> StagehandResult<()> {
        let mut result = self
            .db
            .query("UPDATE type::record('tenant', $id) SET is_active = false")
            .bind(("id", tenant_id.to_string()))
            .await
            .map_err(transient)?;

        let rows: Vec<TenantRow> = result.take(0).map_err(transient)?;
        if rows.is_empty() {
            return Err(StagehandError::NotFound {
                entity: "tenant".into(),
                id: tenant_id.to_string(),
            });
        }
        Ok(())
    }
}
