//! SurrealDB implementation of [`OnboardingRepository`].
//!
//! The record id is the principal's subject id, so one record per
//! principal is structural rather than enforced by queries. The
//! write-once `tenant_id` invariant is enforced here: a patch or
//! upsert can never replace a non-null stored tenant id.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use stagehand_core::error::StagehandResult;
use stagehand_core::models::onboarding::{
    FactField, OnboardingFacts, OnboardingPatch, OnboardingRecord, StoreKind,
};
use stagehand_core::repository::OnboardingRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::warn;
use uuid::Uuid;

use crate::error::DbError;

/// DB-side row struct; the principal id is the record id and is
/// supplied by the caller.
#[derive(Debug, SurrealValue)]
struct OnboardingRow {
    tenant_id: Option<String>,
    subscription_plan: Option<String>,
    payment_verified: bool,
    setup_done: bool,
    tombstoned: bool,
    provenance: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OnboardingRow {
    fn into_record(self, principal_id: &str) -> Result<OnboardingRecord, DbError> {
        let tenant_id = match self.tenant_id {
            Some(raw) => Some(
                Uuid::parse_str(&raw)
                    .map_err(|e| DbError::Migration(format!("invalid tenant UUID: {e}")))?,
            ),
            None => None,
        };
        let provenance: BTreeMap<FactField, StoreKind> =
            serde_json::from_value(self.provenance).unwrap_or_default();
        Ok(OnboardingRecord {
            principal_id: principal_id.to_string(),
            facts: OnboardingFacts {
                tenant_id,
                subscription_plan: self.subscription_plan,
                payment_verified: self.payment_verified,
                setup_done: self.setup_done,
            },
            tombstoned: self.tombstoned,
            provenance,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Row struct for the server-side session table.
#[derive(Debug, SurrealValue)]
struct ServerSessionRow {
    #[allow(dead_code)]
    principal_id: String,
    #[allow(dead_code)]
    created_at: DateTime<Utc>,
}

/// SurrealDB implementation of the onboarding system-of-record.
#[derive(Clone)]
pub struct SurrealOnboardingRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealOnboardingRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch(&self, principal_id: &str) -> Result<Option<OnboardingRecord>, DbError> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('onboarding', $id)")
            .bind(("id", principal_id.to_string()))
            .await?;

        let rows: Vec<OnboardingRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(|row| row.into_record(principal_id))
            .transpose()
    }

    /// Write the full fact set for a principal (creating the record on
    /// first use) and read back the stored row.
    async fn write(
        &self,
        principal_id: &str,
        facts: &OnboardingFacts,
        tombstoned: bool,
        provenance: &BTreeMap<FactField, StoreKind>,
    ) -> Result<OnboardingRecord, DbError> {
        let provenance_value = serde_json::to_value(provenance)
            .map_err(|e| DbError::Migration(format!("provenance encode: {e}")))?;

        let result = self
            .db
            .query(
                "UPSERT type::record('onboarding', $id) SET \
                 tenant_id = $tenant_id, \
                 subscription_plan = $plan, \
                 payment_verified = $payment, \
                 setup_done = $setup, \
                 tombstoned = $tombstoned, \
                 provenance = $provenance, \
                 updated_at = time::now()",
            )
            .bind(("id", principal_id.to_string()))
            .bind(("tenant_id", facts.tenant_id.map(|t| t.to_string())))
            .bind(("plan", facts.subscription_plan.clone()))
            .bind(("payment", facts.payment_verified))
            .bind(("setup", facts.setup_done))
            .bind(("tombstoned", tombstoned))
            .bind(("provenance", provenance_value))
            .await?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<OnboardingRow> = result.take(0)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "onboarding".into(),
            id: principal_id.to_string(),
        })?;

        row.into_record(principal_id)
    }

    /// Apply the write-once rule to an incoming tenant id; the stored
    /// value always wins once non-null.
    fn retained_tenant_id(
        principal_id: &str,
        stored: Option<Uuid>,
        incoming: Option<Uuid>,
    ) -> Option<Uuid> {
        match (stored, incoming) {
            (Some(current), Some(new)) if current != new => {
                warn!(
                    principal = %principal_id,
                    stored_tenant = %current,
                    incoming_tenant = %new,
                    "attempt to reassign write-once tenant id dropped"
                );
                Some(current)
            }
            (Some(current), _) => Some(current),
            (None, incoming) => incoming,
        }
    }
}

impl<C: Connection> OnboardingRepository for SurrealOnboardingRepository<C> {
    async fn get(&self, principal_id: &str) -> StagehandResult<Option<OnboardingRecord>> {
        Ok(self.fetch(principal_id).await?)
    }

    async fn upsert(&self, record: OnboardingRecord) -> StagehandResult<OnboardingRecord> {
        let existing = self.fetch(&record.principal_id).await?;

        let mut facts = record.facts.clone();
        facts.tenant_id = Self::retained_tenant_id(
            &record.principal_id,
            existing.as_ref().and_then(|r| r.facts.tenant_id),
            record.facts.tenant_id,
        );

        Ok(self
            .write(
                &record.principal_id,
                &facts,
                record.tombstoned,
                &record.provenance,
            )
            .await?)
    }

    async fn patch(
        &self,
        principal_id: &str,
        patch: OnboardingPatch,
    ) -> StagehandResult<OnboardingRecord> {
        let existing = self.fetch(principal_id).await?;
        let (mut facts, tombstoned, mut provenance) = match existing {
            Some(record) => (record.facts, record.tombstoned, record.provenance),
            None => (OnboardingFacts::default(), false, BTreeMap::new()),
        };

        if let Some(new_tenant) = patch.tenant_id {
            let retained =
                Self::retained_tenant_id(principal_id, facts.tenant_id, Some(new_tenant));
            if facts.tenant_id.is_none() && retained.is_some() {
                provenance.insert(FactField::TenantId, patch.source);
            }
            facts.tenant_id = retained;
        }

        if let Some(plan) = patch.subscription_plan {
            if facts.subscription_plan.as_deref() != Some(plan.as_str()) {
                provenance.insert(FactField::SubscriptionPlan, patch.source);
            }
            facts.subscription_plan = Some(plan);
        }

        // Completion flags only move upward through reconciliation;
        // only an explicit administrative patch can lower them.
        if let Some(payment) = patch.payment_verified {
            if payment || patch.source == StoreKind::Admin {
                if facts.payment_verified != payment {
                    provenance.insert(FactField::PaymentVerified, patch.source);
                }
                facts.payment_verified = payment;
            }
        }
        if let Some(setup) = patch.setup_done {
            if setup || patch.source == StoreKind::Admin {
                if facts.setup_done != setup {
                    provenance.insert(FactField::SetupDone, patch.source);
                }
                facts.setup_done = setup;
            }
        }

        Ok(self
            .write(principal_id, &facts, tombstoned, &provenance)
            .await?)
    }

    async fn tombstone(&self, principal_id: &str) -> StagehandResult<()> {
        let mut result = self
            .db
            .query(
                "UPDATE type::record('onboarding', $id) SET \
                 tombstoned = true, updated_at = time::now()",
            )
            .bind(("id", principal_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OnboardingRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(DbError::NotFound {
                entity: "onboarding".into(),
                id: principal_id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn drop_server_session(&self, principal_id: &str) -> StagehandResult<u64> {
        let mut result = self
            .db
            .query("DELETE server_session WHERE principal_id = $pid RETURN BEFORE")
            .bind(("pid", principal_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ServerSessionRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.len() as u64)
    }
}
