use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// One stored policy document as the external record store returns it.
///
/// `raw_yaml` carries the original document bytes, from which the manifest
/// parser can reproduce typed manifests. The core keeps no persistent state
/// of its own.
#[derive(Debug, Clone)]
pub struct PolicyRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub namespace: String,
    pub kind: String,
    pub raw_yaml: String,
    pub enabled: bool,
    pub applied_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("policy not found: {0}")]
    NotFound(Uuid),

    #[error("record store backend error: {0}")]
    Backend(String),
}

/// Thin contract over the external key-addressed record store.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Fetch a single policy record.
    async fn get(&self, tenant: Uuid, id: Uuid) -> Result<PolicyRecord, StoreError>;

    /// List a tenant's policies, optionally filtered by kind.
    async fn list(&self, tenant: Uuid, kind: Option<&str>) -> Result<Vec<PolicyRecord>, StoreError>;

    /// Record that a policy has been applied to the dataplane.
    async fn mark_applied(&self, tenant: Uuid, id: Uuid) -> Result<(), StoreError>;
}
