//! In-memory fakes for adapter- and application-level tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::secondary::policy_store::{PolicyRecord, PolicyStore, StoreError};
use crate::secondary::ruleset_loader::{LoaderError, RulesetLoader};

// ── Fake kernel ─────────────────────────────────────────────────────

/// Stand-in for the kernel packet-filter tool: holds at most one table's
/// ruleset text in memory. `load_file` reads the given file exactly like the
/// real loader, so the apply/rollback file plumbing is exercised end to end.
#[derive(Debug, Default)]
pub struct FakeKernel {
    table: Mutex<Option<String>>,
    fail_next_load: AtomicBool,
}

impl FakeKernel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arrange for the next `load_file` to be rejected, as if the ruleset
    /// used an unknown chain hook.
    pub fn reject_next_load(&self) {
        self.fail_next_load.store(true, Ordering::SeqCst);
    }

    /// Current table contents, if a ruleset has been committed.
    pub fn table(&self) -> Option<String> {
        self.table.lock().unwrap().clone()
    }

    /// Seed the table directly, bypassing the loader path.
    pub fn set_table(&self, text: &str) {
        *self.table.lock().unwrap() = Some(text.to_string());
    }
}

#[async_trait]
impl RulesetLoader for FakeKernel {
    async fn load_file(&self, path: &Path) -> Result<(), LoaderError> {
        if self.fail_next_load.swap(false, Ordering::SeqCst) {
            return Err(LoaderError {
                code: Some(1),
                output: format!("{}:3:5-9: Error: unknown chain hook", path.display()),
            });
        }
        let text = std::fs::read_to_string(path).map_err(|e| LoaderError {
            code: Some(1),
            output: format!("internal:0:0-0: Error: {e}"),
        })?;
        *self.table.lock().unwrap() = Some(text);
        Ok(())
    }

    async fn dump_table(&self) -> Result<String, LoaderError> {
        self.table.lock().unwrap().clone().ok_or(LoaderError {
            code: Some(1),
            output: "Error: No such file or directory".to_string(),
        })
    }

    async fn delete_table(&self) -> Result<(), LoaderError> {
        *self.table.lock().unwrap() = None;
        Ok(())
    }
}

// ── In-memory policy store ──────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InMemoryPolicyStore {
    records: Mutex<HashMap<(Uuid, Uuid), PolicyRecord>>,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: PolicyRecord) {
        self.records
            .lock()
            .unwrap()
            .insert((record.tenant_id, record.id), record);
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn get(&self, tenant: Uuid, id: Uuid) -> Result<PolicyRecord, StoreError> {
        self.records
            .lock()
            .unwrap()
            .get(&(tenant, id))
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn list(&self, tenant: Uuid, kind: Option<&str>) -> Result<Vec<PolicyRecord>, StoreError> {
        let records = self.records.lock().unwrap();
        let mut out: Vec<_> = records
            .values()
            .filter(|r| r.tenant_id == tenant)
            .filter(|r| kind.is_none_or(|k| r.kind == k))
            .cloned()
            .collect();
        out.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
        Ok(out)
    }

    async fn mark_applied(&self, tenant: Uuid, id: Uuid) -> Result<(), StoreError> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(&(tenant, id))
            .ok_or(StoreError::NotFound(id))?;
        record.applied_at = Some(Utc::now());
        Ok(())
    }
}
