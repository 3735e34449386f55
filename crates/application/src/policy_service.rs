//! The policy controller: single mutation-serialising entry point over the
//! compile-translate-apply pipeline, and owner of the last applied IR.
//!
//! One `RwLock` serialises every mutating sequence from compile through
//! applier return, so the cached IR is never transiently inconsistent with
//! kernel state. Readers share the lock. Errors cross this boundary
//! unchanged in kind; nothing is swallowed or reclassified.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use domain::ir::entity::Ir;
use domain::policy::compiler::Compiler;
use domain::policy::entity::Manifest;
use domain::policy::error::{CompileError, ParseError};
use domain::policy::parser::ManifestParser;
use ports::secondary::dataplane::{ApplyError, DataplanePort};
use ports::secondary::policy_store::{PolicyStore, StoreError};

pub const DEFAULT_RELOAD_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no policy directory configured")]
    PolicyDirUnset,

    #[error("no record store configured")]
    StoreUnset,
}

#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    /// Directory for `apply_directory` and the hot-reload watcher.
    pub policy_dir: Option<PathBuf>,
    /// Watcher wake interval; `None` means the 10 second default.
    pub reload_interval: Option<Duration>,
}

pub struct PolicyService {
    parser: ManifestParser,
    compiler: Compiler,
    dataplane: Arc<dyn DataplanePort>,
    store: Option<Arc<dyn PolicyStore>>,
    policy_dir: Option<PathBuf>,
    reload_interval: Duration,
    current: RwLock<Option<Ir>>,
}

impl PolicyService {
    pub fn new(config: ServiceConfig, dataplane: Arc<dyn DataplanePort>) -> Self {
        Self {
            parser: ManifestParser::new(),
            compiler: Compiler::new(),
            dataplane,
            store: None,
            policy_dir: config.policy_dir,
            reload_interval: config.reload_interval.unwrap_or(DEFAULT_RELOAD_INTERVAL),
            current: RwLock::new(None),
        }
    }

    /// Attach the external record store used by `apply_stored`.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn PolicyStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn reload_interval(&self) -> Duration {
        self.reload_interval
    }

    // ── Mutating operations (exclusive lock) ────────────────────────

    /// Compile and atomically apply a batch of manifests. On success the
    /// result becomes the current IR; on any failure the prior value stays
    /// authoritative.
    pub async fn apply_manifests(&self, manifests: &[Manifest]) -> Result<(), ServiceError> {
        let mut current = self.current.write().await;
        let ir = self.compiler.compile(manifests)?;
        self.dataplane.apply(&ir).await?;
        *current = Some(ir);
        Ok(())
    }

    /// Apply a pre-compiled IR, skipping compilation.
    pub async fn apply_ir(&self, ir: Ir) -> Result<(), ServiceError> {
        let mut current = self.current.write().await;
        self.dataplane.apply(&ir).await?;
        *current = Some(ir);
        Ok(())
    }

    /// Parse the configured policy directory and apply everything in it.
    pub async fn apply_directory(&self) -> Result<(), ServiceError> {
        let dir = self.policy_dir.as_ref().ok_or(ServiceError::PolicyDirUnset)?;
        let manifests = self.parser.parse_dir(dir)?;
        self.apply_manifests(&manifests).await
    }

    /// Fetch one stored policy, apply it, and mark it applied in the store.
    pub async fn apply_stored(&self, tenant: Uuid, id: Uuid) -> Result<(), ServiceError> {
        let store = self.store.as_ref().ok_or(ServiceError::StoreUnset)?;
        let record = store.get(tenant, id).await?;
        let manifests = self.parser.parse_stream(record.raw_yaml.as_bytes())?;
        self.apply_manifests(&manifests).await?;
        store.mark_applied(tenant, id).await?;
        Ok(())
    }

    /// Restore the most recent rollback snapshot.
    ///
    /// The cached IR is left as-is: it described the last successful apply,
    /// and rollback state is owned by the applier's snapshot directory.
    pub async fn rollback(&self) -> Result<(), ServiceError> {
        let _guard = self.current.write().await;
        self.dataplane.rollback().await?;
        Ok(())
    }

    /// Remove the managed table from the kernel entirely.
    pub async fn flush(&self) -> Result<(), ServiceError> {
        let _guard = self.current.write().await;
        self.dataplane.flush().await?;
        Ok(())
    }

    // ── Read operations (shared lock) ───────────────────────────────

    /// The live kernel ruleset as text.
    pub async fn status(&self) -> Result<String, ServiceError> {
        let _guard = self.current.read().await;
        Ok(self.dataplane.status().await?)
    }

    /// What would change if these manifests were applied now.
    pub async fn diff_manifests(&self, manifests: &[Manifest]) -> Result<String, ServiceError> {
        let _guard = self.current.read().await;
        let ir = self.compiler.compile(manifests)?;
        Ok(self.dataplane.diff(&ir).await?)
    }

    /// Snapshot of the last successfully applied IR; absent until the first
    /// successful apply.
    pub async fn current_ir(&self) -> Option<Ir> {
        self.current.read().await.clone()
    }
}
