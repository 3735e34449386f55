use async_trait::async_trait;
use thiserror::Error;

use domain::ir::entity::Ir;

use super::ruleset_loader::LoaderError;

/// Which step of the apply protocol a loader invocation belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderPhase {
    Load,
    Rollback,
    Flush,
}

impl LoaderPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Rollback => "rollback",
            Self::Flush => "flush",
        }
    }
}

impl std::fmt::Display for LoaderPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures of the dataplane applier.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// The kernel rejected a ruleset or the loader tool failed.
    #[error("ruleset loader failed during {phase}: {source}")]
    LoaderFailure {
        phase: LoaderPhase,
        #[source]
        source: LoaderError,
    },

    /// Could not capture the pre-apply ruleset. Non-fatal during apply.
    #[error("cannot capture rollback snapshot: {0}")]
    Snapshot(String),

    /// Rollback requested with nothing to roll back to.
    #[error("no rollback snapshots found")]
    NoSnapshot,

    /// Cannot read the live ruleset.
    #[error("cannot read live ruleset: {0}")]
    Status(#[source] LoaderError),

    /// Another process holds the rollback directory lock.
    #[error("rollback directory {0} is locked by another process")]
    DirectoryLocked(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Atomic swap of the live kernel ruleset, with snapshot-based rollback.
///
/// `apply` either commits the whole translated ruleset or restores the prior
/// one; there is no observable half-configured state.
#[async_trait]
pub trait DataplanePort: Send + Sync {
    /// Translate and atomically apply an IR, reverting on loader failure.
    async fn apply(&self, ir: &Ir) -> Result<(), ApplyError>;

    /// Restore the most recent rollback snapshot.
    async fn rollback(&self) -> Result<(), ApplyError>;

    /// Remove the managed table entirely. Absence of the table is success.
    async fn flush(&self) -> Result<(), ApplyError>;

    /// The current live ruleset as text.
    async fn status(&self) -> Result<String, ApplyError>;

    /// Human-readable line delta between the live ruleset and `ir`.
    async fn diff(&self, ir: &Ir) -> Result<String, ApplyError>;
}
