use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

/// The kernel packet-filter CLI tool rejected or could not perform an
/// operation. Operators diagnose rejected rulesets from the captured text, so
/// implementations must merge stdout and stderr into `output`.
#[derive(Debug, Error)]
#[error("loader exited with {}: {output}", code.map_or_else(|| "signal".to_string(), |c| format!("status {c}")))]
pub struct LoaderError {
    /// Process exit code; `None` when killed by a signal or not spawned.
    pub code: Option<i32>,
    /// Combined stdout + stderr of the invocation.
    pub output: String,
}

/// Contract around the host's packet-filter CLI.
///
/// The three operations map onto the tool's whole-file replace, table dump
/// and table delete modes. `load_file` is transactional from the kernel's
/// point of view: the ruleset commits entirely or not at all.
#[async_trait]
pub trait RulesetLoader: Send + Sync {
    /// Commit a ruleset file with replace semantics.
    async fn load_file(&self, path: &Path) -> Result<(), LoaderError>;

    /// Dump the current live ruleset of the managed table as text.
    async fn dump_table(&self) -> Result<String, LoaderError>;

    /// Remove the managed table. Idempotent: an absent table is success.
    async fn delete_table(&self) -> Result<(), LoaderError>;
}
