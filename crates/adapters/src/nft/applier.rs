//! Atomic ruleset application with snapshot-based rollback.
//!
//! One apply attempt walks: translate, snapshot the live ruleset to disk,
//! write the candidate to a temp file, hand it to the loader in whole-file
//! replace mode, and on rejection restore the snapshot. The loader commits
//! or rejects the whole file, so the kernel never holds a partial ruleset;
//! the snapshot directory on disk is the source of truth for rollback state.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use fs2::FileExt;

use domain::ir::entity::Ir;
use ports::secondary::dataplane::{ApplyError, DataplanePort, LoaderPhase};
use ports::secondary::ruleset_loader::RulesetLoader;

use super::diff::ruleset_delta;
use super::translator::Translator;

const SNAPSHOT_PREFIX: &str = "rollback-";
const SNAPSHOT_SUFFIX: &str = ".conf";
const LOCK_FILE: &str = ".lock";

#[derive(Debug, Clone)]
pub struct ApplierConfig {
    pub table_name: String,
    pub rollback_dir: PathBuf,
    pub dry_run: bool,
}

pub struct NftApplier {
    translator: Translator,
    loader: Arc<dyn RulesetLoader>,
    rollback_dir: PathBuf,
    dry_run: bool,
    /// Advisory lock held for the applier's lifetime; the rollback directory
    /// is a single-writer resource.
    _dir_lock: std::fs::File,
}

impl NftApplier {
    pub fn new(config: ApplierConfig, loader: Arc<dyn RulesetLoader>) -> Result<Self, ApplyError> {
        ensure_private_dir(&config.rollback_dir)?;

        let lock_path = config.rollback_dir.join(LOCK_FILE);
        let dir_lock = std::fs::File::create(&lock_path)?;
        dir_lock.try_lock_exclusive().map_err(|_| {
            ApplyError::DirectoryLocked(config.rollback_dir.display().to_string())
        })?;

        Ok(Self {
            translator: Translator::new(config.table_name),
            loader,
            rollback_dir: config.rollback_dir,
            dry_run: config.dry_run,
            _dir_lock: dir_lock,
        })
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    /// Capture the live ruleset into a new snapshot file.
    ///
    /// Returns the snapshot path. `ApplyError::Snapshot` when the live state
    /// cannot be read (commonly: the table does not exist yet).
    async fn capture_snapshot(&self) -> Result<PathBuf, ApplyError> {
        let current = self
            .loader
            .dump_table()
            .await
            .map_err(|e| ApplyError::Snapshot(e.to_string()))?;

        let path = self.next_snapshot_path()?;
        tokio::fs::write(&path, &current).await?;
        restrict_file_mode(&path)?;
        Ok(path)
    }

    /// Snapshot filenames embed a millisecond timestamp and are forced
    /// strictly monotonic against existing files, so lexicographic order is
    /// capture order even when the clock steps backwards.
    fn next_snapshot_path(&self) -> Result<PathBuf, ApplyError> {
        let now = chrono::Utc::now().timestamp_millis();
        let floor = self
            .latest_snapshot()?
            .and_then(|p| snapshot_millis(&p))
            .map_or(i64::MIN, |latest| latest + 1);
        let millis = now.max(floor);
        Ok(self
            .rollback_dir
            .join(format!("{SNAPSHOT_PREFIX}{millis:013}{SNAPSHOT_SUFFIX}")))
    }

    /// Lexicographically latest snapshot file, if any.
    fn latest_snapshot(&self) -> Result<Option<PathBuf>, ApplyError> {
        let entries = match std::fs::read_dir(&self.rollback_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let latest = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(SNAPSHOT_PREFIX) && n.ends_with(SNAPSHOT_SUFFIX))
            })
            .max();
        Ok(latest)
    }
}

#[async_trait]
impl DataplanePort for NftApplier {
    async fn apply(&self, ir: &Ir) -> Result<(), ApplyError> {
        let ruleset = self.translator.translate(ir);

        if self.dry_run {
            tracing::info!(ir_id = %ir.id, ruleset = %ruleset, "dry-run: skipping kernel apply");
            return Ok(());
        }

        // A failed capture is tolerated; there may simply be no prior table.
        match self.capture_snapshot().await {
            Ok(path) => tracing::debug!(path = %path.display(), "rollback snapshot captured"),
            Err(e) => tracing::warn!(error = %e, "could not save rollback snapshot"),
        }

        let tmp_path = std::env::temp_dir().join(format!("aegisx-nft-{}.conf", ir.id));
        tokio::fs::write(&tmp_path, &ruleset).await?;

        let loaded = self.loader.load_file(&tmp_path).await;
        let _ = tokio::fs::remove_file(&tmp_path).await;

        if let Err(e) = loaded {
            tracing::error!(
                ir_id = %ir.id,
                output = %e.output,
                "kernel rejected ruleset, attempting rollback"
            );
            if let Err(rb_err) = self.rollback().await {
                tracing::error!(error = %rb_err, "rollback also failed");
            }
            return Err(ApplyError::LoaderFailure {
                phase: LoaderPhase::Load,
                source: e,
            });
        }

        tracing::info!(ir_id = %ir.id, version = ir.version, "nftables ruleset applied");
        Ok(())
    }

    async fn rollback(&self) -> Result<(), ApplyError> {
        let latest = self.latest_snapshot()?.ok_or(ApplyError::NoSnapshot)?;

        self.loader
            .load_file(&latest)
            .await
            .map_err(|e| ApplyError::LoaderFailure {
                phase: LoaderPhase::Rollback,
                source: e,
            })?;

        tracing::info!(file = %latest.display(), "rollback snapshot applied");
        Ok(())
    }

    async fn flush(&self) -> Result<(), ApplyError> {
        self.loader
            .delete_table()
            .await
            .map_err(|e| ApplyError::LoaderFailure {
                phase: LoaderPhase::Flush,
                source: e,
            })
    }

    async fn status(&self) -> Result<String, ApplyError> {
        self.loader.dump_table().await.map_err(ApplyError::Status)
    }

    async fn diff(&self, ir: &Ir) -> Result<String, ApplyError> {
        let proposed = self.translator.translate(ir);
        // An unreadable live ruleset diffs as empty: the whole proposal shows
        // up as additions.
        let current = self.status().await.unwrap_or_default();
        Ok(ruleset_delta(&current, &proposed))
    }
}

fn ensure_private_dir(dir: &Path) -> Result<(), ApplyError> {
    std::fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

fn restrict_file_mode(path: &Path) -> Result<(), ApplyError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

/// Millisecond timestamp embedded in a snapshot filename.
fn snapshot_millis(path: &Path) -> Option<i64> {
    path.file_name()?
        .to_str()?
        .strip_prefix(SNAPSHOT_PREFIX)?
        .strip_suffix(SNAPSHOT_SUFFIX)?
        .parse()
        .ok()
}
