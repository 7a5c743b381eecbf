//! Incremental index update for one subtree.
//!
//! A scan first prunes records below the root whose files are gone or no
//! longer qualify (emptied, or replaced by a directory or symlink), then
//! walks the tree and upserts every regular non-empty file. Upserts keep
//! existing hashes for files whose mtime did not move, so re-scanning an
//! unchanged tree leaves the index as it was.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::index::{mtime_nanos, IndexError, MetadataStore, UpsertOutcome};
use crate::progress::{ProgressCallback, PHASE_SCAN};

use super::{is_indexable, ScanError, Walker, WalkerConfig};

/// Counters from one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Canonical root that was scanned
    pub root: PathBuf,
    /// Regular non-empty files found on disk
    pub files_seen: usize,
    /// New records
    pub inserted: usize,
    /// Records whose mtime changed (hash cleared)
    pub updated: usize,
    /// Records left untouched
    pub unchanged: usize,
    /// Records removed because their path is gone or no longer a regular
    /// non-empty file
    pub pruned: usize,
    /// Entries skipped with a warning
    pub errors: usize,
    /// Whether the walk stopped early on Ctrl+C
    pub interrupted: bool,
}

/// Drives index updates from the filesystem.
pub struct Scanner {
    store: Arc<dyn MetadataStore>,
    config: WalkerConfig,
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("config", &self.config)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish_non_exhaustive()
    }
}

impl Scanner {
    /// Create a scanner writing into `store`.
    #[must_use]
    pub fn new(store: Arc<dyn MetadataStore>, config: WalkerConfig) -> Self {
        Self {
            store,
            config,
            shutdown_flag: None,
            progress_callback: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Scan one subtree into the index.
    ///
    /// # Errors
    ///
    /// Fails if `root` does not exist or is not a directory, or if the
    /// index itself fails. Unreadable entries are only counted.
    pub fn scan(&self, root: &Path) -> Result<ScanSummary, ScanError> {
        let root = canonical_root(root)?;
        log::info!("Scanning {}", root.display());

        let mut summary = ScanSummary {
            root: root.clone(),
            ..Default::default()
        };

        let still_indexable =
            |p: &Path| std::fs::symlink_metadata(p).is_ok_and(|m| is_indexable(&m));
        summary.pruned = self.store.prune(&root, &still_indexable)?;
        if summary.pruned > 0 {
            log::info!("Pruned {} stale record(s) from the index", summary.pruned);
        }

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_start(PHASE_SCAN, 0);
        }

        let mut walker = Walker::new(&root, self.config.clone());
        if let Some(ref flag) = self.shutdown_flag {
            walker = walker.with_shutdown_flag(Arc::clone(flag));
        }

        for result in walker.walk() {
            let file = match result {
                Ok(file) => file,
                Err(_) => {
                    // Already logged by the walker.
                    summary.errors += 1;
                    continue;
                }
            };

            summary.files_seen += 1;
            if let Some(ref callback) = self.progress_callback {
                callback.on_progress(summary.files_seen, &file.path.to_string_lossy());
            }

            match self
                .store
                .upsert(&file.path, file.size, mtime_nanos(file.modified))
            {
                Ok(UpsertOutcome::Inserted) => summary.inserted += 1,
                Ok(UpsertOutcome::Updated) => summary.updated += 1,
                Ok(UpsertOutcome::Unchanged) => summary.unchanged += 1,
                Err(IndexError::NonUtf8Path(path)) => {
                    log::warn!("Skipping non UTF-8 path: {}", path.display());
                    summary.errors += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_end(PHASE_SCAN);
        }

        summary.interrupted = self.is_shutdown_requested();
        log::info!(
            "Scan of {} complete: {} files ({} new, {} changed, {} unchanged), {} pruned, {} warning(s)",
            root.display(),
            summary.files_seen,
            summary.inserted,
            summary.updated,
            summary.unchanged,
            summary.pruned,
            summary.errors
        );
        Ok(summary)
    }
}

fn canonical_root(root: &Path) -> Result<PathBuf, ScanError> {
    let canonical = std::fs::canonicalize(root).map_err(|e| ScanError::from_io(root, e))?;
    if !canonical.is_dir() {
        return Err(ScanError::NotADirectory(canonical));
    }
    Ok(canonical)
}
