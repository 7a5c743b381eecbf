//! File actions module.
//!
//! The [`ActionExecutor`] carries out the `remove` dispositions of a
//! [`Report`] in one of three modes:
//!
//! - [`ActionMode::Move`]: move into a target directory (see [`relocate`])
//! - [`ActionMode::Trash`]: move to the system trash (recoverable)
//! - [`ActionMode::Delete`]: permanent deletion
//!
//! `keep` paths are never touched. Before the first file is touched the
//! report is checked as a whole: a missing target or a group without any
//! `keep` member aborts the run. After that, failures are per file; they
//! are logged as they happen and summarized in the [`ActionReport`].
//!
//! ```no_run
//! use dupefox::actions::{ActionExecutor, ActionMode};
//! use dupefox::report::Report;
//! use std::path::{Path, PathBuf};
//!
//! let report = Report::load(Path::new("index.db.json")).unwrap();
//! let executor = ActionExecutor::new(ActionMode::Move(PathBuf::from("/tmp/quarantine")));
//! let result = executor.execute(&report).unwrap();
//! println!("{}", result.summary());
//! ```

pub mod delete;
pub mod relocate;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::progress::{ProgressCallback, PHASE_ACTIONS};
use crate::report::{Disposition, Report};

pub use delete::{delete_to_trash, permanent_delete};
pub use relocate::{destination_for, move_file};

/// Error type for file actions.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// The move target does not exist.
    #[error("target directory does not exist: {0}")]
    TargetMissing(PathBuf),

    /// The move target is not a directory.
    #[error("target is not a directory: {0}")]
    TargetNotADirectory(PathBuf),

    /// Groups in which every member is tagged `remove`.
    #[error("refusing to remove every copy in {} group(s): {}", .0.len(), .0.join(", "))]
    AllCopiesRemoved(Vec<String>),

    /// File was not found (may have been deleted or moved).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Path exists but is not a regular file.
    #[error("not a regular file: {0}")]
    NotAFile(PathBuf),

    /// None of the group's `keep` members is still on disk.
    #[error("no kept copy of {0} remains on disk")]
    NoKeptCopy(PathBuf),

    /// Destination of a move already exists.
    #[error("{destination} already exists, not moving {path}")]
    Collision {
        /// File that was to be moved
        path: PathBuf,
        /// Occupied destination
        destination: PathBuf,
    },

    /// Trash operation failed.
    #[error("trash operation failed for {path}: {message}")]
    TrashFailed {
        /// File that was to be trashed
        path: PathBuf,
        /// Error reported by the platform
        message: String,
    },

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl ActionError {
    /// Classify an I/O error for `path`.
    #[must_use]
    pub fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}

/// Size of a regular file, without following symlinks.
pub(crate) fn regular_file_size(path: &Path) -> Result<u64, ActionError> {
    let metadata = fs::symlink_metadata(path).map_err(|e| ActionError::from_io(path, e))?;
    if !metadata.is_file() {
        return Err(ActionError::NotAFile(path.to_path_buf()));
    }
    Ok(metadata.len())
}

/// How `remove` paths are disposed of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionMode {
    /// Move into this directory.
    Move(PathBuf),
    /// Move to the system trash.
    Trash,
    /// Delete permanently.
    Delete,
}

impl ActionMode {
    fn verb(&self) -> &'static str {
        match self {
            Self::Move(_) => "Moved",
            Self::Trash => "Trashed",
            Self::Delete => "Deleted",
        }
    }
}

/// Outcome of one executor run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActionReport {
    /// Files handled successfully
    pub succeeded: Vec<PathBuf>,
    /// Files that could not be handled, with the reason
    pub failed: Vec<(PathBuf, String)>,
    /// Bytes moved or freed
    pub bytes: u64,
    /// Whether the run stopped early on Ctrl+C
    pub interrupted: bool,
}

impl ActionReport {
    /// Check if every file was handled.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    /// One-line summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} file(s) handled, {}",
            self.succeeded.len(),
            bytesize::ByteSize::b(self.bytes)
        );
        if !self.all_succeeded() {
            line.push_str(&format!(", {} failed", self.failed.len()));
        }
        if self.interrupted {
            line.push_str(" (interrupted)");
        }
        line
    }
}

/// Applies report dispositions to the filesystem.
pub struct ActionExecutor {
    mode: ActionMode,
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for ActionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionExecutor")
            .field("mode", &self.mode)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl ActionExecutor {
    /// Create an executor for `mode`.
    #[must_use]
    pub fn new(mode: ActionMode) -> Self {
        Self {
            mode,
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

    /// Check the report and target before anything is touched.
    ///
    /// # Errors
    ///
    /// - `TargetMissing` / `TargetNotADirectory` for a bad move target
    /// - `AllCopiesRemoved` if any group has no `keep` member
    pub fn validate(&self, report: &Report) -> Result<(), ActionError> {
        if let ActionMode::Move(target) = &self.mode {
            match fs::metadata(target) {
                Ok(m) if m.is_dir() => {}
                Ok(_) => return Err(ActionError::TargetNotADirectory(target.clone())),
                Err(_) => return Err(ActionError::TargetMissing(target.clone())),
            }
        }

        let unsafe_groups = report.groups_without_keep();
        if !unsafe_groups.is_empty() {
            log::error!(
                "{} group(s) have every member tagged remove",
                unsafe_groups.len()
            );
            return Err(ActionError::AllCopiesRemoved(
                unsafe_groups.into_iter().map(str::to_string).collect(),
            ));
        }

        log::debug!("Pre-flight checks passed for {} group(s)", report.len());
        Ok(())
    }

    /// Validate, then handle every `remove` path.
    ///
    /// # Errors
    ///
    /// Only pre-flight failures are returned as `Err`. Per-file failures
    /// are collected in [`ActionReport::failed`].
    pub fn execute(&self, report: &Report) -> Result<ActionReport, ActionError> {
        self.validate(report)?;

        let total = report.counts().remove;
        let mut result = ActionReport::default();
        if total == 0 {
            log::info!("No files tagged remove, nothing to do");
            return Ok(result);
        }

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_start(PHASE_ACTIONS, total);
        }

        let mut done = 0;
        'groups: for (hash, members) in report.groups() {
            let keep_on_disk = members
                .iter()
                .filter(|(_, d)| **d == Disposition::Keep)
                .any(|(p, _)| Path::new(p).is_file());

            for (path, disposition) in members {
                if *disposition != Disposition::Remove {
                    continue;
                }
                if self.is_shutdown_requested() {
                    log::info!("Shutdown requested, stopping actions");
                    result.interrupted = true;
                    break 'groups;
                }

                done += 1;
                if let Some(ref callback) = self.progress_callback {
                    callback.on_progress(done, path);
                }

                let path = Path::new(path);
                let outcome = if keep_on_disk {
                    self.apply_one(path)
                } else {
                    log::debug!("Group {} has no kept copy on disk", hash);
                    Err(ActionError::NoKeptCopy(path.to_path_buf()))
                };

                match outcome {
                    Ok(bytes) => {
                        result.bytes += bytes;
                        result.succeeded.push(path.to_path_buf());
                    }
                    Err(e) => {
                        log::warn!("{}", e);
                        result.failed.push((path.to_path_buf(), e.to_string()));
                    }
                }
            }
        }

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_end(PHASE_ACTIONS);
        }

        log::info!("{}: {}", self.mode.verb(), result.summary());
        Ok(result)
    }

    fn apply_one(&self, path: &Path) -> Result<u64, ActionError> {
        match &self.mode {
            ActionMode::Move(target) => move_file(path, target),
            ActionMode::Trash => delete_to_trash(path),
            ActionMode::Delete => permanent_delete(path),
        }
    }
}
