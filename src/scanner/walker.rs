//! Directory walker implementation using jwalk for parallel traversal.
//!
//! # Overview
//!
//! [`Walker`] enumerates every regular, non-empty file below a root. Symbolic
//! links are never followed and never reported; devices, FIFOs and sockets
//! are skipped. Hidden files are included.
//!
//! Errors for single entries are yielded as [`ScanError`] values rather than
//! stopping iteration, so one unreadable directory does not end the walk.
//!
//! # Example
//!
//! ```no_run
//! use dupefox::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/home/user/Downloads"), WalkerConfig::default());
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{}: {} bytes", file.path.display(), file.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use jwalk::WalkDir;

use super::{FileEntry, ScanError, WalkerConfig};

/// Directory walker for parallel file discovery.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given path.
    ///
    /// Reported paths are `root` joined with the relative entry path, so a
    /// canonical root yields canonical file paths.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Build the exclude matcher from configured patterns.
    fn build_gitignore(&self) -> Option<Gitignore> {
        if self.config.ignore_patterns.is_empty() {
            return None;
        }

        let mut builder = GitignoreBuilder::new(&self.root);
        for pattern in &self.config.ignore_patterns {
            if let Err(e) = builder.add_line(None, pattern) {
                log::warn!("Invalid ignore pattern '{}': {}", pattern, e);
            }
        }

        match builder.build() {
            Ok(gitignore) if !gitignore.is_empty() => Some(gitignore),
            Ok(_) => None,
            Err(e) => {
                log::warn!("Failed to build ignore patterns: {}", e);
                None
            }
        }
    }

    fn should_ignore(&self, path: &Path, gitignore: &Option<Gitignore>) -> bool {
        match gitignore {
            Some(gi) if path.starts_with(&self.root) => gi
                .matched_path_or_any_parents(path, false)
                .is_ignore(),
            _ => false,
        }
    }

    /// Walk the directory tree, yielding file entries.
    pub fn walk(&self) -> impl Iterator<Item = Result<FileEntry, ScanError>> + '_ {
        let gitignore = self.build_gitignore();

        let walk_dir = WalkDir::new(&self.root)
            .follow_links(false)
            .skip_hidden(false)
            .process_read_dir(|_depth, _path, _read_dir_state, children| {
                // Sort children for deterministic output
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });
            });

        walk_dir.into_iter().filter_map(move |entry_result| {
            if self.is_shutdown_requested() {
                log::debug!("Walker: Shutdown requested, stopping iteration");
                return None;
            }

            match entry_result {
                Ok(entry) => {
                    let path = entry.path();
                    let file_type = entry.file_type();

                    if file_type.is_dir() {
                        if let Some(err) = entry.read_children_error.as_ref() {
                            log::warn!("Cannot read directory {}: {}", path.display(), err);
                            return Some(Err(self.jwalk_error(path, err)));
                        }
                        return None;
                    }

                    if file_type.is_symlink() {
                        log::trace!("Skipping symlink: {}", path.display());
                        return None;
                    }

                    if self.should_ignore(&path, &gitignore) {
                        log::trace!("Ignoring file: {}", path.display());
                        return None;
                    }

                    self.process_file_entry(path)
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.root.clone(), std::borrow::ToOwned::to_owned);
                    log::warn!("Walker error for {}: {}", path.display(), e);
                    Some(Err(self.jwalk_error(path, &e)))
                }
            }
        })
    }

    /// Stat a candidate and turn it into a [`FileEntry`] if it qualifies.
    fn process_file_entry(&self, path: PathBuf) -> Option<Result<FileEntry, ScanError>> {
        let metadata = match std::fs::symlink_metadata(&path) {
            Ok(m) => m,
            Err(e) => return Some(Err(self.handle_io_error(&path, e))),
        };

        // Devices, FIFOs, sockets
        if !metadata.is_file() {
            log::trace!("Skipping non-regular file: {}", path.display());
            return None;
        }

        let size = metadata.len();
        if size == 0 {
            log::debug!("Skipping empty file: {}", path.display());
            return None;
        }

        let modified = match metadata.modified() {
            Ok(t) => t,
            Err(e) => {
                log::debug!("No mtime for {} ({}), using epoch", path.display(), e);
                SystemTime::UNIX_EPOCH
            }
        };

        Some(Ok(FileEntry::new(path, size, modified)))
    }

    fn handle_io_error(&self, path: &Path, error: std::io::Error) -> ScanError {
        match error.kind() {
            std::io::ErrorKind::NotFound => {
                log::warn!("File vanished during scan: {}", path.display());
            }
            _ => log::warn!("Cannot stat {}: {}", path.display(), error),
        }
        ScanError::from_io(path, error)
    }

    fn jwalk_error(&self, path: PathBuf, error: &jwalk::Error) -> ScanError {
        match error.io_error() {
            Some(io) => ScanError::from_io(&path, std::io::Error::new(io.kind(), io.to_string())),
            None => ScanError::Io {
                path,
                source: std::io::Error::other(error.to_string()),
            },
        }
    }
}
