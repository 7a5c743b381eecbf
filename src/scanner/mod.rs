//! Scanner module for directory traversal, hashing and index updates.
//!
//! This module provides functionality for:
//! - Parallel directory walking using jwalk
//! - Content hashing with BLAKE3
//! - Feeding the persistent index with what was found on disk
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and file discovery
//! - [`hasher`]: BLAKE3 file hashing (streaming / mmap)
//! - [`indexer`]: Prune + upsert pass over one subtree
//!
//! # Example
//!
//! ```no_run
//! use dupefox::index::SqliteIndex;
//! use dupefox::scanner::{Scanner, WalkerConfig};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let index = Arc::new(SqliteIndex::open(Path::new("index.db")).unwrap());
//! let scanner = Scanner::new(index, WalkerConfig::default());
//! let summary = scanner.scan(Path::new("/home/user/Pictures")).unwrap();
//! println!("{} files indexed, {} pruned", summary.files_seen, summary.pruned);
//! ```

pub mod hasher;
pub mod indexer;
pub mod walker;

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::index::IndexError;

// Re-export main types
pub use hasher::{hash_to_hex, hex_to_hash, Hash, Hasher, MMAP_THRESHOLD};
pub use indexer::{ScanSummary, Scanner};
pub use walker::Walker;

/// Metadata for a discovered file.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Canonical absolute path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modification time
    pub modified: SystemTime,
}

impl FileEntry {
    /// Create a new FileEntry.
    #[must_use]
    pub fn new(path: PathBuf, size: u64, modified: SystemTime) -> Self {
        Self {
            path,
            size,
            modified,
        }
    }
}

/// Configuration for directory walking.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Gitignore-style patterns for files to leave out of the index.
    pub ignore_patterns: Vec<String>,
}

impl WalkerConfig {
    /// Create a configuration with exclude patterns.
    #[must_use]
    pub fn new(ignore_patterns: Vec<String>) -> Self {
        Self { ignore_patterns }
    }
}

/// Errors that can occur during directory scanning.
///
/// Per-file variants are reported and skipped; only a bad root or an index
/// failure stops a scan.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The index rejected an update.
    #[error(transparent)]
    Index(#[from] IndexError),
}

impl ScanError {
    /// Classify an I/O error for `path`.
    #[must_use]
    pub fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}

/// Whether a file belongs in the index: a regular file (symlinks are not
/// followed) with at least one byte.
pub(crate) fn is_indexable(metadata: &std::fs::Metadata) -> bool {
    metadata.is_file() && metadata.len() > 0
}

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The path is no longer a regular non-empty file.
    #[error("Not a regular non-empty file: {0}")]
    NotIndexable(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl HashError {
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
