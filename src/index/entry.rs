//! Index record definitions.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::scanner::Hash;

/// A single file known to the index.
///
/// The `hash`, when present, is valid for the contents observed at `mtime`.
/// A different `mtime` means the digest must be recomputed before the file
/// may take part in a duplicate group again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Canonical absolute path (primary key)
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Modification time in nanoseconds since the Unix epoch
    pub mtime: i64,
    /// BLAKE3 content digest, absent until computed
    pub hash: Option<Hash>,
}

impl FileRecord {
    /// Create a record without a hash.
    #[must_use]
    pub fn new(path: PathBuf, size: u64, mtime: i64) -> Self {
        Self {
            path,
            size,
            mtime,
            hash: None,
        }
    }

    /// Attach a content hash.
    #[must_use]
    pub fn with_hash(mut self, hash: Hash) -> Self {
        self.hash = Some(hash);
        self
    }

    /// Whether a content hash has been recorded.
    #[must_use]
    pub fn is_hashed(&self) -> bool {
        self.hash.is_some()
    }
}

/// What an upsert did to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The path was new and has been inserted without a hash.
    Inserted,
    /// The mtime changed: size and mtime were replaced and the hash cleared.
    Updated,
    /// Same mtime as recorded; nothing changed.
    Unchanged,
}

/// Aggregate counters over the whole index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Number of records
    pub records: u64,
    /// Number of records with a content hash
    pub hashed: u64,
    /// Sum of all recorded sizes in bytes
    pub total_bytes: u64,
}

/// Convert a filesystem timestamp into the index representation.
///
/// Times before the epoch map to negative values; anything outside the
/// `i64` nanosecond range saturates.
#[must_use]
pub fn mtime_nanos(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_nanos()).unwrap_or(i64::MAX),
        Err(before) => i64::try_from(before.duration().as_nanos())
            .map(|n| -n)
            .unwrap_or(i64::MIN),
    }
}
