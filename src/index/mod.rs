//! Persistent file index for dupefox.
//!
//! The index maps canonical absolute paths to `{size, mtime, hash?}` and is
//! the single source of truth for everything the duplicate resolver knows.
//! It is updated incrementally: re-scanning an unchanged tree leaves it
//! untouched, and a changed modification time voids the stored hash.
//!
//! # Architecture
//!
//! * [`MetadataStore`]: storage-agnostic interface used by the scanner and
//!   the resolver. Components receive an explicit handle; there is no global
//!   connection.
//! * [`database`]: SQLite-backed implementation, [`SqliteIndex`].
//! * [`entry`]: the record types stored in the index.
//!
//! # Staleness Invalidation
//!
//! | stored       | observed mtime | effect                          |
//! |--------------|----------------|---------------------------------|
//! | absent       | any            | insert, no hash                 |
//! | present      | same           | no-op, hash stays valid         |
//! | present      | different      | size/mtime replaced, hash clear |

pub mod database;
pub mod entry;

use std::collections::BTreeMap;
use std::path::Path;

pub use database::{IndexError, IndexResult, SqliteIndex};
pub use entry::{mtime_nanos, FileRecord, IndexStats, UpsertOutcome};

use crate::scanner::Hash;

/// Storage interface for the file index.
///
/// Every mutating call is durable when it returns.
pub trait MetadataStore: Send + Sync {
    /// Fetch the record for a path.
    fn get(&self, path: &Path) -> IndexResult<Option<FileRecord>>;

    /// Insert a new path or refresh an existing one.
    ///
    /// An existing record with the same `mtime` is left as is (including its
    /// hash). A different `mtime` replaces size and mtime and clears the hash.
    fn upsert(&self, path: &Path, size: u64, mtime: i64) -> IndexResult<UpsertOutcome>;

    /// Record a freshly computed hash.
    ///
    /// The caller is responsible for having checked freshness against the
    /// stored mtime.
    fn set_hash(&self, path: &Path, hash: &Hash) -> IndexResult<()>;

    /// Replace size, mtime and hash of a path in one step.
    fn refresh(&self, path: &Path, size: u64, mtime: i64, hash: &Hash) -> IndexResult<()>;

    /// Remove records at or below `prefix` for which `exists` returns false.
    ///
    /// Records outside `prefix` are never touched, so other subtrees held in
    /// the same index are unaffected. Returns the number of removed records.
    fn prune(&self, prefix: &Path, exists: &dyn Fn(&Path) -> bool) -> IndexResult<usize>;

    /// All sizes shared by more than one record, with their records.
    fn group_by_size(&self) -> IndexResult<BTreeMap<u64, Vec<FileRecord>>>;

    /// All hashes shared by more than one record, with their records.
    fn group_by_hash(&self) -> IndexResult<BTreeMap<Hash, Vec<FileRecord>>>;

    /// Aggregate counters.
    fn stats(&self) -> IndexResult<IndexStats>;
}
