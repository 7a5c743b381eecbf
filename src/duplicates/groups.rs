//! Confirmed duplicate groups.
//!
//! # Overview
//!
//! A [`DuplicateGroup`] is a set of two or more indexed files sharing both
//! size and BLAKE3 digest. Groups are transient: they are rebuilt from the
//! index on every resolution pass and never stored.
//!
//! # Example
//!
//! ```
//! use dupefox::duplicates::DuplicateGroup;
//! use std::path::PathBuf;
//!
//! let group = DuplicateGroup::new(
//!     [0u8; 32],
//!     1000,
//!     vec![PathBuf::from("/b.txt"), PathBuf::from("/a.txt")],
//! );
//!
//! assert_eq!(group.paths[0], PathBuf::from("/a.txt"));
//! assert_eq!(group.wasted_space(), 1000);
//! ```

use std::path::PathBuf;

use serde::Serialize;

use crate::scanner::{hash_to_hex, Hash};

/// A group of files with identical content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    /// BLAKE3 digest shared by every member
    pub hash: Hash,
    /// Size in bytes of each member
    pub size: u64,
    /// Member paths, sorted
    pub paths: Vec<PathBuf>,
}

impl DuplicateGroup {
    /// Create a group; paths are sorted and deduplicated.
    #[must_use]
    pub fn new(hash: Hash, size: u64, mut paths: Vec<PathBuf>) -> Self {
        paths.sort();
        paths.dedup();
        Self { hash, size, paths }
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Check if the group has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Total wasted space (all copies minus one).
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.size.saturating_mul(self.duplicate_count() as u64)
    }

    /// Number of redundant copies.
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.paths.len().saturating_sub(1)
    }

    /// Digest as lowercase hex, the key used in reports.
    #[must_use]
    pub fn hash_hex(&self) -> String {
        hash_to_hex(&self.hash)
    }
}
