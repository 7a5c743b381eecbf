//! Reviewable duplicate reports (task files).
//!
//! A [`Report`] maps each duplicate group's hex digest to its members and
//! their [`Disposition`]:
//!
//! ```json
//! {
//!   "3f7a...": {
//!     "/photos/a.jpg": "keep",
//!     "/photos/copy of a.jpg": "remove"
//!   }
//! }
//! ```
//!
//! Keys are kept in sorted order and the file is indented, so a report can
//! be diffed and edited by hand between `report` and `apply`.

pub mod csv;
pub mod io;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::duplicates::DuplicateGroup;

pub use io::default_report_path;

/// What to do with one member of a duplicate group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    /// Leave the file where it is.
    #[default]
    Keep,
    /// Hand the file to the action executor. Older task files spell it `rm`.
    #[serde(alias = "rm")]
    Remove,
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keep => write!(f, "keep"),
            Self::Remove => write!(f, "remove"),
        }
    }
}

/// Errors raised while reading or writing reports.
#[derive(thiserror::Error, Debug)]
pub enum ReportError {
    /// The report file could not be read or written.
    #[error("report {path}: {source}")]
    Io {
        /// Location of the report
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The report file is not a valid report.
    #[error("malformed report {path}: {source}")]
    Parse {
        /// Location of the report
        path: PathBuf,
        /// What the parser rejected
        #[source]
        source: serde_json::Error,
    },

    /// Serialization failed.
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    /// CSV export failed.
    #[error("failed to export CSV: {0}")]
    Csv(#[from] ::csv::Error),
}

/// Number of members per disposition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispositionCounts {
    /// Members tagged `keep`
    pub keep: usize,
    /// Members tagged `remove`
    pub remove: usize,
}

/// Duplicate groups with a disposition per member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Report {
    groups: BTreeMap<String, BTreeMap<String, Disposition>>,
}

impl Report {
    /// Build a report in which every member is tagged `keep`.
    #[must_use]
    pub fn from_groups(groups: &[DuplicateGroup]) -> Self {
        let groups = groups
            .iter()
            .map(|group| {
                let members = group
                    .paths
                    .iter()
                    .map(|p| (p.to_string_lossy().into_owned(), Disposition::Keep))
                    .collect();
                (group.hash_hex(), members)
            })
            .collect();
        Self { groups }
    }

    /// Number of groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Check if the report holds no groups.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Members of one group.
    #[must_use]
    pub fn group(&self, hash: &str) -> Option<&BTreeMap<String, Disposition>> {
        self.groups.get(hash)
    }

    /// Iterate over `(hash, members)` in hash order.
    pub fn groups(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, Disposition>)> {
        self.groups.iter().map(|(h, m)| (h.as_str(), m))
    }

    /// Mutable access to every group's members, in hash order.
    pub fn groups_mut(
        &mut self,
    ) -> impl Iterator<Item = (&str, &mut BTreeMap<String, Disposition>)> {
        self.groups.iter_mut().map(|(h, m)| (h.as_str(), m))
    }

    /// Change the disposition of one member. Returns false if it is unknown.
    #[cfg(test)]
    pub(crate) fn set(&mut self, hash: &str, path: &str, disposition: Disposition) -> bool {
        match self.groups.get_mut(hash).and_then(|m| m.get_mut(path)) {
            Some(slot) => {
                *slot = disposition;
                true
            }
            None => false,
        }
    }

    /// All paths carrying `disposition`, in report order.
    #[must_use]
    pub fn paths_with(&self, disposition: Disposition) -> Vec<PathBuf> {
        self.groups
            .values()
            .flat_map(|members| members.iter())
            .filter(|(_, d)| **d == disposition)
            .map(|(p, _)| PathBuf::from(p))
            .collect()
    }

    /// Count members per disposition.
    #[must_use]
    pub fn counts(&self) -> DispositionCounts {
        let mut counts = DispositionCounts::default();
        for disposition in self.groups.values().flat_map(|m| m.values()) {
            match disposition {
                Disposition::Keep => counts.keep += 1,
                Disposition::Remove => counts.remove += 1,
            }
        }
        counts
    }

    /// Hashes of groups in which no member is kept.
    #[must_use]
    pub fn groups_without_keep(&self) -> Vec<&str> {
        self.groups
            .iter()
            .filter(|(_, members)| {
                !members.is_empty() && members.values().all(|d| *d == Disposition::Remove)
            })
            .map(|(h, _)| h.as_str())
            .collect()
    }
}
