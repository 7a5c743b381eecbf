//! Index-backed duplicate resolution.
//!
//! # Overview
//!
//! [`DuplicateResolver`] turns the index into confirmed duplicate groups in
//! three phases:
//!
//! 1. **Size grouping** - only sizes shared by two or more records are
//!    candidates. A file with a unique size is never read.
//! 2. **Hash refresh** - every candidate is re-stat'ed. A stored hash whose
//!    mtime still matches is kept; anything else is (re)hashed. Hashing runs
//!    on a bounded rayon pool, the resulting index writes happen afterwards
//!    on the calling thread.
//! 3. **Hash grouping** - hashes shared by two or more records form the
//!    groups. Only members confirmed against the disk in phase 2 are kept.
//!
//! # Example
//!
//! ```no_run
//! use dupefox::duplicates::{DuplicateResolver, ResolverConfig};
//! use dupefox::index::SqliteIndex;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let index = Arc::new(SqliteIndex::open(Path::new("index.db")).unwrap());
//! let resolver = DuplicateResolver::new(index, ResolverConfig::default());
//! let (groups, summary) = resolver.resolve().unwrap();
//!
//! println!("{} groups, {} bytes reclaimable", groups.len(), summary.reclaimable_bytes);
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use crate::index::{mtime_nanos, FileRecord, IndexResult, MetadataStore};
use crate::progress::{ProgressCallback, PHASE_HASH};
use crate::scanner::{hash_to_hex, is_indexable, Hash, HashError, Hasher};

use super::DuplicateGroup;

/// Default number of hashing threads.
pub const DEFAULT_HASH_THREADS: usize = 4;

/// Configuration for the resolver.
#[derive(Clone)]
pub struct ResolverConfig {
    /// Size of the hashing pool (I/O bound, keep small on spinning disks)
    pub hash_threads: usize,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback for the hashing phase.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for ResolverConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverConfig")
            .field("hash_threads", &self.hash_threads)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            hash_threads: DEFAULT_HASH_THREADS,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl ResolverConfig {
    /// Set the number of hashing threads (at least one).
    #[must_use]
    pub fn with_hash_threads(mut self, threads: usize) -> Self {
        self.hash_threads = threads.max(1);
        self
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
}

/// Counters from one resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ResolveSummary {
    /// Sizes shared by two or more records
    pub candidate_sizes: usize,
    /// Records in those sizes
    pub candidate_files: usize,
    /// Stored hashes confirmed by an unchanged mtime
    pub verified: usize,
    /// Stored hashes recomputed because the mtime moved
    pub rehashed: usize,
    /// Missing hashes computed
    pub hashed: usize,
    /// Candidates that vanished or could not be read
    pub skipped: usize,
    /// Confirmed duplicate groups
    pub groups: usize,
    /// Redundant copies across all groups
    pub duplicate_files: usize,
    /// Bytes freed if every redundant copy were removed
    pub reclaimable_bytes: u64,
    /// Whether hashing stopped early on Ctrl+C
    pub interrupted: bool,
}

/// What a hashing worker found for one candidate.
#[derive(Debug)]
enum Refresh {
    /// Stored hash still matches the on-disk mtime.
    Verified,
    /// Stored hash was stale and has been recomputed.
    Rehashed { size: u64, mtime: i64, hash: Hash },
    /// No stored hash; the file is as the scan saw it.
    Hashed { hash: Hash },
    /// No stored hash, and the file changed since the scan.
    HashedChanged { size: u64, mtime: i64, hash: Hash },
    /// The file vanished or could not be read.
    Failed(HashError),
    /// Skipped after a shutdown request.
    Interrupted,
}

/// Resolves duplicate groups from an index.
pub struct DuplicateResolver {
    store: Arc<dyn MetadataStore>,
    hasher: Hasher,
    config: ResolverConfig,
}

impl std::fmt::Debug for DuplicateResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplicateResolver")
            .field("hasher", &self.hasher)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DuplicateResolver {
    /// Create a resolver over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn MetadataStore>, config: ResolverConfig) -> Self {
        Self {
            store,
            hasher: Hasher::new(),
            config,
        }
    }

    /// Replace the hasher (mainly to tune the mmap threshold).
    #[must_use]
    pub fn with_hasher(mut self, hasher: Hasher) -> Self {
        self.hasher = hasher;
        self
    }

    /// Run all three phases.
    ///
    /// # Errors
    ///
    /// Only index failures are returned; per-file problems are logged and
    /// counted in [`ResolveSummary::skipped`].
    pub fn resolve(&self) -> IndexResult<(Vec<DuplicateGroup>, ResolveSummary)> {
        let (confirmed, mut summary) = self.refresh_hashes()?;
        let groups = self.confirmed_groups(&confirmed)?;

        summary.groups = groups.len();
        summary.duplicate_files = groups.iter().map(DuplicateGroup::duplicate_count).sum();
        summary.reclaimable_bytes = groups.iter().map(DuplicateGroup::wasted_space).sum();

        log::info!(
            "Found {} duplicate group(s): {} redundant file(s), {} reclaimable",
            summary.groups,
            summary.duplicate_files,
            bytesize::ByteSize::b(summary.reclaimable_bytes)
        );
        Ok((groups, summary))
    }

    /// Phases 1 and 2: bring hashes of all size-colliding records up to date.
    ///
    /// Returns the paths whose hash was confirmed against the disk in this
    /// pass, together with the counters collected so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read or written.
    pub fn refresh_hashes(&self) -> IndexResult<(HashSet<PathBuf>, ResolveSummary)> {
        let size_groups = self.store.group_by_size()?;
        let mut summary = ResolveSummary {
            candidate_sizes: size_groups.len(),
            ..Default::default()
        };

        let candidates: Vec<FileRecord> = size_groups.into_values().flatten().collect();
        summary.candidate_files = candidates.len();
        log::info!(
            "Phase 1: {} candidate file(s) in {} size group(s)",
            summary.candidate_files,
            summary.candidate_sizes
        );

        let results = self.hash_candidates(candidates);

        // Single writer: every index update happens here, on the calling thread.
        let mut confirmed = HashSet::with_capacity(results.len());
        for (record, refresh) in results {
            match refresh {
                Refresh::Verified => {
                    summary.verified += 1;
                    confirmed.insert(record.path);
                }
                Refresh::Rehashed { size, mtime, hash } => {
                    self.store.refresh(&record.path, size, mtime, &hash)?;
                    summary.rehashed += 1;
                    confirmed.insert(record.path);
                }
                Refresh::Hashed { hash } => {
                    self.store.set_hash(&record.path, &hash)?;
                    summary.hashed += 1;
                    confirmed.insert(record.path);
                }
                Refresh::HashedChanged { size, mtime, hash } => {
                    self.store.refresh(&record.path, size, mtime, &hash)?;
                    summary.hashed += 1;
                    confirmed.insert(record.path);
                }
                Refresh::Failed(e) => {
                    log::warn!("Skipping {}: {}", record.path.display(), e);
                    summary.skipped += 1;
                }
                Refresh::Interrupted => summary.interrupted = true,
            }
        }

        if summary.interrupted {
            log::info!("Phase 2: Interrupted by shutdown signal");
        }
        log::info!(
            "Phase 2 complete: {} verified, {} rehashed, {} hashed, {} skipped",
            summary.verified,
            summary.rehashed,
            summary.hashed,
            summary.skipped
        );
        Ok((confirmed, summary))
    }

    /// Phase 3: group confirmed records by hash.
    ///
    /// Members outside `confirmed` are dropped, and so is any group left
    /// with fewer than two members. Groups come back sorted by hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    pub fn confirmed_groups(
        &self,
        confirmed: &HashSet<PathBuf>,
    ) -> IndexResult<Vec<DuplicateGroup>> {
        let hash_groups: BTreeMap<Hash, Vec<FileRecord>> = self.store.group_by_hash()?;

        let groups = hash_groups
            .into_iter()
            .filter_map(|(hash, records)| {
                let size = records.first().map_or(0, |r| r.size);
                let paths: Vec<PathBuf> = records
                    .into_iter()
                    .filter(|r| confirmed.contains(&r.path))
                    .map(|r| r.path)
                    .collect();
                if paths.len() < 2 {
                    return None;
                }
                log::debug!(
                    "Duplicate group {}: {} files, {} bytes each",
                    hash_to_hex(&hash),
                    paths.len(),
                    size
                );
                Some(DuplicateGroup::new(hash, size, paths))
            })
            .collect();
        Ok(groups)
    }

    fn hash_candidates(&self, candidates: Vec<FileRecord>) -> Vec<(FileRecord, Refresh)> {
        if candidates.is_empty() {
            log::debug!("Phase 2: No candidates to hash");
            return Vec::new();
        }

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start(PHASE_HASH, candidates.len());
        }
        log::info!(
            "Phase 2: Refreshing hashes of {} file(s) on {} thread(s)",
            candidates.len(),
            self.config.hash_threads
        );

        let done = AtomicUsize::new(0);
        let work = || {
            candidates
                .into_par_iter()
                .map(|record| {
                    if self.config.is_shutdown_requested() {
                        return (record, Refresh::Interrupted);
                    }
                    let refresh = refresh_one(&self.hasher, &record);
                    let current = done.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(ref callback) = self.config.progress_callback {
                        callback.on_progress(current, &record.path.to_string_lossy());
                    }
                    (record, refresh)
                })
                .collect::<Vec<_>>()
        };

        let results = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.hash_threads.max(1))
            .build()
        {
            Ok(pool) => pool.install(work),
            Err(e) => {
                log::warn!(
                    "Failed to create hashing pool ({}), using global pool with {} threads",
                    e,
                    rayon::current_num_threads()
                );
                work()
            }
        };

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end(PHASE_HASH);
        }
        results
    }
}

/// Stat one candidate and hash it if its stored hash cannot be trusted.
fn refresh_one(hasher: &Hasher, record: &FileRecord) -> Refresh {
    let metadata = match std::fs::symlink_metadata(&record.path) {
        Ok(m) if is_indexable(&m) => m,
        Ok(_) => return Refresh::Failed(HashError::NotIndexable(record.path.clone())),
        Err(e) => return Refresh::Failed(HashError::from_io(&record.path, e)),
    };
    let mtime = match metadata.modified() {
        Ok(t) => mtime_nanos(t),
        Err(e) => return Refresh::Failed(HashError::from_io(&record.path, e)),
    };
    let size = metadata.len();

    if record.is_hashed() && mtime == record.mtime {
        log::trace!("Hash still valid: {}", record.path.display());
        return Refresh::Verified;
    }

    let hash = match hasher.full_hash(&record.path) {
        Ok(hash) => hash,
        Err(e) => return Refresh::Failed(e),
    };
    log::trace!("Hashed {}", record.path.display());

    if record.is_hashed() {
        Refresh::Rehashed { size, mtime, hash }
    } else if mtime == record.mtime && size == record.size {
        Refresh::Hashed { hash }
    } else {
        Refresh::HashedChanged { size, mtime, hash }
    }
}
