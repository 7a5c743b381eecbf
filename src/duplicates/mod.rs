//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - Size-based candidate selection from the index (Phase 1)
//! - Hash refresh and re-verification of candidates (Phase 2)
//! - Hash grouping into confirmed duplicate groups (Phase 3)

pub mod finder;
pub mod groups;

pub use finder::{DuplicateResolver, ResolveSummary, ResolverConfig, DEFAULT_HASH_THREADS};
pub use groups::DuplicateGroup;
