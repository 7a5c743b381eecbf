//! Named resolution policies for reports.
//!
//! A rule walks every group of a [`Report`] independently and decides which
//! single member is kept; every other member is tagged `remove`. No file is
//! touched.
//!
//! | rule                 | keeps                                   |
//! |----------------------|-----------------------------------------|
//! | `keep-shortest-path` | the path with the fewest characters     |
//! | `keep-oldest`        | the member with the earliest mtime      |
//! | `keep-newest`        | the member with the latest mtime        |
//!
//! Ties go to the lexicographically smallest path.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;

use crate::index::mtime_nanos;
use crate::report::{Disposition, Report};

/// Minimum Jaro-Winkler similarity for a "did you mean" hint.
const SUGGESTION_THRESHOLD: f64 = 0.8;

/// Errors raised by the rule engine.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// No rule with this name exists.
    #[error("unknown rule '{name}'{}", suggestion_hint(.suggestion))]
    UnknownRule {
        /// The name that was asked for
        name: String,
        /// Closest known rule name, if any is close enough
        suggestion: Option<String>,
    },
}

fn suggestion_hint(suggestion: &Option<String>) -> String {
    suggestion
        .as_ref()
        .map(|s| format!(" (did you mean '{s}'?)"))
        .unwrap_or_default()
}

/// A resolution policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    /// Keep the path with the fewest characters.
    KeepShortestPath,
    /// Keep the member with the earliest modification time.
    KeepOldest,
    /// Keep the member with the latest modification time.
    KeepNewest,
}

impl Rule {
    /// Every rule, in the order they are listed to users.
    pub const ALL: [Rule; 3] = [Rule::KeepShortestPath, Rule::KeepOldest, Rule::KeepNewest];

    /// Canonical name, as accepted on the command line.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::KeepShortestPath => "keep-shortest-path",
            Self::KeepOldest => "keep-oldest",
            Self::KeepNewest => "keep-newest",
        }
    }

    /// Apply this rule to every group of `report`.
    ///
    /// mtime-based rules stat each member; members that cannot be stat'ed
    /// stay `keep`.
    pub fn apply(self, report: &mut Report) -> RuleOutcome {
        apply_with(report, self, &|path: &Path| {
            std::fs::metadata(path)
                .and_then(|m| m.modified())
                .map(mtime_nanos)
                .map_err(|e| log::warn!("Cannot stat {}: {}", path.display(), e))
                .ok()
        })
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Rule {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        if let Some(rule) = Self::ALL.into_iter().find(|r| r.name() == normalized) {
            return Ok(rule);
        }

        let suggestion = Self::ALL
            .into_iter()
            .map(|r| (r, strsim::jaro_winkler(&normalized, r.name())))
            .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(r, _)| r.name().to_string());

        Err(RuleError::UnknownRule {
            name: s.to_string(),
            suggestion,
        })
    }
}

/// Result of applying a rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RuleOutcome {
    /// Groups visited
    pub groups: usize,
    /// Members tagged `keep` afterwards
    pub kept: usize,
    /// Members tagged `remove` afterwards
    pub removed: usize,
}

/// Apply the rule called `name` to `report`.
///
/// # Errors
///
/// Returns [`RuleError::UnknownRule`] if `name` is not a known rule. The
/// report is left untouched in that case.
pub fn apply(report: &mut Report, name: &str) -> Result<RuleOutcome, RuleError> {
    let rule: Rule = name.parse()?;
    let outcome = rule.apply(report);
    log::info!(
        "Rule {} applied to {} group(s): {} kept, {} to remove",
        rule,
        outcome.groups,
        outcome.kept,
        outcome.removed
    );
    Ok(outcome)
}

fn apply_with(
    report: &mut Report,
    rule: Rule,
    mtime_of: &dyn Fn(&Path) -> Option<i64>,
) -> RuleOutcome {
    let mut outcome = RuleOutcome::default();

    for (hash, members) in report.groups_mut() {
        outcome.groups += 1;

        // Members without a usable key are left alone.
        let keyed: Vec<(&String, i64)> = members
            .keys()
            .filter_map(|path| sort_key(rule, path, mtime_of).map(|k| (path, k)))
            .collect();

        let keeper = keyed
            .iter()
            .min_by(|(pa, ka), (pb, kb)| ka.cmp(kb).then_with(|| pa.cmp(pb)))
            .map(|(p, _)| (*p).clone());

        let Some(keeper) = keeper else {
            log::warn!("Group {}: no member could be evaluated, keeping all", hash);
            outcome.kept += members.len();
            continue;
        };
        let decided: Vec<String> = keyed.into_iter().map(|(p, _)| p.clone()).collect();

        for (path, disposition) in members.iter_mut() {
            if *path == keeper {
                *disposition = Disposition::Keep;
            } else if decided.contains(path) {
                *disposition = Disposition::Remove;
            } else {
                *disposition = Disposition::Keep;
            }
            match disposition {
                Disposition::Keep => outcome.kept += 1,
                Disposition::Remove => outcome.removed += 1,
            }
        }
        log::debug!("Group {}: keeping {}", hash, keeper);
    }

    outcome
}

/// Smaller keys win.
fn sort_key(rule: Rule, path: &str, mtime_of: &dyn Fn(&Path) -> Option<i64>) -> Option<i64> {
    match rule {
        Rule::KeepShortestPath => Some(i64::try_from(path.chars().count()).unwrap_or(i64::MAX)),
        Rule::KeepOldest => mtime_of(Path::new(path)),
        Rule::KeepNewest => mtime_of(Path::new(path)).map(|m| m.saturating_neg()),
    }
}
