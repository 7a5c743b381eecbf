//! Command-line interface definitions for dupefox.
//!
//! The workflow is split into steps so a human can review in between:
//!
//! ```bash
//! # Index a tree (repeat any time; only changed files are re-read)
//! dupefox scan ~/Pictures
//!
//! # Write the duplicate report (task file) next to the index
//! dupefox report
//!
//! # Tag copies for removal, then review/edit the JSON by hand
//! dupefox rule ~/.local/share/dupefox/index.db.json keep-shortest-path
//!
//! # Carry out the removals
//! dupefox apply ~/.local/share/dupefox/index.db.json --move-to /mnt/quarantine
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Incremental duplicate file finder.
///
/// Keeps a persistent index of file sizes, modification times and BLAKE3
/// hashes, writes reviewable reports of duplicate groups, and moves, trashes
/// or deletes the copies you tag for removal.
#[derive(Debug, Parser)]
#[command(name = "dupefox")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print fatal errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (TOML)
    ///
    /// Defaults to config.toml in the platform config directory.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Index a directory tree and refresh hashes of size collisions
    Scan(ScanArgs),
    /// Write the duplicate report from the index
    Report(ReportArgs),
    /// Apply a resolution rule to a report
    Rule(RuleArgs),
    /// Move, trash or delete the files a report tags for removal
    Apply(ApplyArgs),
    /// Show index statistics
    Stats(StatsArgs),
    /// Print the effective configuration as TOML
    Config,
}

/// Index location, shared by commands that read the index.
#[derive(Debug, Args)]
pub struct IndexArgs {
    /// Index database file
    ///
    /// Defaults to `index_path` from the configuration, else index.db in the
    /// platform data directory.
    #[arg(long, value_name = "FILE")]
    pub index: Option<PathBuf>,
}

/// Arguments for the scan subcommand.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directory to scan
    #[arg(value_name = "DIR")]
    pub path: PathBuf,

    #[command(flatten)]
    pub index: IndexArgs,

    /// Gitignore-style pattern to exclude (can be specified multiple times)
    ///
    /// Added to `ignore_patterns` from the configuration.
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,

    /// Number of threads used for hashing (default: 4)
    ///
    /// Lower values reduce disk thrashing on HDDs.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub hash_threads: Option<u16>,
}

/// Arguments for the report subcommand.
#[derive(Debug, Args)]
pub struct ReportArgs {
    #[command(flatten)]
    pub index: IndexArgs,

    /// Report file to write (default: the index path with .json or .csv appended)
    #[arg(short, long, value_name = "FILE", conflicts_with = "stdout")]
    pub output: Option<PathBuf>,

    /// Write the report to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,

    /// Report format
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: ReportFormat,

    /// Number of threads used for hashing (default: 4)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub hash_threads: Option<u16>,
}

/// Arguments for the rule subcommand.
#[derive(Debug, Args)]
pub struct RuleArgs {
    /// Report (task file) to update in place
    #[arg(value_name = "REPORT")]
    pub report: PathBuf,

    /// Rule to apply: keep-shortest-path, keep-oldest or keep-newest
    ///
    /// Defaults to `default_rule` from the configuration.
    #[arg(value_name = "RULE")]
    pub rule: Option<String>,
}

/// How `apply` disposes of files tagged `remove`.
#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct ApplyMode {
    /// Move files into this existing directory
    #[arg(long, value_name = "DIR")]
    pub move_to: Option<PathBuf>,

    /// Move files to the system trash
    #[arg(long)]
    pub trash: bool,

    /// Delete files permanently (requires --yes)
    #[arg(long)]
    pub delete: bool,
}

/// Arguments for the apply subcommand.
#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Report (task file) to carry out
    #[arg(value_name = "REPORT")]
    pub report: PathBuf,

    #[command(flatten)]
    pub mode: ApplyMode,

    /// Confirm permanent deletion
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// Arguments for the stats subcommand.
#[derive(Debug, Args)]
pub struct StatsArgs {
    #[command(flatten)]
    pub index: IndexArgs,
}

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Editable task file, accepted by `rule` and `apply`
    Json,
    /// One row per file, for spreadsheets
    Csv,
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportFormat::Json => write!(f, "json"),
            ReportFormat::Csv => write!(f, "csv"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_help() {
        let result = Cli::try_parse_from(["dupefox", "--help"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_scan_with_options() {
        let cli = Cli::try_parse_from([
            "dupefox",
            "-v",
            "scan",
            "/path",
            "--index",
            "/tmp/i.db",
            "--ignore",
            "*.tmp",
            "--ignore",
            "node_modules/",
            "--hash-threads",
            "8",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Scan(args) => {
                assert_eq!(args.path, PathBuf::from("/path"));
                assert_eq!(args.index.index, Some(PathBuf::from("/tmp/i.db")));
                assert_eq!(args.ignore_patterns, vec!["*.tmp", "node_modules/"]);
                assert_eq!(args.hash_threads, Some(8));
            }
            _ => panic!("Expected Scan command"),
        }
    }

    #[test]
    fn test_cli_hash_threads_must_be_positive() {
        let result = Cli::try_parse_from(["dupefox", "scan", "/p", "--hash-threads", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["dupefox", "-v", "-q", "stats"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_report_defaults() {
        let cli = Cli::try_parse_from(["dupefox", "report"]).unwrap();
        match cli.command {
            Commands::Report(args) => {
                assert_eq!(args.format, ReportFormat::Json);
                assert!(args.output.is_none());
                assert!(!args.stdout);
            }
            _ => panic!("Expected Report command"),
        }
    }

    #[test]
    fn test_cli_report_output_conflicts_with_stdout() {
        let result = Cli::try_parse_from(["dupefox", "report", "-o", "r.json", "--stdout"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_rule_name_optional() {
        let cli = Cli::try_parse_from(["dupefox", "rule", "r.json"]).unwrap();
        match cli.command {
            Commands::Rule(args) => assert!(args.rule.is_none()),
            _ => panic!("Expected Rule command"),
        }
    }

    #[test]
    fn test_cli_apply_requires_exactly_one_mode() {
        assert!(Cli::try_parse_from(["dupefox", "apply", "r.json"]).is_err());
        assert!(
            Cli::try_parse_from(["dupefox", "apply", "r.json", "--trash", "--delete"]).is_err()
        );

        let cli =
            Cli::try_parse_from(["dupefox", "apply", "r.json", "--move-to", "/q"]).unwrap();
        match cli.command {
            Commands::Apply(args) => {
                assert_eq!(args.mode.move_to, Some(PathBuf::from("/q")));
                assert!(!args.mode.trash);
                assert!(!args.yes);
            }
            _ => panic!("Expected Apply command"),
        }
    }

    #[test]
    fn test_cli_config_command() {
        let cli = Cli::try_parse_from(["dupefox", "--config", "/etc/d.toml", "config"]).unwrap();
        assert!(matches!(cli.command, Commands::Config));
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "dupefox",
            "stats",
            "--json-errors",
            "--config",
            "/etc/dupefox.toml",
        ])
        .unwrap();
        assert!(cli.json_errors);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/dupefox.toml")));
    }
}
