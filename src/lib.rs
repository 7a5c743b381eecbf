//! dupefox - incremental duplicate file finder.
//!
//! Files are found by content in two steps, size first and BLAKE3 hash
//! second, on top of a persistent SQLite index that only re-reads what
//! changed. Results go into a reviewable JSON report; a rule can tag the
//! copies to drop, and the action executor moves, trashes or deletes them.
//!
//! Control flow: [`scanner`] → [`index`] → [`duplicates`] → [`report`] →
//! (human review) → [`rules`] → [`actions`].

pub mod actions;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod index;
pub mod logging;
pub mod progress;
pub mod report;
pub mod rules;
pub mod scanner;
pub mod signal;

use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bytesize::ByteSize;

use crate::actions::{ActionExecutor, ActionMode};
use crate::cli::{
    ApplyArgs, Cli, Commands, ReportArgs, ReportFormat, RuleArgs, ScanArgs, StatsArgs,
};
use crate::config::Config;
use crate::duplicates::{DuplicateResolver, ResolverConfig};
use crate::error::ExitCode;
use crate::index::{MetadataStore, SqliteIndex};
use crate::progress::{Progress, ProgressCallback};
use crate::report::{default_report_path, Report};
use crate::scanner::{Scanner, WalkerConfig};
use crate::signal::ShutdownHandler;

/// Everything a command handler needs besides its own arguments.
struct AppContext {
    config: Config,
    shutdown: ShutdownHandler,
    progress: Option<Arc<dyn ProgressCallback>>,
    quiet: bool,
}

/// Run one CLI invocation.
///
/// # Errors
///
/// Returns an error for anything that stops the command as a whole: a bad
/// configuration, an unusable index, a missing or malformed report, an
/// unknown rule, or a failed pre-flight check. Per-file problems are logged
/// and reflected in the returned [`ExitCode`] instead.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let config = Config::load(cli.config.as_deref())?;
    let progress: Option<Arc<dyn ProgressCallback>> =
        if !cli.quiet && std::io::stderr().is_terminal() {
            Some(Arc::new(Progress::new(false)))
        } else {
            None
        };
    let ctx = AppContext {
        config,
        shutdown: signal::install_handler(),
        progress,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Scan(args) => run_scan(&ctx, args),
        Commands::Report(args) => run_report(&ctx, args),
        Commands::Rule(args) => run_rule(&ctx, args),
        Commands::Apply(args) => run_apply(&ctx, args),
        Commands::Stats(args) => run_stats(&ctx, args),
        Commands::Config => run_config(&ctx, cli.config.as_deref()),
    }
}

impl AppContext {
    /// Open (creating if needed) the index.
    fn open_index(&self, flag: Option<&Path>, must_exist: bool) -> Result<Arc<SqliteIndex>> {
        let path = self.config.resolve_index_path(flag)?;
        if must_exist && !path.exists() {
            bail!(
                "Index not found: {} (run `dupefox scan <DIR>` first)",
                path.display()
            );
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create index directory: {}", parent.display())
            })?;
        }
        let index = SqliteIndex::open(&path)
            .with_context(|| format!("Failed to open index: {}", path.display()))?;
        Ok(Arc::new(index))
    }

    fn resolver(&self, index: Arc<SqliteIndex>, threads: Option<u16>) -> DuplicateResolver {
        let threads = threads.map_or(self.config.hash_threads, usize::from);
        let mut config = ResolverConfig::default()
            .with_hash_threads(threads)
            .with_shutdown_flag(self.shutdown.flag());
        if let Some(ref progress) = self.progress {
            config = config.with_progress_callback(Arc::clone(progress));
        }
        DuplicateResolver::new(index, config)
    }

    /// Print a result line unless `--quiet`.
    fn say(&self, line: impl std::fmt::Display) {
        if !self.quiet {
            println!("{line}");
        }
    }
}

fn run_scan(ctx: &AppContext, args: ScanArgs) -> Result<ExitCode> {
    let index = ctx.open_index(args.index.index.as_deref(), false)?;

    let mut patterns = ctx.config.ignore_patterns.clone();
    patterns.extend(args.ignore_patterns);

    let store: Arc<dyn MetadataStore> = index.clone();
    let mut scanner = Scanner::new(store, WalkerConfig::new(patterns))
        .with_shutdown_flag(ctx.shutdown.flag());
    if let Some(ref progress) = ctx.progress {
        scanner = scanner.with_progress_callback(Arc::clone(progress));
    }

    let summary = scanner
        .scan(&args.path)
        .with_context(|| format!("Scan of {} failed", args.path.display()))?;
    if summary.interrupted {
        return Ok(ExitCode::Interrupted);
    }

    let (groups, resolved) = ctx
        .resolver(index, args.hash_threads)
        .resolve()
        .context("Failed to refresh hashes")?;
    if resolved.interrupted {
        return Ok(ExitCode::Interrupted);
    }

    ctx.say(format!(
        "Indexed {} file(s) under {} ({} new, {} changed, {} pruned, {} skipped)",
        summary.files_seen,
        summary.root.display(),
        summary.inserted,
        summary.updated,
        summary.pruned,
        summary.errors + resolved.skipped
    ));
    ctx.say(format!(
        "{} duplicate group(s), {} redundant file(s), {} reclaimable",
        groups.len(),
        resolved.duplicate_files,
        ByteSize::b(resolved.reclaimable_bytes)
    ));
    Ok(ExitCode::Success)
}

fn run_report(ctx: &AppContext, args: ReportArgs) -> Result<ExitCode> {
    let index = ctx.open_index(args.index.index.as_deref(), true)?;
    let index_path = index
        .location()
        .map(Path::to_path_buf)
        .context("Index has no location on disk")?;

    let (groups, summary) = ctx
        .resolver(index, args.hash_threads)
        .resolve()
        .context("Failed to resolve duplicates")?;
    if summary.interrupted {
        log::warn!("Interrupted; no report written");
        return Ok(ExitCode::Interrupted);
    }

    let report = Report::from_groups(&groups);
    if args.stdout {
        let mut stdout = std::io::stdout().lock();
        match args.format {
            ReportFormat::Json => stdout.write_all(report.to_json()?.as_bytes())?,
            ReportFormat::Csv => report.write_csv(&mut stdout)?,
        }
        stdout.flush()?;
        return Ok(ExitCode::Success);
    }

    let path = args
        .output
        .unwrap_or_else(|| report_location(&index_path, args.format));
    match args.format {
        ReportFormat::Json => report.save(&path)?,
        ReportFormat::Csv => {
            let file = std::fs::File::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            report.write_csv(std::io::BufWriter::new(file))?;
        }
    }

    ctx.say(format!(
        "Wrote {} group(s) ({} files, {} reclaimable) to {}",
        report.len(),
        report.counts().keep,
        ByteSize::b(summary.reclaimable_bytes),
        path.display()
    ));
    Ok(ExitCode::Success)
}

/// `<index>.json` for task files, `<index>.csv` for the export.
fn report_location(index: &Path, format: ReportFormat) -> PathBuf {
    match format {
        ReportFormat::Json => default_report_path(index),
        ReportFormat::Csv => {
            let mut name = index.as_os_str().to_owned();
            name.push(".csv");
            PathBuf::from(name)
        }
    }
}

fn run_rule(ctx: &AppContext, args: RuleArgs) -> Result<ExitCode> {
    let name = match args.rule.or_else(|| ctx.config.default_rule.clone()) {
        Some(name) => name,
        None => bail!("No rule given and no default_rule configured"),
    };

    let mut report = Report::load(&args.report)?;
    let outcome = rules::apply(&mut report, &name)?;
    report.save(&args.report)?;

    ctx.say(format!(
        "{}: {} group(s), {} kept, {} tagged remove",
        name, outcome.groups, outcome.kept, outcome.removed
    ));
    Ok(ExitCode::Success)
}

fn run_apply(ctx: &AppContext, args: ApplyArgs) -> Result<ExitCode> {
    let mode = match (args.mode.move_to, args.mode.trash, args.mode.delete) {
        (Some(target), _, _) => ActionMode::Move(target),
        (None, true, _) => ActionMode::Trash,
        (None, false, true) => {
            if !args.yes {
                bail!("Permanent deletion cannot be undone; pass --yes to confirm");
            }
            ActionMode::Delete
        }
        (None, false, false) => bail!("No action mode given"),
    };

    let report = Report::load(&args.report)?;
    let mut executor = ActionExecutor::new(mode).with_shutdown_flag(ctx.shutdown.flag());
    if let Some(ref progress) = ctx.progress {
        executor = executor.with_progress_callback(Arc::clone(progress));
    }

    let result = executor.execute(&report)?;
    ctx.say(result.summary());
    for (path, reason) in &result.failed {
        log::debug!("Failed: {} ({})", path.display(), reason);
    }

    Ok(if result.interrupted {
        ExitCode::Interrupted
    } else if !result.all_succeeded() {
        ExitCode::PartialSuccess
    } else {
        ExitCode::Success
    })
}

fn run_stats(ctx: &AppContext, args: StatsArgs) -> Result<ExitCode> {
    let index = ctx.open_index(args.index.index.as_deref(), true)?;
    let stats = index.stats().context("Failed to read index statistics")?;

    if let Some(location) = index.location() {
        ctx.say(format!("Index:   {}", location.display()));
    }
    ctx.say(format!("Files:   {}", stats.records));
    ctx.say(format!("Hashed:  {}", stats.hashed));
    ctx.say(format!("Size:    {}", ByteSize::b(stats.total_bytes)));
    Ok(ExitCode::Success)
}

fn run_config(ctx: &AppContext, explicit: Option<&Path>) -> Result<ExitCode> {
    let source = explicit.map(Path::to_path_buf).or_else(Config::config_path);
    if let Some(path) = source {
        let state = if path.is_file() { "" } else { " (not found)" };
        println!("# config file: {}{}", path.display(), state);
    }
    let index = ctx.config.resolve_index_path(None)?;
    println!("# index: {}", index.display());
    print!("{}", ctx.config.to_toml()?);
    Ok(ExitCode::Success)
}
