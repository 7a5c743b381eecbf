//! Logging setup for dupefox.
//!
//! Uses the `log` facade with an `env_logger` backend. The level comes from,
//! in priority order:
//!
//! 1. `RUST_LOG` (if set)
//! 2. CLI flags: `-q` (errors only), `-v` (debug), `-vv` (trace)
//! 3. Default: info
//!
//! Per-file warnings from scanning, hashing and actions go through this
//! logger; command results are printed to stdout separately, so `-q` keeps
//! scripts quiet without hiding output they parse.
//!
//! Debug builds prefix each line with a timestamp (and the module path at
//! `-v` and above); release builds print `LEVEL message`.

use std::env;
use std::io::Write;

use env_logger::Builder;
use log::LevelFilter;

/// Initialize logging from CLI verbosity flags.
///
/// Call once at startup. A second call is ignored (the first logger stays
/// installed) and returns `false`.
///
/// # Example
///
/// ```rust,no_run
/// use dupefox::logging::init_logging;
///
/// init_logging(1, false);
/// log::debug!("visible with -v");
/// ```
pub fn init_logging(verbose: u8, quiet: bool) -> bool {
    let rust_log = env::var("RUST_LOG").ok();

    let mut builder = Builder::new();
    match rust_log {
        Some(ref filters) => {
            builder.parse_filters(filters);
        }
        None => {
            builder.filter_level(determine_level(verbose, quiet));
        }
    }
    configure_format(&mut builder, verbose);

    let installed = builder.try_init().is_ok();
    if installed {
        match rust_log {
            Some(filters) => log::debug!("Logging configured from RUST_LOG={}", filters),
            None => log::debug!(
                "Logging initialized at level: {:?}",
                determine_level(verbose, quiet)
            ),
        }
    }
    installed
}

/// Map CLI flags to a level; `quiet` wins over `verbose`.
fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn configure_format(builder: &mut Builder, verbose: u8) {
    #[cfg(debug_assertions)]
    {
        builder.format(move |buf, record| {
            let level = record.level();
            let style = buf.default_level_style(level);
            if verbose >= 1 {
                writeln!(
                    buf,
                    "{} {style}{:<5}{style:#} [{}] {}",
                    buf.timestamp_millis(),
                    level,
                    record.module_path().unwrap_or("unknown"),
                    record.args()
                )
            } else {
                writeln!(
                    buf,
                    "{} {style}{:<5}{style:#} {}",
                    buf.timestamp_seconds(),
                    level,
                    record.args()
                )
            }
        });
    }

    #[cfg(not(debug_assertions))]
    {
        let _ = verbose;
        builder.format(|buf, record| {
            let level = record.level();
            let style = buf.default_level_style(level);
            writeln!(buf, "{style}{:<5}{style:#} {}", level, record.args())
        });
    }
}
