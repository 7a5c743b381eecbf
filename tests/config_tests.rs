//! Integration tests for layered configuration: defaults, TOML file,
//! `DUPEFOX_*` environment variables and CLI flags.

use clap::Parser;
use dupefox::cli::Cli;
use dupefox::config::Config;
use dupefox::error::ExitCode;
use dupefox::report::{Disposition, Report};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::tempdir;

static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Clear all DUPEFOX_* environment variables to avoid interference.
fn clear_env() {
    for (key, _) in std::env::vars() {
        if key.starts_with("DUPEFOX_") {
            std::env::remove_var(key);
        }
    }
}

#[test]
fn test_config_without_file_is_default() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let config = Config::load_from_path(None).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_config_load_from_toml() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
index_path = "/srv/dupefox/index.db"
hash_threads = 2
ignore_patterns = ["*.tmp", ".git/"]
default_rule = "keep-oldest"
"#,
    )
    .unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.index_path, Some(PathBuf::from("/srv/dupefox/index.db")));
    assert_eq!(config.hash_threads, 2);
    assert_eq!(config.ignore_patterns, vec!["*.tmp", ".git/"]);
    assert_eq!(config.default_rule.as_deref(), Some("keep-oldest"));
}

#[test]
fn test_partial_toml_keeps_other_defaults() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "hash_threads = 1\n").unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.hash_threads, 1);
    assert!(config.index_path.is_none());
    assert!(config.default_rule.is_none());
}

#[test]
fn test_env_overrides_toml() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "hash_threads = 2\ndefault_rule = \"keep-oldest\"\n").unwrap();

    std::env::set_var("DUPEFOX_HASH_THREADS", "8");
    std::env::set_var("DUPEFOX_DEFAULT_RULE", "keep-newest");
    let config = Config::load(Some(&path));
    clear_env();

    let config = config.unwrap();
    assert_eq!(config.hash_threads, 8);
    assert_eq!(config.default_rule.as_deref(), Some("keep-newest"));
}

#[test]
fn test_explicit_config_must_exist() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let err = Config::load(Some(&dir.path().join("missing.toml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
}

#[test]
fn test_invalid_values_rejected() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();

    let path = dir.path().join("zero.toml");
    fs::write(&path, "hash_threads = 0\n").unwrap();
    assert!(Config::load(Some(&path)).is_err());

    let path = dir.path().join("rule.toml");
    fs::write(&path, "default_rule = \"keep-biggest\"\n").unwrap();
    assert!(Config::load(Some(&path)).is_err());

    let path = dir.path().join("syntax.toml");
    fs::write(&path, "hash_threads = [\n").unwrap();
    assert!(Config::load(Some(&path)).is_err());
}

#[test]
fn test_config_file_drives_cli() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let data = tempdir().unwrap();
    let state = tempdir().unwrap();
    let index = state.path().join("configured.db");
    fs::write(data.path().join("a.txt"), b"copy").unwrap();
    fs::write(data.path().join("longer_copy.txt"), b"copy").unwrap();
    fs::write(data.path().join("drop.tmp"), b"copy").unwrap();

    let config = state.path().join("config.toml");
    fs::write(
        &config,
        format!(
            "index_path = {:?}\nignore_patterns = [\"*.tmp\"]\ndefault_rule = \"keep-shortest-path\"\n",
            index.to_str().unwrap()
        ),
    )
    .unwrap();
    let config = config.to_str().unwrap();
    let run = |args: &[&str]| {
        let mut argv = vec!["dupefox", "-q", "--config", config];
        argv.extend_from_slice(args);
        dupefox::run_app(Cli::try_parse_from(argv).unwrap()).unwrap()
    };

    assert_eq!(run(&["scan", data.path().to_str().unwrap()]), ExitCode::Success);
    assert!(index.exists());
    assert_eq!(run(&["report"]), ExitCode::Success);

    // No RULE argument: default_rule applies.
    let report_path = state.path().join("configured.db.json");
    assert_eq!(run(&["rule", report_path.to_str().unwrap()]), ExitCode::Success);

    let report = Report::load(&report_path).unwrap();
    let root = fs::canonicalize(data.path()).unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report.paths_with(Disposition::Remove), vec![root.join("longer_copy.txt")]);
}

#[test]
fn test_config_command_prints_effective_settings() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "hash_threads = 3\n").unwrap();

    let config = path.to_str().unwrap();
    let cli = Cli::try_parse_from(["dupefox", "-q", "--config", config, "config"]).unwrap();
    assert_eq!(dupefox::run_app(cli).unwrap(), ExitCode::Success);

    let rendered = Config::load(Some(&path)).unwrap().to_toml().unwrap();
    assert!(rendered.contains("hash_threads = 3"));
}
