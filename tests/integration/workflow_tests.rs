//! Full scan → report → rule → apply cycles through the CLI entry point.

use clap::Parser;
use dupefox::cli::Cli;
use dupefox::error::ExitCode;
use dupefox::index::{MetadataStore, SqliteIndex};
use dupefox::report::{Disposition, Report};
use filetime::FileTime;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn run(args: &[&str]) -> anyhow::Result<ExitCode> {
    let mut argv = vec!["dupefox", "-q"];
    argv.extend_from_slice(args);
    dupefox::run_app(Cli::try_parse_from(argv).unwrap())
}

fn s(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_scan_report_rule_apply_move() {
    let data = tempdir().unwrap();
    let state = tempdir().unwrap();
    let quarantine = tempdir().unwrap();
    let index = state.path().join("index.db");

    fs::create_dir(data.path().join("backup")).unwrap();
    fs::write(data.path().join("a.txt"), b"duplicate payload").unwrap();
    fs::write(data.path().join("backup/a_copy.txt"), b"duplicate payload").unwrap();
    fs::write(data.path().join("single.txt"), b"only one of me").unwrap();

    assert_eq!(
        run(&["scan", s(data.path()), "--index", s(&index)]).unwrap(),
        ExitCode::Success
    );
    assert_eq!(run(&["report", "--index", s(&index)]).unwrap(), ExitCode::Success);

    let report_path = state.path().join("index.db.json");
    let report = Report::load(&report_path).unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report.counts().keep, 2);

    assert_eq!(
        run(&["rule", s(&report_path), "keep-shortest-path"]).unwrap(),
        ExitCode::Success
    );
    let report = Report::load(&report_path).unwrap();
    let root = fs::canonicalize(data.path()).unwrap();
    assert_eq!(
        report.paths_with(Disposition::Remove),
        vec![root.join("backup/a_copy.txt")]
    );

    assert_eq!(
        run(&["apply", s(&report_path), "--move-to", s(quarantine.path())]).unwrap(),
        ExitCode::Success
    );
    assert!(root.join("a.txt").exists());
    assert!(!root.join("backup/a_copy.txt").exists());
    assert_eq!(
        fs::read(quarantine.path().join("a_copy.txt")).unwrap(),
        b"duplicate payload"
    );

    // The next scan prunes the moved file and the duplicate is gone.
    run(&["scan", s(data.path()), "--index", s(&index)]).unwrap();
    run(&["report", "--index", s(&index)]).unwrap();
    assert!(Report::load(&report_path).unwrap().is_empty());
}

#[test]
fn test_duplicate_appears_after_incremental_rescan() {
    let data = tempdir().unwrap();
    let state = tempdir().unwrap();
    let quarantine = tempdir().unwrap();
    let index = state.path().join("index.db");
    let report_path = state.path().join("index.db.json");

    // Empty subtree: nothing indexed.
    assert_eq!(
        run(&["scan", s(data.path()), "--index", s(&index)]).unwrap(),
        ExitCode::Success
    );
    assert_eq!(SqliteIndex::open(&index).unwrap().stats().unwrap().records, 0);

    // Two files of different size and content: no size collision, no group.
    let a = data.path().join("a.txt");
    let b = data.path().join("b.txt");
    fs::write(&a, b"alpha").unwrap();
    fs::write(&b, b"bravo!!").unwrap();
    filetime::set_file_mtime(&b, FileTime::from_unix_time(1_600_000_000, 0)).unwrap();
    run(&["scan", s(data.path()), "--index", s(&index)]).unwrap();
    {
        let store = SqliteIndex::open(&index).unwrap();
        assert_eq!(store.stats().unwrap().records, 2);
        assert!(store.group_by_size().unwrap().is_empty());
    }
    run(&["report", "--index", s(&index)]).unwrap();
    assert!(Report::load(&report_path).unwrap().is_empty());

    // Overwrite b with a copy of a: the update moves it into a's size class.
    fs::copy(&a, &b).unwrap();
    filetime::set_file_mtime(&b, FileTime::from_unix_time(1_700_000_000, 0)).unwrap();
    run(&["scan", s(data.path()), "--index", s(&index)]).unwrap();
    {
        let store = SqliteIndex::open(&index).unwrap();
        let by_size = store.group_by_size().unwrap();
        assert_eq!(by_size.len(), 1);
        assert_eq!(by_size[&5].len(), 2);
    }
    run(&["report", "--index", s(&index)]).unwrap();

    let root = fs::canonicalize(data.path()).unwrap();
    let report = Report::load(&report_path).unwrap();
    assert_eq!(report.len(), 1);
    let (_, members) = report.groups().next().unwrap();
    let a_key = root.join("a.txt").to_string_lossy().into_owned();
    let b_key = root.join("b.txt").to_string_lossy().into_owned();
    assert_eq!(members.get(&a_key), Some(&Disposition::Keep));
    assert_eq!(members.get(&b_key), Some(&Disposition::Keep));
    assert_eq!(members.len(), 2);

    // Equal path lengths: the lexicographically smaller path is kept.
    run(&["rule", s(&report_path), "keep-shortest-path"]).unwrap();
    let report = Report::load(&report_path).unwrap();
    assert_eq!(report.paths_with(Disposition::Remove), vec![root.join("b.txt")]);

    assert_eq!(
        run(&["apply", s(&report_path), "--move-to", s(quarantine.path())]).unwrap(),
        ExitCode::Success
    );
    assert!(root.join("a.txt").exists());
    assert!(!root.join("b.txt").exists());
    assert_eq!(fs::read(quarantine.path().join("b.txt")).unwrap(), b"alpha");
}

#[test]
fn test_hand_edited_report_is_honored() {
    let data = tempdir().unwrap();
    let state = tempdir().unwrap();
    let quarantine = tempdir().unwrap();
    let index = state.path().join("index.db");
    let report_path = state.path().join("tasks.json");

    fs::write(data.path().join("short.txt"), b"abc").unwrap();
    fs::write(data.path().join("much_longer_name.txt"), b"abc").unwrap();

    run(&["scan", s(data.path()), "--index", s(&index)]).unwrap();
    run(&["report", "--index", s(&index), "-o", s(&report_path)]).unwrap();
    run(&["rule", s(&report_path), "keep-shortest-path"]).unwrap();

    // The reviewer flips the decision by editing the task file.
    let root = fs::canonicalize(data.path()).unwrap();
    let short = root.join("short.txt");
    let long = root.join("much_longer_name.txt");
    let text = fs::read_to_string(&report_path).unwrap();
    let mut value: serde_json::Value = serde_json::from_str(&text).unwrap();
    for members in value.as_object_mut().unwrap().values_mut() {
        let members = members.as_object_mut().unwrap();
        members.insert(long.to_string_lossy().into_owned(), "keep".into());
        members.insert(short.to_string_lossy().into_owned(), "rm".into());
    }
    let text = serde_json::to_string_pretty(&value).unwrap();
    fs::write(&report_path, text).unwrap();

    assert_eq!(
        run(&["apply", s(&report_path), "--move-to", s(quarantine.path())]).unwrap(),
        ExitCode::Success
    );
    assert!(long.exists());
    assert!(!short.exists());
    assert!(quarantine.path().join("short.txt").exists());
}

#[test]
fn test_csv_report_next_to_index() {
    let data = tempdir().unwrap();
    let state = tempdir().unwrap();
    let index = state.path().join("index.db");
    fs::write(data.path().join("one"), b"same bytes").unwrap();
    fs::write(data.path().join("two"), b"same bytes").unwrap();

    run(&["scan", s(data.path()), "--index", s(&index)]).unwrap();
    assert_eq!(
        run(&["report", "--index", s(&index), "--format", "csv"]).unwrap(),
        ExitCode::Success
    );

    let csv = fs::read_to_string(state.path().join("index.db.csv")).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("hash,path,disposition"));
    assert_eq!(lines.filter(|l| l.ends_with(",keep")).count(), 2);
}

#[test]
fn test_trash_mode_is_not_exercised_without_remove_tags() {
    let data = tempdir().unwrap();
    let state = tempdir().unwrap();
    let index = state.path().join("index.db");
    fs::write(data.path().join("x"), b"pair").unwrap();
    fs::write(data.path().join("y"), b"pair").unwrap();

    run(&["scan", s(data.path()), "--index", s(&index)]).unwrap();
    run(&["report", "--index", s(&index)]).unwrap();

    // Fresh report: everything is `keep`, so nothing reaches the trash.
    let report_path = state.path().join("index.db.json");
    assert_eq!(
        run(&["apply", s(&report_path), "--trash"]).unwrap(),
        ExitCode::Success
    );
    assert!(data.path().join("x").exists());
    assert!(data.path().join("y").exists());
}

#[test]
fn test_stats_after_scan() {
    let data = tempdir().unwrap();
    let state = tempdir().unwrap();
    let index = state.path().join("index.db");
    fs::write(data.path().join("x"), b"12345").unwrap();

    run(&["scan", s(data.path()), "--index", s(&index)]).unwrap();
    assert_eq!(run(&["stats", "--index", s(&index)]).unwrap(), ExitCode::Success);
}
