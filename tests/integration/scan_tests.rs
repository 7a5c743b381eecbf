use dupefox::duplicates::{DuplicateResolver, ResolverConfig};
use dupefox::index::{MetadataStore, SqliteIndex};
use dupefox::scanner::{Scanner, WalkerConfig};
use filetime::FileTime;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

fn open(path: &Path) -> Arc<SqliteIndex> {
    Arc::new(SqliteIndex::open(path).unwrap())
}

fn resolver(index: &Arc<SqliteIndex>) -> DuplicateResolver {
    DuplicateResolver::new(index.clone(), ResolverConfig::default().with_hash_threads(2))
}

#[test]
fn test_scan_and_resolve_nested_duplicates() {
    let dir = tempdir().unwrap();
    let db_dir = tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("photos/2023")).unwrap();
    fs::write(root.join("photos/beach.jpg"), b"sand and sea").unwrap();
    fs::write(root.join("photos/2023/beach_copy.jpg"), b"sand and sea").unwrap();
    fs::write(root.join("notes.txt"), b"sand and SEA").unwrap();
    fs::write(root.join("other.txt"), b"unrelated").unwrap();

    let index = open(&db_dir.path().join("index.db"));
    let summary = Scanner::new(index.clone(), WalkerConfig::default())
        .scan(root)
        .unwrap();
    assert_eq!(summary.files_seen, 4);
    assert_eq!(summary.inserted, 4);

    let (groups, resolved) = resolver(&index).resolve().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 2);
    assert_eq!(groups[0].size, 12);
    // Same-size file with different content was hashed but is not a member.
    assert_eq!(resolved.candidate_files, 3);
    assert_eq!(resolved.hashed, 3);

    let canonical = fs::canonicalize(root).unwrap();
    assert!(groups[0]
        .paths
        .contains(&canonical.join("photos/2023/beach_copy.jpg")));
}

#[test]
fn test_ignore_patterns_keep_files_out_of_index() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("node_modules")).unwrap();
    fs::write(dir.path().join("node_modules/lib.js"), b"same").unwrap();
    fs::write(dir.path().join("a.js"), b"same").unwrap();
    fs::write(dir.path().join("b.tmp"), b"same").unwrap();

    let index = Arc::new(SqliteIndex::open_in_memory().unwrap());
    let config = WalkerConfig::new(vec!["node_modules/".to_string(), "*.tmp".to_string()]);
    let summary = Scanner::new(index.clone(), config).scan(dir.path()).unwrap();

    assert_eq!(summary.files_seen, 1);
    assert_eq!(index.stats().unwrap().records, 1);
}

#[test]
fn test_two_roots_share_one_index() {
    let first = tempdir().unwrap();
    let second = tempdir().unwrap();
    fs::write(first.path().join("x.bin"), b"shared bytes").unwrap();
    fs::write(second.path().join("y.bin"), b"shared bytes").unwrap();

    let index = Arc::new(SqliteIndex::open_in_memory().unwrap());
    let scanner = Scanner::new(index.clone(), WalkerConfig::default());
    scanner.scan(first.path()).unwrap();
    scanner.scan(second.path()).unwrap();

    let (groups, _) = resolver(&index).resolve().unwrap();
    assert_eq!(groups.len(), 1);

    // Deleting the second tree and rescanning it leaves the first alone.
    fs::remove_file(second.path().join("y.bin")).unwrap();
    let summary = scanner.scan(second.path()).unwrap();
    assert_eq!(summary.pruned, 1);
    assert_eq!(index.stats().unwrap().records, 1);

    let (groups, _) = resolver(&index).resolve().unwrap();
    assert!(groups.is_empty());
}

#[test]
fn test_modified_file_leaves_group_after_rescan() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.txt");
    let b = dir.path().join("b.txt");
    fs::write(&a, b"original").unwrap();
    fs::write(&b, b"original").unwrap();

    let index = Arc::new(SqliteIndex::open_in_memory().unwrap());
    let scanner = Scanner::new(index.clone(), WalkerConfig::default());
    scanner.scan(dir.path()).unwrap();
    let (groups, _) = resolver(&index).resolve().unwrap();
    assert_eq!(groups.len(), 1);

    // Same size, new content, later mtime.
    fs::write(&b, b"modified").unwrap();
    filetime::set_file_mtime(&b, FileTime::from_unix_time(2_000_000_000, 0)).unwrap();

    let summary = scanner.scan(dir.path()).unwrap();
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.unchanged, 1);

    let (groups, resolved) = resolver(&index).resolve().unwrap();
    assert!(groups.is_empty());
    assert_eq!(resolved.verified, 1);
    assert_eq!(resolved.hashed, 1);
}

#[test]
fn test_rescan_of_unchanged_tree_rehashes_nothing() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a"), b"twin").unwrap();
    fs::write(dir.path().join("b"), b"twin").unwrap();

    let index = Arc::new(SqliteIndex::open_in_memory().unwrap());
    let scanner = Scanner::new(index.clone(), WalkerConfig::default());
    scanner.scan(dir.path()).unwrap();
    resolver(&index).resolve().unwrap();

    let summary = scanner.scan(dir.path()).unwrap();
    assert_eq!(summary.unchanged, 2);
    let (groups, resolved) = resolver(&index).resolve().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(resolved.verified, 2);
    assert_eq!(resolved.hashed + resolved.rehashed, 0);
}
