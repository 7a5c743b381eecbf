use dupefox::index::{MetadataStore, SqliteIndex, UpsertOutcome};
use std::path::{Path, PathBuf};
use tempfile::tempdir;

#[test]
fn test_index_persists_across_reopen() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("index.db");

    {
        let index = SqliteIndex::open(&db).unwrap();
        index.upsert(Path::new("/data/a.txt"), 10, 1_000).unwrap();
        index.set_hash(Path::new("/data/a.txt"), &[7u8; 32]).unwrap();
    }

    let index = SqliteIndex::open(&db).unwrap();
    let record = index.get(Path::new("/data/a.txt")).unwrap().unwrap();
    assert_eq!(record.size, 10);
    assert_eq!(record.mtime, 1_000);
    assert_eq!(record.hash, Some([7u8; 32]));
    assert_eq!(index.location(), Some(db.as_path()));
}

#[test]
fn test_upsert_same_mtime_keeps_hash() {
    let index = SqliteIndex::open_in_memory().unwrap();
    let path = Path::new("/data/a.txt");

    assert_eq!(index.upsert(path, 10, 1).unwrap(), UpsertOutcome::Inserted);
    index.set_hash(path, &[1u8; 32]).unwrap();
    assert_eq!(index.upsert(path, 10, 1).unwrap(), UpsertOutcome::Unchanged);
    assert!(index.get(path).unwrap().unwrap().is_hashed());

    assert_eq!(index.upsert(path, 12, 2).unwrap(), UpsertOutcome::Updated);
    let record = index.get(path).unwrap().unwrap();
    assert_eq!(record.size, 12);
    assert!(!record.is_hashed());
}

#[test]
fn test_prune_only_touches_its_subtree() {
    let index = SqliteIndex::open_in_memory().unwrap();
    for path in ["/data/a.txt", "/data/sub/b.txt", "/data-old/c.txt", "/other/d.txt"] {
        index.upsert(Path::new(path), 5, 1).unwrap();
    }

    // Nothing exists on disk: everything under /data goes, nothing else.
    let removed = index.prune(Path::new("/data"), &|_: &Path| false).unwrap();
    assert_eq!(removed, 2);

    assert!(index.get(Path::new("/data/a.txt")).unwrap().is_none());
    assert!(index.get(Path::new("/data/sub/b.txt")).unwrap().is_none());
    assert!(index.get(Path::new("/data-old/c.txt")).unwrap().is_some());
    assert!(index.get(Path::new("/other/d.txt")).unwrap().is_some());
}

#[test]
fn test_prune_keeps_existing_files() {
    let index = SqliteIndex::open_in_memory().unwrap();
    index.upsert(Path::new("/data/keep.txt"), 5, 1).unwrap();
    index.upsert(Path::new("/data/gone.txt"), 5, 1).unwrap();

    let removed = index
        .prune(Path::new("/data"), &|p: &Path| p.ends_with("keep.txt"))
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(index.stats().unwrap().records, 1);
}

#[test]
fn test_group_by_size_and_hash() {
    let index = SqliteIndex::open_in_memory().unwrap();
    index.upsert(Path::new("/d/a"), 100, 1).unwrap();
    index.upsert(Path::new("/d/b"), 100, 1).unwrap();
    index.upsert(Path::new("/d/c"), 100, 1).unwrap();
    index.upsert(Path::new("/d/unique"), 7, 1).unwrap();

    let by_size = index.group_by_size().unwrap();
    assert_eq!(by_size.len(), 1);
    assert_eq!(by_size[&100].len(), 3);

    index.set_hash(Path::new("/d/a"), &[1u8; 32]).unwrap();
    index.set_hash(Path::new("/d/b"), &[1u8; 32]).unwrap();
    index.set_hash(Path::new("/d/c"), &[2u8; 32]).unwrap();

    let by_hash = index.group_by_hash().unwrap();
    assert_eq!(by_hash.len(), 1);
    let mut paths: Vec<PathBuf> = by_hash[&[1u8; 32]].iter().map(|r| r.path.clone()).collect();
    paths.sort();
    assert_eq!(paths, vec![PathBuf::from("/d/a"), PathBuf::from("/d/b")]);
}

#[test]
fn test_stats_counts_hashed_records() {
    let index = SqliteIndex::open_in_memory().unwrap();
    index.upsert(Path::new("/d/a"), 10, 1).unwrap();
    index.upsert(Path::new("/d/b"), 20, 1).unwrap();
    index.set_hash(Path::new("/d/a"), &[3u8; 32]).unwrap();

    let stats = index.stats().unwrap();
    assert_eq!(stats.records, 2);
    assert_eq!(stats.hashed, 1);
    assert_eq!(stats.total_bytes, 30);
}
