//! SQLite-backed file index.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf, MAIN_SEPARATOR_STR};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};

use super::entry::{FileRecord, IndexStats, UpsertOutcome};
use super::MetadataStore;
use crate::scanner::{hash_to_hex, hex_to_hash, Hash};

/// Current on-disk schema version (stored in `PRAGMA user_version`).
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS files (
    path  TEXT PRIMARY KEY NOT NULL,
    size  INTEGER NOT NULL,
    mtime INTEGER NOT NULL,
    hash  TEXT
);
CREATE INDEX IF NOT EXISTS idx_files_size ON files(size);
CREATE INDEX IF NOT EXISTS idx_files_hash ON files(hash);
";

/// Errors raised by the index.
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    /// The index file could not be opened or is not a dupefox index.
    #[error("invalid index {path}: {reason}")]
    Malformed {
        /// Location of the index file
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// A query failed.
    #[error("index query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Paths are stored as text; non-UTF-8 paths cannot be indexed.
    #[error("path is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),

    /// A stored hash could not be decoded.
    #[error("corrupt hash for {path}: {value:?}")]
    CorruptHash {
        /// Path of the affected record
        path: PathBuf,
        /// Raw stored value
        value: String,
    },

    /// A previous holder of the connection panicked.
    #[error("index connection lock poisoned")]
    Poisoned,
}

/// Result alias for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Persistent file index using SQLite.
///
/// The connection sits behind a mutex so one handle can be shared between
/// components; writes are serialized through it.
pub struct SqliteIndex {
    conn: Mutex<Connection>,
    location: Option<PathBuf>,
}

impl std::fmt::Debug for SqliteIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteIndex")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl SqliteIndex {
    /// Open or create an index at the specified path.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Malformed`] if the file exists but is not a
    /// usable index (not SQLite, wrong table layout, newer schema).
    pub fn open(path: &Path) -> IndexResult<Self> {
        let malformed = |reason: String| IndexError::Malformed {
            path: path.to_path_buf(),
            reason,
        };

        let existed = path.exists();
        let conn = Connection::open(path).map_err(|e| malformed(e.to_string()))?;
        Self::prepare(&conn).map_err(|e| match e {
            IndexError::Sqlite(err) => malformed(err.to_string()),
            IndexError::Malformed { reason, .. } => malformed(reason),
            other => other,
        })?;

        if existed {
            log::debug!("Loaded existing index {}", path.display());
        } else {
            log::info!("Created new index {}", path.display());
        }

        Ok(Self {
            conn: Mutex::new(conn),
            location: Some(path.to_path_buf()),
        })
    }

    /// Open a throwaway in-memory index.
    pub fn open_in_memory() -> IndexResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::prepare(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            location: None,
        })
    }

    /// Location of the backing file, `None` for in-memory indexes.
    #[must_use]
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    fn prepare(conn: &Connection) -> IndexResult<()> {
        // journal_mode answers with a row, so it cannot go through execute_batch.
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        log::trace!("Index journal mode: {}", mode);
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.busy_timeout(Duration::from_secs(5))?;

        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version > SCHEMA_VERSION {
            return Err(IndexError::Malformed {
                path: PathBuf::new(),
                reason: format!(
                    "schema version {} is newer than supported version {}",
                    version, SCHEMA_VERSION
                ),
            });
        }

        conn.execute_batch(SCHEMA)?;
        conn.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;

        // Fails on a pre-existing `files` table with a foreign layout.
        conn.prepare("SELECT path, size, mtime, hash FROM files LIMIT 0")?;
        Ok(())
    }

    fn lock(&self) -> IndexResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| IndexError::Poisoned)
    }
}

fn path_key(path: &Path) -> IndexResult<&str> {
    path.to_str().ok_or_else(|| IndexError::NonUtf8Path(path.to_path_buf()))
}

fn size_to_db(size: u64) -> i64 {
    i64::try_from(size).unwrap_or(i64::MAX)
}

type RawRow = (String, i64, i64, Option<String>);

fn read_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn into_record((path, size, mtime, hash): RawRow) -> IndexResult<FileRecord> {
    let path = PathBuf::from(path);
    let hash = match hash {
        Some(hex) => Some(hex_to_hash(&hex).ok_or_else(|| IndexError::CorruptHash {
            path: path.clone(),
            value: hex.clone(),
        })?),
        None => None,
    };
    let record = FileRecord::new(path, u64::try_from(size).unwrap_or_default(), mtime);
    Ok(match hash {
        Some(hash) => record.with_hash(hash),
        None => record,
    })
}

/// Run a grouping query and fold rows into a map keyed by `key`.
fn collect_groups<K: Ord>(
    conn: &Connection,
    sql: &str,
    key: impl Fn(&FileRecord) -> Option<K>,
) -> IndexResult<BTreeMap<K, Vec<FileRecord>>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], read_raw)?;

    let mut groups: BTreeMap<K, Vec<FileRecord>> = BTreeMap::new();
    for row in rows {
        let record = into_record(row?)?;
        if let Some(k) = key(&record) {
            groups.entry(k).or_default().push(record);
        }
    }
    Ok(groups)
}

impl MetadataStore for SqliteIndex {
    fn get(&self, path: &Path) -> IndexResult<Option<FileRecord>> {
        let key = path_key(path)?;
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                "SELECT path, size, mtime, hash FROM files WHERE path = ?1",
                params![key],
                read_raw,
            )
            .optional()?;
        raw.map(into_record).transpose()
    }

    fn upsert(&self, path: &Path, size: u64, mtime: i64) -> IndexResult<UpsertOutcome> {
        let key = path_key(path)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let stored: Option<i64> = tx
            .query_row(
                "SELECT mtime FROM files WHERE path = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        let outcome = match stored {
            None => {
                tx.execute(
                    "INSERT INTO files (path, size, mtime, hash) VALUES (?1, ?2, ?3, NULL)",
                    params![key, size_to_db(size), mtime],
                )?;
                UpsertOutcome::Inserted
            }
            Some(old) if old != mtime => {
                tx.execute(
                    "UPDATE files SET size = ?2, mtime = ?3, hash = NULL WHERE path = ?1",
                    params![key, size_to_db(size), mtime],
                )?;
                UpsertOutcome::Updated
            }
            Some(_) => UpsertOutcome::Unchanged,
        };

        tx.commit()?;
        log::trace!("upsert {} -> {:?}", key, outcome);
        Ok(outcome)
    }

    fn set_hash(&self, path: &Path, hash: &Hash) -> IndexResult<()> {
        let key = path_key(path)?;
        let conn = self.lock()?;
        conn.execute(
            "UPDATE files SET hash = ?2 WHERE path = ?1",
            params![key, hash_to_hex(hash)],
        )?;
        Ok(())
    }

    fn refresh(&self, path: &Path, size: u64, mtime: i64, hash: &Hash) -> IndexResult<()> {
        let key = path_key(path)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO files (path, size, mtime, hash) VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(path) DO UPDATE SET \
                 size = excluded.size, mtime = excluded.mtime, hash = excluded.hash",
            params![key, size_to_db(size), mtime, hash_to_hex(hash)],
        )?;
        Ok(())
    }

    fn prune(&self, prefix: &Path, exists: &dyn Fn(&Path) -> bool) -> IndexResult<usize> {
        let exact = path_key(prefix)?;
        // Component-wise containment: "/data" must not match "/data-old/x".
        let under = if exact.ends_with(MAIN_SEPARATOR_STR) {
            exact.to_string()
        } else {
            format!("{exact}{MAIN_SEPARATOR_STR}")
        };

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let candidates: Vec<String> = {
            let mut stmt = tx.prepare(
                "SELECT path FROM files \
                 WHERE path = ?1 OR substr(path, 1, length(?2)) = ?2",
            )?;
            let rows = stmt.query_map(params![exact, under], |row| row.get(0))?;
            rows.collect::<rusqlite::Result<_>>()?
        };

        let mut removed = 0;
        {
            let mut delete = tx.prepare("DELETE FROM files WHERE path = ?1")?;
            for path in &candidates {
                if !exists(Path::new(path)) {
                    log::debug!("Pruning vanished file from index: {}", path);
                    removed += delete.execute(params![path])?;
                }
            }
        }

        tx.commit()?;
        Ok(removed)
    }

    fn group_by_size(&self) -> IndexResult<BTreeMap<u64, Vec<FileRecord>>> {
        let conn = self.lock()?;
        collect_groups(
            &conn,
            "SELECT path, size, mtime, hash FROM files \
             WHERE size IN (SELECT size FROM files GROUP BY size HAVING COUNT(*) > 1) \
             ORDER BY size, path",
            |record| Some(record.size),
        )
    }

    fn group_by_hash(&self) -> IndexResult<BTreeMap<Hash, Vec<FileRecord>>> {
        let conn = self.lock()?;
        collect_groups(
            &conn,
            "SELECT path, size, mtime, hash FROM files \
             WHERE hash IN (SELECT hash FROM files WHERE hash IS NOT NULL \
                            GROUP BY hash HAVING COUNT(*) > 1) \
             ORDER BY hash, path",
            |record| record.hash,
        )
    }

    fn stats(&self) -> IndexResult<IndexStats> {
        let conn = self.lock()?;
        let (records, hashed, total): (i64, i64, i64) = conn.query_row(
            "SELECT COUNT(*), COUNT(hash), COALESCE(SUM(size), 0) FROM files",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        Ok(IndexStats {
            records: u64::try_from(records).unwrap_or_default(),
            hashed: u64::try_from(hashed).unwrap_or_default(),
            total_bytes: u64::try_from(total).unwrap_or_default(),
        })
    }
}
