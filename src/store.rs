//! Persistent cache tier backed by an SQLite database.
//!
//! The store is a pure key-value upsert surface shared by every shell process
//! on the host. Rows are keyed by `(path, modified_ns, mode)`: a changed file
//! produces a new key, so nothing is ever invalidated explicitly and
//! concurrent writers for the same key always write the same logical value.
//!
//! The connection runs in WAL mode with a short busy timeout so readers never
//! wait long on a writer and a contended write fails soft.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use log::debug;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use crate::cache::CacheKey;
use crate::error::{Error, Result};
use crate::parser::ExposedCommand;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS content_cache (
    path        TEXT    NOT NULL,
    modified_ns INTEGER NOT NULL,
    mode        TEXT    NOT NULL,
    content     TEXT    NOT NULL,
    PRIMARY KEY (path, modified_ns, mode)
) WITHOUT ROWID;
CREATE TABLE IF NOT EXISTS ast_cache (
    path        TEXT    NOT NULL,
    modified_ns INTEGER NOT NULL,
    mode        TEXT    NOT NULL,
    commands    TEXT    NOT NULL,
    PRIMARY KEY (path, modified_ns, mode)
) WITHOUT ROWID;
";

/// Row counts of the persistent tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreRows {
    pub content: u64,
    pub ast: u64,
}

/// SQLite-backed persistent cache tier.
#[derive(Debug)]
pub struct PersistentStore {
    path: PathBuf,
    busy_timeout: Duration,
    conn: Mutex<Option<Connection>>,
    lookups: AtomicU64,
    batch_lookups: AtomicU64,
    writes: AtomicU64,
}

impl PersistentStore {
    /// Open (creating if needed) the store at `path`.
    ///
    /// This is the availability probe: a failure here means the cache runs
    /// memory-only for the rest of the process.
    pub fn open(path: impl Into<PathBuf>, busy_timeout: Duration) -> Result<Self> {
        let path = path.into();
        let conn = connect(&path, busy_timeout)?;
        Ok(Self {
            path,
            busy_timeout,
            conn: Mutex::new(Some(conn)),
            lookups: AtomicU64::new(0),
            batch_lookups: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of single-key lookups served so far.
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Number of keys looked up through batch loads so far.
    pub fn batch_lookups(&self) -> u64 {
        self.batch_lookups.load(Ordering::Relaxed)
    }

    /// Number of upserts performed so far.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Run `f` against a live connection, re-creating the database file if an
    /// external actor deleted it.
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut guard = self.conn.lock().map_err(|_| Error::LockPoisoned {
            context: "persistent cache connection".to_string(),
        })?;

        if guard.is_none() || !self.path.exists() {
            debug!("Re-creating persistent cache at {}", self.path.display());
            drop(guard.take());
            remove_sidecars(&self.path);
            *guard = Some(connect(&self.path, self.busy_timeout)?);
        }

        match guard.as_ref() {
            Some(conn) => f(conn),
            None => Err(Error::CacheStore {
                message: "connection unavailable".to_string(),
            }),
        }
    }

    pub fn get_content(&self, key: &CacheKey) -> Result<Option<String>> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.with_conn(|conn| {
            let content: Option<String> = conn
                .query_row(
                    "SELECT content FROM content_cache
                     WHERE path = ?1 AND modified_ns = ?2 AND mode = ?3",
                    params![key.path_str(), key.modified_ns, key.mode.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(content)
        })
    }

    pub fn put_content(&self, key: &CacheKey, content: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO content_cache (path, modified_ns, mode, content)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (path, modified_ns, mode) DO UPDATE SET content = excluded.content",
                params![key.path_str(), key.modified_ns, key.mode.as_str(), content],
            )?;
            Ok(())
        })?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn get_ast(&self, key: &CacheKey) -> Result<Option<Vec<ExposedCommand>>> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let raw: Option<String> = self.with_conn(|conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT commands FROM ast_cache
                     WHERE path = ?1 AND modified_ns = ?2 AND mode = ?3",
                    params![key.path_str(), key.modified_ns, key.mode.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(raw)
        })?;
        Ok(raw.and_then(|raw| decode_commands(key, &raw)))
    }

    pub fn put_ast(&self, key: &CacheKey, commands: &[ExposedCommand]) -> Result<()> {
        let encoded = serde_json::to_string(commands)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO ast_cache (path, modified_ns, mode, commands)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (path, modified_ns, mode) DO UPDATE SET commands = excluded.commands",
                params![key.path_str(), key.modified_ns, key.mode.as_str(), encoded],
            )?;
            Ok(())
        })?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Look up many content keys in one read transaction.
    pub fn load_content_batch(&self, keys: &[CacheKey]) -> Result<Vec<(CacheKey, String)>> {
        self.batch_lookups
            .fetch_add(keys.len() as u64, Ordering::Relaxed);
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let mut found = Vec::new();
            {
                let mut stmt = tx.prepare_cached(
                    "SELECT content FROM content_cache
                     WHERE path = ?1 AND modified_ns = ?2 AND mode = ?3",
                )?;
                for key in keys {
                    let content: Option<String> = stmt
                        .query_row(
                            params![key.path_str(), key.modified_ns, key.mode.as_str()],
                            |row| row.get(0),
                        )
                        .optional()?;
                    if let Some(content) = content {
                        found.push((key.clone(), content));
                    }
                }
            }
            tx.commit()?;
            Ok(found)
        })
    }

    /// Look up many AST keys in one read transaction.
    pub fn load_ast_batch(&self, keys: &[CacheKey]) -> Result<Vec<(CacheKey, Vec<ExposedCommand>)>> {
        self.batch_lookups
            .fetch_add(keys.len() as u64, Ordering::Relaxed);
        let rows = self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let mut found = Vec::new();
            {
                let mut stmt = tx.prepare_cached(
                    "SELECT commands FROM ast_cache
                     WHERE path = ?1 AND modified_ns = ?2 AND mode = ?3",
                )?;
                for key in keys {
                    let raw: Option<String> = stmt
                        .query_row(
                            params![key.path_str(), key.modified_ns, key.mode.as_str()],
                            |row| row.get(0),
                        )
                        .optional()?;
                    if let Some(raw) = raw {
                        found.push((key.clone(), raw));
                    }
                }
            }
            tx.commit()?;
            Ok(found)
        })?;

        Ok(rows
            .into_iter()
            .filter_map(|(key, raw)| decode_commands(&key, &raw).map(|commands| (key, commands)))
            .collect())
    }

    pub fn row_counts(&self) -> Result<StoreRows> {
        self.with_conn(|conn| {
            let content: i64 =
                conn.query_row("SELECT COUNT(*) FROM content_cache", [], |row| row.get(0))?;
            let ast: i64 = conn.query_row("SELECT COUNT(*) FROM ast_cache", [], |row| row.get(0))?;
            Ok(StoreRows {
                content: u64::try_from(content).unwrap_or(0),
                ast: u64::try_from(ast).unwrap_or(0),
            })
        })
    }

    /// Delete every row. Returns the number of rows removed.
    pub fn clear(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let content = conn.execute("DELETE FROM content_cache", [])?;
            let ast = conn.execute("DELETE FROM ast_cache", [])?;
            Ok(content + ast)
        })
    }
}

/// Whether an error means another process holds the database lock.
pub fn is_busy(error: &Error) -> bool {
    matches!(
        error,
        Error::Sqlite(rusqlite::Error::SqliteFailure(e, _))
            if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

fn connect(path: &Path, busy_timeout: Duration) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path)?;
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

/// Remove WAL and shared-memory files left behind by a deleted database so
/// they are not replayed into the freshly created one.
fn remove_sidecars(path: &Path) {
    if path.exists() {
        return;
    }
    for suffix in ["-wal", "-shm"] {
        let mut sidecar = path.as_os_str().to_owned();
        sidecar.push(suffix);
        let _ = fs::remove_file(PathBuf::from(sidecar));
    }
}

fn decode_commands(key: &CacheKey, raw: &str) -> Option<Vec<ExposedCommand>> {
    match serde_json::from_str(raw) {
        Ok(commands) => Some(commands),
        Err(e) => {
            debug!(
                "Ignoring undecodable cache row for {}: {}",
                key.path.display(),
                e
            );
            None
        }
    }
}
