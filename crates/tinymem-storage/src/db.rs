//! The storage context: one writer connection guarded by a mutex, plus a
//! read-only connection for concurrent diagnostic reads. Passed explicitly
//! to every subsystem that needs it; there is no process-wide global.

use crate::error::Result;
use crate::migrations;
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::Arc;

/// Monotonic insertion-order counter, used to break ties when two rows share
/// a timestamp (spec.md section 2: "Ordering is by a monotonic timestamp;
/// ties broken by insertion order").
#[derive(Clone)]
pub struct Db {
    writer: Arc<Mutex<Connection>>,
    read_path: std::path::PathBuf,
}

impl Db {
    /// Open (creating if absent) the database at `path`, enable WAL mode if
    /// requested, and run pending migrations before returning.
    pub fn open(path: &Path, wal_mode: bool) -> Result<Self> {
        let writer = Connection::open(path)?;
        if wal_mode {
            writer.pragma_update(None, "journal_mode", "WAL")?;
        }
        writer.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&writer)?;

        Ok(Self {
            writer: Arc::new(Mutex::new(writer)),
            read_path: path.to_path_buf(),
        })
    }

    /// Open a private, in-memory database (tests only).
    pub fn open_in_memory() -> Result<Self> {
        let writer = Connection::open_in_memory()?;
        writer.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&writer)?;
        Ok(Self {
            writer: Arc::new(Mutex::new(writer)),
            read_path: std::path::PathBuf::new(),
        })
    }

    /// Run `f` against the single writer connection, serialized with every
    /// other writer in the process.
    pub fn with_writer<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.writer.lock();
        f(&conn)
    }

    /// Open (or reuse, for in-memory test databases) a read-only connection.
    /// Diagnostic queries use this so they never contend with the writer.
    pub fn with_reader<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        if self.read_path.as_os_str().is_empty() {
            // in-memory test database: no second connection possible, share the writer
            let conn = self.writer.lock();
            return f(&conn);
        }
        let conn = Connection::open_with_flags(
            &self.read_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        f(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_runs_migrations() {
        let db = Db::open_in_memory().unwrap();
        let count: i64 = db
            .with_reader(|c| {
                Ok(c
                    .query_row("SELECT COUNT(*) FROM schema_migrations", [], |r| r.get(0))
                    .unwrap())
            })
            .unwrap();
        assert!(count > 0);
    }

    #[test]
    fn open_on_disk_enables_wal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sqlite3");
        let db = Db::open(&path, true).unwrap();
        let mode: String = db
            .with_writer(|c| Ok(c.pragma_query_value(None, "journal_mode", |r| r.get(0))?))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }
}
