//! Versioned, idempotent schema migrations, applied in filename-sorted order
//! on startup before any other I/O (spec.md section 5, storage-safety
//! invariant). Migration failure is fail-fast.

use crate::error::{Result, StorageError};
use rusqlite::Connection;

/// One embedded migration file, named the way it sorts on disk.
struct Migration {
    name: &'static str,
    sql: &'static str,
}

/// Migrations in filename-sorted order. Every statement in every migration
/// must be idempotent (`IF NOT EXISTS`), because `run` may be invoked against
/// a database that already has some or all of them applied.
const MIGRATIONS: &[Migration] = &[Migration {
    name: "0001_init.sql",
    sql: include_str!("migrations/0001_init.sql"),
}];

/// Apply every migration not yet recorded in `schema_migrations`, in order.
/// Bails out (without committing the in-progress migration) on first error.
pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            name       TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL
        );",
    )?;

    for (idx, migration) in MIGRATIONS.iter().enumerate() {
        let version = (idx + 1) as i64;
        let already_applied: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM schema_migrations WHERE name = ?1)",
                [migration.name],
                |row| row.get(0),
            )
            .map_err(StorageError::from)?;
        if already_applied {
            continue;
        }

        conn.execute_batch(migration.sql).map_err(|e| {
            StorageError::Migration(format!("{} failed: {e}", migration.name))
        })?;

        conn.execute(
            "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![version, migration.name, chrono::Utc::now().to_rfc3339()],
        )?;
        tracing::info!(migration = migration.name, "applied schema migration");
    }

    Ok(())
}
