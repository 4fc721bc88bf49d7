//! Tombstone retention bookkeeping (spec.md section 4.7.5): the
//! episodes-remaining counter for each TOMBSTONED entity.

use crate::db::Db;
use crate::error::Result;
use rusqlite::{params, OptionalExtension};
use tinymem_core::EntityKey;

#[derive(Clone)]
pub struct TombstoneTracker {
    db: Db,
}

/// A pending tombstone retention row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tombstone {
    pub entity_key: EntityKey,
    pub retention_episodes_remaining: u32,
}

impl TombstoneTracker {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Start (or restart) the retention countdown for a newly-tombstoned
    /// entity.
    pub fn set(&self, entity_key: &EntityKey, retention_episodes: u32, episode_id: &str) -> Result<()> {
        self.db.with_writer(|conn| {
            conn.execute(
                "INSERT INTO tombstones (entity_key, retention_episodes_remaining, tombstoned_at_episode)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(entity_key) DO UPDATE SET
                    retention_episodes_remaining = excluded.retention_episodes_remaining,
                    tombstoned_at_episode = excluded.tombstoned_at_episode",
                params![entity_key.as_str(), retention_episodes, episode_id],
            )?;
            Ok(())
        })
    }

    pub fn get(&self, entity_key: &EntityKey) -> Result<Option<Tombstone>> {
        self.db.with_reader(|conn| {
            conn.query_row(
                "SELECT entity_key, retention_episodes_remaining FROM tombstones WHERE entity_key = ?1",
                params![entity_key.as_str()],
                |row| {
                    Ok(Tombstone {
                        entity_key: EntityKey(row.get(0)?),
                        retention_episodes_remaining: row.get::<_, i64>(1)? as u32,
                    })
                },
            )
            .optional()
            .map_err(crate::error::StorageError::from)
        })
    }

    /// Decrement every pending tombstone's counter by one episode and
    /// return those that have just reached zero (ready for StateMap
    /// deletion). Call once per finalized episode.
    pub fn tick_all(&self) -> Result<Vec<EntityKey>> {
        self.db.with_writer(|conn| {
            conn.execute(
                "UPDATE tombstones SET retention_episodes_remaining = retention_episodes_remaining - 1
                 WHERE retention_episodes_remaining > 0",
                [],
            )?;
            let mut stmt = conn.prepare(
                "SELECT entity_key FROM tombstones WHERE retention_episodes_remaining <= 0",
            )?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows.into_iter().map(EntityKey).collect())
        })
    }

    /// Remove the bookkeeping row once the StateMap row has been deleted.
    pub fn clear(&self, entity_key: &EntityKey) -> Result<()> {
        self.db.with_writer(|conn| {
            conn.execute(
                "DELETE FROM tombstones WHERE entity_key = ?1",
                params![entity_key.as_str()],
            )?;
            Ok(())
        })
    }

    /// Remove a pending tombstone if the entity is reinstated before expiry.
    pub fn cancel(&self, entity_key: &EntityKey) -> Result<()> {
        self.clear(entity_key)
    }
}
