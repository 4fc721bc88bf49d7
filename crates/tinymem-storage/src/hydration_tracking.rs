//! Persisted hydration tracking: which entities were actually injected for
//! each episode, so the next episode can treat them as anchors
//! (spec.md section 4.8, "Hydration tracking").

use crate::db::Db;
use crate::error::Result;
use rusqlite::params;
use tinymem_core::EntityKey;

#[derive(Clone)]
pub struct HydrationTracker {
    db: Db,
}

impl HydrationTracker {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn record(&self, episode_id: &str, entity_key: &EntityKey) -> Result<()> {
        self.db.with_writer(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO hydration_tracking (episode_id, entity_key) VALUES (?1, ?2)",
                params![episode_id, entity_key.as_str()],
            )?;
            Ok(())
        })
    }

    /// Entities hydrated for `episode_id`.
    pub fn entities_for_episode(&self, episode_id: &str) -> Result<Vec<EntityKey>> {
        self.db.with_reader(|conn| {
            let mut stmt = conn
                .prepare("SELECT entity_key FROM hydration_tracking WHERE episode_id = ?1")?;
            let rows = stmt
                .query_map(params![episode_id], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows.into_iter().map(EntityKey).collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_then_lookup() {
        let tracker = HydrationTracker::new(Db::open_in_memory().unwrap());
        let key = EntityKey::new("/a.go", "Add");
        tracker.record("ep1", &key).unwrap();
        let entities = tracker.entities_for_episode("ep1").unwrap();
        assert_eq!(entities, vec![key]);
    }

    #[test]
    fn duplicate_record_is_ignored() {
        let tracker = HydrationTracker::new(Db::open_in_memory().unwrap());
        let key = EntityKey::new("/a.go", "Add");
        tracker.record("ep1", &key).unwrap();
        tracker.record("ep1", &key).unwrap();
        assert_eq!(tracker.entities_for_episode("ep1").unwrap().len(), 1);
    }
}
