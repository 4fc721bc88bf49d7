//! The StateMap: single source of truth for the current authoritative
//! binding of every tracked entity (spec.md section 4.3).

use crate::db::Db;
use crate::error::{Result, StorageError};
use rusqlite::{params, OptionalExtension};
use tinymem_core::{Confidence, EntityKey, EntityMetadata, EntityState, State};

#[derive(Clone)]
pub struct StateMap {
    db: Db,
}

impl StateMap {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn get(&self, entity_key: &EntityKey) -> Result<Option<EntityState>> {
        self.db.with_reader(|conn| {
            conn.query_row(
                "SELECT entity_key, filepath, symbol, artifact_hash, confidence, state, last_updated, metadata
                 FROM state_map WHERE entity_key = ?1",
                params![entity_key.as_str()],
                row_to_entity_state,
            )
            .optional()
            .map_err(StorageError::from)?
            .transpose()
        })
    }

    /// Upsert the row for `entity_key`. Callers are responsible for ensuring
    /// at most one AUTHORITATIVE row per entity exists across the whole map
    /// (the Runtime enforces this by superseding the prior row before
    /// calling `set` with a new AUTHORITATIVE one).
    pub fn set(
        &self,
        entity_key: &EntityKey,
        filepath: &str,
        symbol: &str,
        artifact_hash: &str,
        confidence: Confidence,
        state: State,
        metadata: &EntityMetadata,
    ) -> Result<()> {
        let metadata_json = serde_json::to_string(metadata)?;
        let now = chrono::Utc::now();
        self.db.with_writer(|conn| {
            conn.execute(
                "INSERT INTO state_map (entity_key, filepath, symbol, artifact_hash, confidence, state, last_updated, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(entity_key) DO UPDATE SET
                    filepath = excluded.filepath,
                    symbol = excluded.symbol,
                    artifact_hash = excluded.artifact_hash,
                    confidence = excluded.confidence,
                    state = excluded.state,
                    last_updated = excluded.last_updated,
                    metadata = excluded.metadata",
                params![
                    entity_key.as_str(),
                    filepath,
                    symbol,
                    artifact_hash,
                    confidence_str(confidence),
                    state.as_str(),
                    now.to_rfc3339(),
                    metadata_json,
                ],
            )?;
            Ok(())
        })
    }

    /// All entities currently AUTHORITATIVE, ordered `(filepath, symbol)`.
    pub fn get_authoritative(&self) -> Result<Vec<EntityState>> {
        self.query_where("state = ?1 ORDER BY filepath ASC, symbol ASC", params![State::Authoritative.as_str()])
    }

    pub fn get_by_filepath(&self, filepath: &str) -> Result<Vec<EntityState>> {
        self.query_where("filepath = ?1 ORDER BY symbol ASC", params![filepath])
    }

    pub fn get_by_symbol(&self, symbol: &str) -> Result<Vec<EntityState>> {
        self.query_where("symbol = ?1 ORDER BY filepath ASC", params![symbol])
    }

    pub fn get_all(&self) -> Result<Vec<EntityState>> {
        self.db.with_reader(|conn| {
            let mut stmt = conn.prepare(
                "SELECT entity_key, filepath, symbol, artifact_hash, confidence, state, last_updated, metadata
                 FROM state_map ORDER BY filepath ASC, symbol ASC",
            )?;
            collect_entity_states(&mut stmt, [])
        })
    }

    /// Used exclusively by tombstone retention expiry.
    pub fn delete(&self, entity_key: &EntityKey) -> Result<()> {
        self.db.with_writer(|conn| {
            conn.execute(
                "DELETE FROM state_map WHERE entity_key = ?1",
                params![entity_key.as_str()],
            )?;
            Ok(())
        })
    }

    pub fn count(&self) -> Result<u64> {
        self.db
            .with_reader(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM state_map", [], |r| r.get::<_, i64>(0))? as u64))
    }

    fn query_where(&self, clause: &str, bind: impl rusqlite::Params) -> Result<Vec<EntityState>> {
        let sql = format!(
            "SELECT entity_key, filepath, symbol, artifact_hash, confidence, state, last_updated, metadata
             FROM state_map WHERE {clause}"
        );
        self.db.with_reader(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            collect_entity_states(&mut stmt, bind)
        })
    }
}

fn collect_entity_states(
    stmt: &mut rusqlite::Statement<'_>,
    bind: impl rusqlite::Params,
) -> Result<Vec<EntityState>> {
    let rows = stmt
        .query_map(bind, row_to_entity_state)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().collect::<std::result::Result<Vec<_>, _>>()
}

fn confidence_str(c: Confidence) -> &'static str {
    match c {
        Confidence::Confirmed => "confirmed",
        Confidence::Inferred => "inferred",
        Confidence::Unresolved => "unresolved",
    }
}

fn confidence_from_str(s: &str) -> Result<Confidence> {
    match s {
        "confirmed" => Ok(Confidence::Confirmed),
        "inferred" => Ok(Confidence::Inferred),
        "unresolved" => Ok(Confidence::Unresolved),
        other => Err(StorageError::Validation(format!("unknown confidence {other}"))),
    }
}

fn row_to_entity_state(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<EntityState>> {
    let entity_key: String = row.get(0)?;
    let filepath: String = row.get(1)?;
    let symbol: String = row.get(2)?;
    let artifact_hash: String = row.get(3)?;
    let confidence_str_val: String = row.get(4)?;
    let state_str: String = row.get(5)?;
    let last_updated_str: String = row.get(6)?;
    let metadata_json: String = row.get(7)?;

    let built = (|| -> Result<EntityState> {
        let confidence = confidence_from_str(&confidence_str_val)?;
        let state = State::from_str(&state_str)
            .ok_or_else(|| StorageError::Validation(format!("unknown state {state_str}")))?;
        let metadata: EntityMetadata = serde_json::from_str(&metadata_json)?;
        let last_updated = chrono::DateTime::parse_from_rfc3339(&last_updated_str)
            .map(|d| d.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now());
        Ok(EntityState {
            entity_key: EntityKey(entity_key),
            filepath,
            symbol,
            artifact_hash,
            confidence,
            state,
            last_updated,
            metadata,
        })
    })();

    Ok(built)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_map() -> StateMap {
        StateMap::new(Db::open_in_memory().unwrap())
    }

    #[test]
    fn set_then_get_roundtrips() {
        let sm = state_map();
        let key = EntityKey::new("/math.go", "Add");
        sm.set(&key, "/math.go", "Add", "hash1", Confidence::Confirmed, State::Authoritative, &EntityMetadata { symbols: vec!["Add".into()], ast_node_count: Some(5) })
            .unwrap();

        let got = sm.get(&key).unwrap().unwrap();
        assert_eq!(got.artifact_hash, "hash1");
        assert_eq!(got.confidence, Confidence::Confirmed);
        assert_eq!(got.metadata.symbols, vec!["Add".to_string()]);
    }

    #[test]
    fn get_authoritative_excludes_other_states() {
        let sm = state_map();
        let k1 = EntityKey::new("/a.go", "A");
        let k2 = EntityKey::new("/a.go", "B");
        sm.set(&k1, "/a.go", "A", "h1", Confidence::Confirmed, State::Authoritative, &EntityMetadata::default()).unwrap();
        sm.set(&k2, "/a.go", "B", "h2", Confidence::Confirmed, State::Proposed, &EntityMetadata::default()).unwrap();

        let auth = sm.get_authoritative().unwrap();
        assert_eq!(auth.len(), 1);
        assert_eq!(auth[0].symbol, "A");
    }

    #[test]
    fn upsert_overwrites_prior_row() {
        let sm = state_map();
        let key = EntityKey::new("/a.go", "A");
        sm.set(&key, "/a.go", "A", "h1", Confidence::Confirmed, State::Authoritative, &EntityMetadata::default()).unwrap();
        sm.set(&key, "/a.go", "A", "h2", Confidence::Confirmed, State::Superseded, &EntityMetadata::default()).unwrap();

        assert_eq!(sm.count().unwrap(), 1);
        let got = sm.get(&key).unwrap().unwrap();
        assert_eq!(got.artifact_hash, "h2");
        assert_eq!(got.state, State::Superseded);
    }

    #[test]
    fn delete_removes_row() {
        let sm = state_map();
        let key = EntityKey::new("/a.go", "A");
        sm.set(&key, "/a.go", "A", "h1", Confidence::Confirmed, State::Tombstoned, &EntityMetadata::default()).unwrap();
        sm.delete(&key).unwrap();
        assert!(sm.get(&key).unwrap().is_none());
    }
}
