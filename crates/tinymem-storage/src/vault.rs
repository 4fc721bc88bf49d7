//! The Vault: immutable, content-addressed artifact store keyed by SHA-256
//! (spec.md section 4.1).

use crate::db::Db;
use crate::error::{Result, StorageError};
use rusqlite::{params, OptionalExtension};
use tinymem_core::{compute_hash, Artifact, ContentType};

/// Bit-exact persistent storage of every artifact crossing the proxy
/// boundary. No update, no delete operation exists.
#[derive(Clone)]
pub struct Vault {
    db: Db,
}

impl Vault {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Store `content` under `content_type`, returning its SHA-256 hex hash.
    /// Idempotent: if the hash already exists, returns without writing
    /// (content-only dedup -- identical bytes under any content_type
    /// collapse to one row).
    pub fn store(
        &self,
        content: &str,
        content_type: ContentType,
        token_count: Option<u32>,
    ) -> Result<String> {
        let hash = compute_hash(content.as_bytes());
        let now = chrono::Utc::now();
        let byte_size = content.len() as u64;

        self.db.with_writer(|conn| {
            conn.execute(
                "INSERT INTO vault_artifacts (hash, content, content_type, created_at, byte_size, token_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(hash) DO NOTHING",
                params![
                    hash,
                    content,
                    content_type.as_str(),
                    now.to_rfc3339(),
                    byte_size as i64,
                    token_count,
                ],
            )?;
            Ok(())
        })?;

        Ok(hash)
    }

    /// Fetch an artifact by hash. Not-found is `Ok(None)`, not an error.
    pub fn get(&self, hash: &str) -> Result<Option<Artifact>> {
        self.db.with_reader(|conn| {
            conn.query_row(
                "SELECT hash, content, content_type, created_at, byte_size, token_count
                 FROM vault_artifacts WHERE hash = ?1",
                params![hash],
                row_to_artifact,
            )
            .optional()
            .map_err(StorageError::from)
        })
    }

    pub fn exists(&self, hash: &str) -> Result<bool> {
        self.db.with_reader(|conn| {
            Ok(conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM vault_artifacts WHERE hash = ?1)",
                params![hash],
                |row| row.get(0),
            )?)
        })
    }

    /// Fetch multiple artifacts, preserving input order. Each slot is `None`
    /// if that hash is not present.
    pub fn get_multiple(&self, hashes: &[String]) -> Result<Vec<Option<Artifact>>> {
        hashes.iter().map(|h| self.get(h)).collect()
    }

    pub fn count(&self) -> Result<u64> {
        self.db
            .with_reader(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM vault_artifacts", [], |r| r.get::<_, i64>(0))? as u64))
    }

    pub fn count_by_type(&self) -> Result<Vec<(ContentType, u64)>> {
        self.db.with_reader(|conn| {
            let mut stmt = conn.prepare(
                "SELECT content_type, COUNT(*) FROM vault_artifacts GROUP BY content_type",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    let ct: String = row.get(0)?;
                    let n: i64 = row.get(1)?;
                    Ok((ct, n))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter()
                .map(|(ct, n)| {
                    ContentType::from_str(&ct)
                        .map(|c| (c, n as u64))
                        .ok_or_else(|| StorageError::Validation(format!("unknown content_type {ct}")))
                })
                .collect()
        })
    }
}

fn row_to_artifact(row: &rusqlite::Row<'_>) -> rusqlite::Result<Artifact> {
    let content_type_str: String = row.get(2)?;
    let content_type = ContentType::from_str(&content_type_str).unwrap_or(ContentType::Code);
    let created_at_str: String = row.get(3)?;
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
        .map(|d| d.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now());
    Ok(Artifact {
        hash: row.get(0)?,
        content: row.get(1)?,
        content_type,
        created_at,
        byte_size: row.get::<_, i64>(4)? as u64,
        token_count: row.get::<_, Option<i64>>(5)?.map(|v| v as u32),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault() -> Vault {
        Vault::new(Db::open_in_memory().unwrap())
    }

    #[test]
    fn store_is_idempotent() {
        let v = vault();
        let h1 = v.store("func Add() {}", ContentType::Code, None).unwrap();
        let h2 = v.store("func Add() {}", ContentType::Code, None).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(v.count().unwrap(), 1);
    }

    #[test]
    fn dedup_is_content_only_across_content_types() {
        let v = vault();
        let h1 = v.store("same bytes", ContentType::Code, None).unwrap();
        let h2 = v.store("same bytes", ContentType::UserInput, None).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(v.count().unwrap(), 1);
        // first write wins for content_type
        let artifact = v.get(&h1).unwrap().unwrap();
        assert_eq!(artifact.content_type, ContentType::Code);
    }

    #[test]
    fn get_missing_is_none_not_error() {
        let v = vault();
        assert!(v.get("deadbeef").unwrap().is_none());
    }

    #[test]
    fn hash_equals_sha256_of_content() {
        let v = vault();
        let content = "func Add(a, b int) int { return a + b }";
        let h = v.store(content, ContentType::Code, None).unwrap();
        assert_eq!(h, tinymem_core::compute_hash(content.as_bytes()));
    }

    #[test]
    fn get_multiple_preserves_order_with_holes() {
        let v = vault();
        let h1 = v.store("a", ContentType::Code, None).unwrap();
        let results = v
            .get_multiple(&[h1.clone(), "missing".to_string()])
            .unwrap();
        assert!(results[0].is_some());
        assert!(results[1].is_none());
    }
}
