//! The ETV Checker (spec.md section 4.6): detects divergence between the
//! StateMap's belief about an entity's content and the bytes currently on
//! disk. Strictly read-only. Disk is authoritative for verification, never
//! for mutation.

use crate::cache::EtvCache;
use crate::file_reader::{FileReader, ReadOutcome};
use tinymem_core::{compute_hash, Confidence, EntityState};

/// Derived, never stored (spec.md section 3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ETVResult {
    pub entity_key: String,
    pub is_stale: bool,
    pub disk_hash: Option<String>,
    pub state_map_hash: String,
    pub file_exists: bool,
    pub file_read_error: Option<String>,
    pub skip_reason: Option<String>,
}

impl ETVResult {
    fn skipped(entity: &EntityState, reason: &str) -> Self {
        Self {
            entity_key: entity.entity_key.as_str().to_string(),
            is_stale: false,
            disk_hash: None,
            state_map_hash: entity.artifact_hash.clone(),
            file_exists: true,
            file_read_error: None,
            skip_reason: Some(reason.to_string()),
        }
    }
}

pub struct EtvChecker {
    reader: Box<dyn FileReader>,
    cache: EtvCache,
}

impl EtvChecker {
    pub fn new(reader: Box<dyn FileReader>, cache: EtvCache) -> Self {
        Self { reader, cache }
    }

    /// Check `entity` against disk. Skips (returns non-stale) if confidence
    /// is not CONFIRMED or the filepath is unknown. A single read attempt,
    /// no retries. Read errors leave `is_stale = false` but record the error
    /// -- callers (the Runtime) must treat an unreadable file as a reason to
    /// block promotion regardless of the `is_stale` flag.
    pub fn check(&self, entity: &EntityState) -> ETVResult {
        if entity.confidence != Confidence::Confirmed {
            return ETVResult::skipped(entity, "confidence_not_confirmed");
        }
        if entity.filepath.is_empty() || entity.filepath == "unknown" {
            return ETVResult::skipped(entity, "filepath_absent");
        }

        if let Some((disk_hash, exists)) = self.cache.get(&entity.filepath) {
            return self.build_result(entity, disk_hash, exists, None);
        }

        let (disk_hash, exists, error) = match self.reader.read(&entity.filepath) {
            ReadOutcome::Found(bytes) => (Some(compute_hash(&bytes)), true, None),
            ReadOutcome::NotFound => (None, false, None),
            ReadOutcome::Error(e) => (None, true, Some(e)),
        };

        if error.is_none() {
            self.cache.put(&entity.filepath, disk_hash.clone(), exists);
        }

        self.build_result(entity, disk_hash, exists, error)
    }

    fn build_result(
        &self,
        entity: &EntityState,
        disk_hash: Option<String>,
        exists: bool,
        error: Option<String>,
    ) -> ETVResult {
        // Conservative position per spec.md section 9's open question: a
        // missing file is STALE=true, not a special case.
        let is_stale = if error.is_some() {
            false
        } else {
            !exists || disk_hash.as_deref() != Some(entity.artifact_hash.as_str())
        };

        ETVResult {
            entity_key: entity.entity_key.as_str().to_string(),
            is_stale,
            disk_hash,
            state_map_hash: entity.artifact_hash.clone(),
            file_exists: exists,
            file_read_error: error,
            skip_reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tinymem_core::{EntityKey, EntityMetadata, State};

    struct StubReader(ReadOutcome);
    impl FileReader for StubReader {
        fn read(&self, _absolute_path: &str) -> ReadOutcome {
            self.0.clone()
        }
    }

    fn entity(filepath: &str, confidence: Confidence, artifact_hash: &str) -> EntityState {
        EntityState {
            entity_key: EntityKey::new(filepath, "Test"),
            filepath: filepath.to_string(),
            symbol: "Test".to_string(),
            artifact_hash: artifact_hash.to_string(),
            confidence,
            state: State::Authoritative,
            last_updated: chrono::Utc::now(),
            metadata: EntityMetadata::default(),
        }
    }

    #[test]
    fn skips_when_not_confirmed() {
        let checker = EtvChecker::new(Box::new(StubReader(ReadOutcome::NotFound)), EtvCache::disabled());
        let e = entity("/t.go", Confidence::Inferred, "hash1");
        let result = checker.check(&e);
        assert!(!result.is_stale);
        assert_eq!(result.skip_reason.as_deref(), Some("confidence_not_confirmed"));
    }

    #[test]
    fn skips_when_filepath_unknown() {
        let checker = EtvChecker::new(Box::new(StubReader(ReadOutcome::NotFound)), EtvCache::disabled());
        let e = entity("unknown", Confidence::Confirmed, "hash1");
        let result = checker.check(&e);
        assert!(!result.is_stale);
        assert_eq!(result.skip_reason.as_deref(), Some("filepath_absent"));
    }

    #[test]
    fn matching_hash_is_not_stale() {
        let content = b"func Test() {}";
        let hash = compute_hash(content);
        let checker = EtvChecker::new(
            Box::new(StubReader(ReadOutcome::Found(content.to_vec()))),
            EtvCache::disabled(),
        );
        let e = entity("/t.go", Confidence::Confirmed, &hash);
        let result = checker.check(&e);
        assert!(!result.is_stale);
    }

    #[test]
    fn mismatched_hash_is_stale() {
        let checker = EtvChecker::new(
            Box::new(StubReader(ReadOutcome::Found(b"different content".to_vec()))),
            EtvCache::disabled(),
        );
        let e = entity("/t.go", Confidence::Confirmed, "storedhash");
        let result = checker.check(&e);
        assert!(result.is_stale);
    }

    #[test]
    fn missing_file_is_stale_conservative_default() {
        let checker = EtvChecker::new(Box::new(StubReader(ReadOutcome::NotFound)), EtvCache::disabled());
        let e = entity("/t.go", Confidence::Confirmed, "storedhash");
        let result = checker.check(&e);
        assert!(result.is_stale);
        assert!(!result.file_exists);
    }

    #[test]
    fn read_error_is_not_stale_but_is_recorded() {
        let checker = EtvChecker::new(
            Box::new(StubReader(ReadOutcome::Error("permission denied".to_string()))),
            EtvCache::disabled(),
        );
        let e = entity("/t.go", Confidence::Confirmed, "storedhash");
        let result = checker.check(&e);
        assert!(!result.is_stale);
        assert_eq!(result.file_read_error.as_deref(), Some("permission denied"));
    }
}
