//! Core data model: Artifact, Episode, StateTransition, AuditResult, EntityState.

use serde::{Deserialize, Serialize};

/// The four recognized artifact content types. Closed enumeration per the
/// "ambient interface dispatch -> closed tagged variants" redesign flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Code,
    Diff,
    Decision,
    UserInput,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Code => "code",
            ContentType::Diff => "diff",
            ContentType::Decision => "decision",
            ContentType::UserInput => "user_input",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "code" => Some(ContentType::Code),
            "diff" => Some(ContentType::Diff),
            "decision" => Some(ContentType::Decision),
            "user_input" => Some(ContentType::UserInput),
            _ => None,
        }
    }
}

/// Resolver/entity confidence. CONFIRMED is the only confidence that can
/// promote an entity to AUTHORITATIVE (Gate A).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Unresolved,
    Inferred,
    Confirmed,
}

/// StateMap / StateTransition state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    Proposed,
    Authoritative,
    Superseded,
    Tombstoned,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Proposed => "proposed",
            State::Authoritative => "authoritative",
            State::Superseded => "superseded",
            State::Tombstoned => "tombstoned",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "proposed" => Some(State::Proposed),
            "authoritative" => Some(State::Authoritative),
            "superseded" => Some(State::Superseded),
            "tombstoned" => Some(State::Tombstoned),
            _ => None,
        }
    }
}

/// Shadow Audit outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Completed,
    Partial,
    Discussion,
}

/// `"<filepath>::<symbol>"`, or `"unknown::<symbol>"` when no filepath is known.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey(pub String);

impl EntityKey {
    pub fn new(filepath: &str, symbol: &str) -> Self {
        let fp = if filepath.is_empty() { "unknown" } else { filepath };
        Self(format!("{fp}::{symbol}"))
    }

    pub fn filepath(&self) -> &str {
        self.0.split_once("::").map(|(fp, _)| fp).unwrap_or("unknown")
    }

    pub fn symbol(&self) -> &str {
        self.0.split_once("::").map(|(_, sym)| sym).unwrap_or(self.0.as_str())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable, content-addressed blob of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub hash: String,
    pub content: String,
    pub content_type: ContentType,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub byte_size: u64,
    pub token_count: Option<u32>,
}

/// One user request/response round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub episode_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub user_prompt_hash: String,
    pub assistant_response_hash: Option<String>,
    pub metadata: std::collections::BTreeMap<String, String>,
}

/// Append-only audit of a single state-machine move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub episode_id: String,
    pub entity_key: EntityKey,
    pub from_state: Option<State>,
    pub to_state: State,
    pub artifact_hash: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub reason: String,
    pub requires_user_confirmation: bool,
}

/// Outcome of a Shadow Audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditResult {
    pub episode_id: String,
    pub artifact_hash: String,
    pub entity_key: EntityKey,
    pub status: AuditStatus,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Typed metadata record carried on an `EntityState`. Replaces a free-form
/// map per the "ambient metadata maps -> typed metadata records" redesign
/// flag: the only two recognized keys (`symbols`, `ast_node_count`) are
/// fields, not map entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMetadata {
    pub symbols: Vec<String>,
    pub ast_node_count: Option<u64>,
}

/// The StateMap row for an entity: the current (possibly empty) authoritative
/// binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityState {
    pub entity_key: EntityKey,
    pub filepath: String,
    pub symbol: String,
    pub artifact_hash: String,
    pub confidence: Confidence,
    pub state: State,
    pub last_updated: chrono::DateTime<chrono::Utc>,
    pub metadata: EntityMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_key_unknown_filepath() {
        let k = EntityKey::new("", "Add");
        assert_eq!(k.as_str(), "unknown::Add");
        assert_eq!(k.filepath(), "unknown");
        assert_eq!(k.symbol(), "Add");
    }

    #[test]
    fn entity_key_roundtrip() {
        let k = EntityKey::new("/math.go", "Add");
        assert_eq!(k.as_str(), "/math.go::Add");
        assert_eq!(k.filepath(), "/math.go");
        assert_eq!(k.symbol(), "Add");
    }

    #[test]
    fn content_type_str_roundtrip() {
        for ct in [
            ContentType::Code,
            ContentType::Diff,
            ContentType::Decision,
            ContentType::UserInput,
        ] {
            assert_eq!(ContentType::from_str(ct.as_str()), Some(ct));
        }
        assert_eq!(ContentType::from_str("bogus"), None);
    }
}
