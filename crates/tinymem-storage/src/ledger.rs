//! The Ledger: chronological, append-only recording of episodes, state
//! transitions and audit results (spec.md section 4.2). A write-through
//! audit trail; never fed back into prompts.

use crate::db::Db;
use crate::error::{Result, StorageError};
use rusqlite::{params, OptionalExtension};
use tinymem_core::{AuditResult, AuditStatus, Episode, EntityKey, State, StateTransition};

#[derive(Clone)]
pub struct Ledger {
    db: Db,
}

impl Ledger {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Open a new episode with a fresh id.
    pub fn open_episode(&self, episode_id: &str, user_prompt_hash: &str) -> Result<Episode> {
        let now = chrono::Utc::now();
        self.db.with_writer(|conn| {
            let seq = next_seq(conn)?;
            conn.execute(
                "INSERT INTO ledger_episodes (episode_id, seq, timestamp, user_prompt_hash, assistant_response_hash, metadata)
                 VALUES (?1, ?2, ?3, ?4, NULL, '{}')",
                params![episode_id, seq, now.to_rfc3339(), user_prompt_hash],
            )?;
            Ok(())
        })?;

        Ok(Episode {
            episode_id: episode_id.to_string(),
            timestamp: now,
            user_prompt_hash: user_prompt_hash.to_string(),
            assistant_response_hash: None,
            metadata: Default::default(),
        })
    }

    /// One-shot finalization of an episode's response hash. The only update
    /// permitted over an otherwise append-only row.
    pub fn finalize_episode(&self, episode_id: &str, assistant_response_hash: &str) -> Result<()> {
        self.db.with_writer(|conn| {
            let updated = conn.execute(
                "UPDATE ledger_episodes SET assistant_response_hash = ?1
                 WHERE episode_id = ?2 AND assistant_response_hash IS NULL",
                params![assistant_response_hash, episode_id],
            )?;
            if updated == 0 {
                return Err(StorageError::NotFound(format!(
                    "episode {episode_id} not found or already finalized"
                )));
            }
            Ok(())
        })
    }

    /// Record a single state transition. Callers that need an atomic batch of
    /// transitions for one response should call `record_transitions`.
    pub fn record_transition(&self, transition: &StateTransition) -> Result<()> {
        self.record_transitions(std::slice::from_ref(transition))
    }

    /// Record a batch of transitions as a single atomic unit, per the
    /// "per episode: all transitions produced by a single response are
    /// applied as one atomic unit" ordering guarantee.
    pub fn record_transitions(&self, transitions: &[StateTransition]) -> Result<()> {
        self.db.with_writer(|conn| {
            let tx = conn.unchecked_transaction()?;
            for t in transitions {
                let seq = next_seq(&tx)?;
                tx.execute(
                    "INSERT INTO ledger_state_transitions
                        (seq, episode_id, entity_key, from_state, to_state, artifact_hash, timestamp, reason, requires_user_confirmation)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        seq,
                        t.episode_id,
                        t.entity_key.as_str(),
                        t.from_state.map(|s| s.as_str()),
                        t.to_state.as_str(),
                        t.artifact_hash,
                        t.timestamp.to_rfc3339(),
                        t.reason,
                        t.requires_user_confirmation as i64,
                    ],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn record_audit_result(&self, result: &AuditResult) -> Result<()> {
        self.db.with_writer(|conn| {
            conn.execute(
                "INSERT INTO ledger_audit_results (episode_id, artifact_hash, entity_key, status, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    result.episode_id,
                    result.artifact_hash,
                    result.entity_key.as_str(),
                    audit_status_str(result.status),
                    result.timestamp.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    /// The last `n` episodes, most recent first.
    pub fn recent_episodes(&self, n: u32) -> Result<Vec<Episode>> {
        self.db.with_reader(|conn| {
            let mut stmt = conn.prepare(
                "SELECT episode_id, timestamp, user_prompt_hash, assistant_response_hash, metadata
                 FROM ledger_episodes ORDER BY seq DESC LIMIT ?1",
            )?;
            let rows = stmt
                .query_map(params![n], row_to_episode)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_episode(&self, episode_id: &str) -> Result<Option<Episode>> {
        self.db.with_reader(|conn| {
            conn.query_row(
                "SELECT episode_id, timestamp, user_prompt_hash, assistant_response_hash, metadata
                 FROM ledger_episodes WHERE episode_id = ?1",
                params![episode_id],
                row_to_episode,
            )
            .optional()
            .map_err(StorageError::from)
        })
    }

    /// Most recent audit result for `artifact_hash`, if the Shadow Audit has
    /// reported back. Used by the Runtime's Gate B shadow-audit authority
    /// check.
    pub fn audit_result_for_artifact(&self, artifact_hash: &str) -> Result<Option<AuditResult>> {
        self.db.with_reader(|conn| {
            conn.query_row(
                "SELECT episode_id, artifact_hash, entity_key, status, timestamp
                 FROM ledger_audit_results WHERE artifact_hash = ?1 ORDER BY id DESC LIMIT 1",
                params![artifact_hash],
                row_to_audit_result,
            )
            .optional()
            .map_err(StorageError::from)?
            .transpose()
        })
    }

    pub fn audit_results_for_episode(&self, episode_id: &str) -> Result<Vec<AuditResult>> {
        self.db.with_reader(|conn| {
            let mut stmt = conn.prepare(
                "SELECT episode_id, artifact_hash, entity_key, status, timestamp
                 FROM ledger_audit_results WHERE episode_id = ?1 ORDER BY id ASC",
            )?;
            let rows = stmt
                .query_map(params![episode_id], row_to_audit_result)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().collect::<std::result::Result<Vec<_>, _>>()
        })
    }

    /// Every transition ever recorded, in total order (timestamp, then
    /// insertion order) -- used to rebuild the StateMap from scratch.
    pub fn all_transitions_in_order(&self) -> Result<Vec<StateTransition>> {
        self.db.with_reader(|conn| {
            let mut stmt = conn.prepare(
                "SELECT episode_id, entity_key, from_state, to_state, artifact_hash, timestamp, reason, requires_user_confirmation
                 FROM ledger_state_transitions ORDER BY seq ASC",
            )?;
            let rows = stmt
                .query_map([], row_to_transition)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().collect::<std::result::Result<Vec<_>, _>>()
        })
    }
}

/// Single monotonic counter shared by episodes and transitions so total
/// order across both tables is observable without relying on timestamp
/// resolution alone.
fn next_seq(conn: &rusqlite::Connection) -> Result<i64> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS ledger_seq (n INTEGER NOT NULL)",
        [],
    )?;
    let current: Option<i64> = conn
        .query_row("SELECT n FROM ledger_seq LIMIT 1", [], |r| r.get(0))
        .optional()?;
    let next = current.unwrap_or(0) + 1;
    if current.is_none() {
        conn.execute("INSERT INTO ledger_seq (n) VALUES (?1)", params![next])?;
    } else {
        conn.execute("UPDATE ledger_seq SET n = ?1", params![next])?;
    }
    Ok(next)
}

fn audit_status_str(status: AuditStatus) -> &'static str {
    match status {
        AuditStatus::Completed => "completed",
        AuditStatus::Partial => "partial",
        AuditStatus::Discussion => "discussion",
    }
}

fn audit_status_from_str(s: &str) -> Result<AuditStatus> {
    match s {
        "completed" => Ok(AuditStatus::Completed),
        "partial" => Ok(AuditStatus::Partial),
        "discussion" => Ok(AuditStatus::Discussion),
        other => Err(StorageError::Validation(format!("unknown audit status {other}"))),
    }
}

fn parse_timestamp(s: &str) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now())
}

fn row_to_episode(row: &rusqlite::Row<'_>) -> rusqlite::Result<Episode> {
    let metadata_json: String = row.get(4)?;
    let metadata: std::collections::BTreeMap<String, String> =
        serde_json::from_str(&metadata_json).unwrap_or_default();
    Ok(Episode {
        episode_id: row.get(0)?,
        timestamp: parse_timestamp(&row.get::<_, String>(1)?),
        user_prompt_hash: row.get(2)?,
        assistant_response_hash: row.get(3)?,
        metadata,
    })
}

fn row_to_audit_result(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<AuditResult>> {
    let episode_id: String = row.get(0)?;
    let artifact_hash: String = row.get(1)?;
    let entity_key: String = row.get(2)?;
    let status_str: String = row.get(3)?;
    let timestamp: String = row.get(4)?;

    Ok(audit_status_from_str(&status_str).map(|status| AuditResult {
        episode_id,
        artifact_hash,
        entity_key: EntityKey(entity_key),
        status,
        timestamp: parse_timestamp(&timestamp),
    }))
}

fn row_to_transition(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<StateTransition>> {
    let from_state_str: Option<String> = row.get(2)?;
    let to_state_str: String = row.get(3)?;
    let to_state = match State::from_str(&to_state_str) {
        Some(s) => s,
        None => {
            return Ok(Err(StorageError::Validation(format!(
                "unknown state {to_state_str}"
            ))))
        }
    };
    let from_state = match from_state_str {
        Some(s) => match State::from_str(&s) {
            Some(v) => Some(v),
            None => {
                return Ok(Err(StorageError::Validation(format!("unknown state {s}"))))
            }
        },
        None => None,
    };
    Ok(Ok(StateTransition {
        episode_id: row.get(0)?,
        entity_key: EntityKey(row.get::<_, String>(1)?),
        from_state,
        to_state,
        artifact_hash: row.get(4)?,
        timestamp: parse_timestamp(&row.get::<_, String>(5)?),
        reason: row.get(6)?,
        requires_user_confirmation: row.get::<_, i64>(7)? != 0,
    }))
}
