//! The Hydration Engine (spec.md section 4.8): assembles the injected
//! context block for a user prompt under a strict, deterministic token
//! budget. No embeddings, no semantic search -- anchors are found by
//! filepath mention, symbol mention, and prior-episode hydration history
//! only.

use crate::error::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tinymem_core::{Confidence, EntityKey, EntityState, HydrationConfig, State};
use tinymem_etv::EtvChecker;
use tinymem_resolver::patterns::textual_identifiers;
use tinymem_storage::{HydrationTracker, StateMap, Vault};

const PRIORITY_FILEPATH: u32 = 100;
const PRIORITY_SYMBOL: u32 = 90;
const PRIORITY_PREVIOUSLY_HYDRATED: u32 = 80;

static FILEPATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:[\w.\-]+/)*[\w\-]+\.[A-Za-z0-9]{1,6}").expect("static pattern must compile"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateNoticeReason {
    DiskDivergence,
    FileMissing,
    ReadError,
    NotStructurallyLinked,
}

impl StateNoticeReason {
    fn label(&self) -> &'static str {
        match self {
            StateNoticeReason::DiskDivergence => "disk_divergence",
            StateNoticeReason::FileMissing => "file_missing",
            StateNoticeReason::ReadError => "read_error",
            StateNoticeReason::NotStructurallyLinked => "not_structurally_linked",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StateNoticeEntry {
    pub entity_key: EntityKey,
    pub reason: StateNoticeReason,
}

/// The assembled hydration result for one user turn (spec.md section 6,
/// `hydrate(episode_id, user_prompt, budget) -> (prefix_block, state_notice?,
/// hydrated_entity_keys)`).
#[derive(Debug, Clone)]
pub struct HydrationBlock {
    pub prefix: String,
    pub state_notice: Option<String>,
    pub hydrated_entity_keys: Vec<EntityKey>,
}

struct Anchor {
    entity_key: EntityKey,
    priority: u32,
}

pub struct HydrationEngine {
    vault: Vault,
    state_map: StateMap,
    etv: EtvChecker,
    tracker: HydrationTracker,
    config: HydrationConfig,
}

impl HydrationEngine {
    pub fn new(
        vault: Vault,
        state_map: StateMap,
        etv: EtvChecker,
        tracker: HydrationTracker,
        config: HydrationConfig,
    ) -> Self {
        Self {
            vault,
            state_map,
            etv,
            tracker,
            config,
        }
    }

    /// Assemble the hydration block for `episode_id`. `previous_episode_id`
    /// is the immediately preceding episode's id, used to source the
    /// "previously hydrated" anchor class -- the same "immediately
    /// preceding episode" scope the Runtime's Gate B user-verification
    /// grant uses (spec.md section 4.7).
    pub fn hydrate(
        &self,
        episode_id: &str,
        previous_episode_id: Option<&str>,
        user_prompt: &str,
    ) -> Result<HydrationBlock> {
        let anchors = self.extract_anchors(user_prompt, previous_episode_id)?;

        let mut notices = Vec::new();
        let mut eligible: Vec<EntityState> = Vec::new();

        for anchor in anchors {
            let Some(entity) = self.state_map.get(&anchor.entity_key)? else {
                continue;
            };
            if entity.state == State::Tombstoned {
                continue;
            }

            if entity.confidence != Confidence::Confirmed {
                notices.push(StateNoticeEntry {
                    entity_key: entity.entity_key.clone(),
                    reason: StateNoticeReason::NotStructurallyLinked,
                });
                continue;
            }

            let etv_result = self.etv.check(&entity);
            if etv_result.file_read_error.is_some() {
                notices.push(StateNoticeEntry {
                    entity_key: entity.entity_key.clone(),
                    reason: StateNoticeReason::ReadError,
                });
                continue;
            }
            if etv_result.is_stale {
                let reason = if !etv_result.file_exists {
                    StateNoticeReason::FileMissing
                } else {
                    StateNoticeReason::DiskDivergence
                };
                notices.push(StateNoticeEntry {
                    entity_key: entity.entity_key.clone(),
                    reason,
                });
                continue;
            }

            eligible.push(entity);
        }

        let (included, dropped_count) = self.apply_budget(eligible);
        if dropped_count > 0 {
            tracing::debug!(dropped_count, "hydration budget exceeded, entities dropped");
        }

        let mut prefix = String::new();
        let mut hydrated_entity_keys = Vec::new();
        for entity in &included {
            let artifact = self.vault.get(&entity.artifact_hash)?;
            let Some(artifact) = artifact else { continue };
            prefix.push_str(&format!(
                "[CURRENT STATE: AUTHORITATIVE]\nEntity: {}\nArtifact: {}\nSource: {}\n\n{}\n[END CURRENT STATE]\n\n",
                entity.entity_key,
                entity.artifact_hash,
                resolution_source_label(&entity.metadata),
                artifact.content,
            ));
            self.tracker.record(episode_id, &entity.entity_key)?;
            hydrated_entity_keys.push(entity.entity_key.clone());
        }

        let state_notice = if notices.is_empty() {
            None
        } else {
            Some(format_state_notice(&notices))
        };

        Ok(HydrationBlock {
            prefix,
            state_notice,
            hydrated_entity_keys,
        })
    }

    fn extract_anchors(
        &self,
        user_prompt: &str,
        previous_episode_id: Option<&str>,
    ) -> Result<Vec<Anchor>> {
        let mut best: HashMap<EntityKey, u32> = HashMap::new();

        for filepath in FILEPATH_RE.find_iter(user_prompt).map(|m| m.as_str()) {
            for entity in self.state_map.get_by_filepath(filepath)? {
                best.entry(entity.entity_key)
                    .and_modify(|p| *p = (*p).max(PRIORITY_FILEPATH))
                    .or_insert(PRIORITY_FILEPATH);
            }
        }

        for symbol in textual_identifiers(user_prompt) {
            for entity in self.state_map.get_by_symbol(&symbol)? {
                best.entry(entity.entity_key)
                    .and_modify(|p| *p = (*p).max(PRIORITY_SYMBOL))
                    .or_insert(PRIORITY_SYMBOL);
            }
        }

        if let Some(previous) = previous_episode_id {
            for entity_key in self.tracker.entities_for_episode(previous)? {
                best.entry(entity_key)
                    .and_modify(|p| *p = (*p).max(PRIORITY_PREVIOUSLY_HYDRATED))
                    .or_insert(PRIORITY_PREVIOUSLY_HYDRATED);
            }
        }

        let mut anchors: Vec<Anchor> = best
            .into_iter()
            .map(|(entity_key, priority)| Anchor { entity_key, priority })
            .collect();
        anchors.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.entity_key.as_str().cmp(b.entity_key.as_str())));
        Ok(anchors)
    }

    fn apply_budget(&self, candidates: Vec<EntityState>) -> (Vec<EntityState>, usize) {
        let mut included = Vec::new();
        let mut tokens_used: u32 = 0;
        let mut dropped = 0usize;

        for entity in candidates {
            if included.len() as u32 >= self.config.max_entities {
                dropped += 1;
                continue;
            }
            let estimated_tokens = self
                .vault
                .get(&entity.artifact_hash)
                .ok()
                .flatten()
                .and_then(|a| a.token_count)
                .unwrap_or_else(|| estimate_tokens(&entity));
            if tokens_used.saturating_add(estimated_tokens) > self.config.max_tokens {
                dropped += 1;
                continue;
            }
            tokens_used += estimated_tokens;
            included.push(entity);
        }

        (included, dropped)
    }
}

fn estimate_tokens(entity: &EntityState) -> u32 {
    // Conservative local estimate when the Vault has no stored token_count:
    // roughly one token per four characters of the symbol set's combined
    // length as a stand-in for the artifact itself (the caller re-measures
    // against the real artifact content where available).
    (entity.symbol.len() as u32 / 4).max(1)
}

fn resolution_source_label(metadata: &tinymem_core::EntityMetadata) -> &'static str {
    if metadata.ast_node_count.is_some() {
        "ast"
    } else {
        "regex"
    }
}

fn format_state_notice(notices: &[StateNoticeEntry]) -> String {
    let mut out = String::from(
        "[STATE NOTICE]\nThe following entities could not be verified against disk and must not be assumed current. They can only be resolved by user paste or explicit overwrite.\n",
    );
    for notice in notices {
        out.push_str(&format!("- {} ({})\n", notice.entity_key, notice.reason.label()));
    }
    out.push_str("[END STATE NOTICE]\n");
    out
}
