//! The Runtime: the only code path permitted to mutate the StateMap
//! (spec.md section 4.7). Wires the Vault, Ledger, StateMap, Resolver, ETV
//! Checker and tombstone bookkeeping together behind the two entry points
//! the HTTP boundary calls: the user write-head and the LLM response path.

use crate::error::Result;
use crate::promotion::{evaluate, tombstoned_symbols, Candidate, PromotionOutcome};
use std::collections::HashSet;
use tinymem_core::{Confidence, ContentType, EntityKey, EntityMetadata, State, StateTransition, TombstoneConfig};
use tinymem_etv::EtvChecker;
use tinymem_resolver::{Resolution, Resolver};
use tinymem_storage::{Ledger, StateMap, TombstoneTracker, Vault};

/// One candidate code block detected in a captured LLM response, ahead of
/// resolution. Block detection itself (grammar/fence parsing) is the HTTP
/// boundary's job; the Runtime only consumes the result.
#[derive(Debug, Clone)]
pub struct CodeBlock {
    pub content: String,
    pub filepath: Option<String>,
    pub language_hint: Option<String>,
}

pub struct Runtime {
    vault: Vault,
    ledger: Ledger,
    state_map: StateMap,
    resolver: Resolver,
    etv: EtvChecker,
    tombstones: TombstoneTracker,
    tombstone_config: TombstoneConfig,
}

impl Runtime {
    pub fn new(
        vault: Vault,
        ledger: Ledger,
        state_map: StateMap,
        resolver: Resolver,
        etv: EtvChecker,
        tombstones: TombstoneTracker,
        tombstone_config: TombstoneConfig,
    ) -> Self {
        Self {
            vault,
            ledger,
            state_map,
            resolver,
            etv,
            tombstones,
            tombstone_config,
        }
    }

    /// User write-head: content pasted directly by the user is always
    /// AUTHORITATIVE once structurally sound. Bypasses ETV and Gate B --
    /// the user is the disk authority for this moment.
    pub fn user_write(
        &self,
        episode_id: &str,
        filepath: &str,
        content: &str,
        language_hint: Option<&str>,
    ) -> Result<Vec<StateTransition>> {
        let artifact_hash = self.vault.store(content, ContentType::UserInput, None)?;
        let resolution = self
            .resolver
            .resolve(content, Some(filepath), language_hint)?;
        let current = self.state_map.get(&resolution.entity_key)?;

        let candidate = Candidate {
            resolution: &resolution,
            artifact_hash: &artifact_hash,
            current: current.as_ref(),
            audit_status: None,
            previously_hydrated_and_mutated: false,
            is_user_write: true,
        };
        let outcome = evaluate(&candidate, None);
        self.apply_outcome(episode_id, &resolution, &artifact_hash, current.as_ref(), outcome)
    }

    /// LLM response path: every detected code block is stored, resolved and
    /// run through the full gate machine. `previously_hydrated` is the set
    /// of entities hydrated into the immediately preceding episode, used by
    /// Gate B's "user verification" grant.
    pub fn llm_response(
        &self,
        episode_id: &str,
        blocks: &[CodeBlock],
        previously_hydrated: &HashSet<EntityKey>,
    ) -> Result<Vec<StateTransition>> {
        let mut all_transitions = Vec::new();

        for block in blocks {
            let artifact_hash = self.vault.store(&block.content, ContentType::Code, None)?;
            let resolution = self.resolver.resolve(
                &block.content,
                block.filepath.as_deref(),
                block.language_hint.as_deref(),
            )?;

            // UNRESOLVED has no entity identity to gate against; spec.md
            // section 4.7's similarity rule forbids it from ever advancing a
            // state, so there is nothing further to do with it here.
            if resolution.confidence == Confidence::Unresolved {
                continue;
            }

            let current = self.state_map.get(&resolution.entity_key)?;
            let audit_status = self
                .ledger
                .audit_result_for_artifact(&artifact_hash)?
                .map(|a| a.status);
            let previously_hydrated_and_mutated =
                previously_hydrated.contains(&resolution.entity_key);
            let etv_result = current.as_ref().map(|c| self.etv.check(c));

            let candidate = Candidate {
                resolution: &resolution,
                artifact_hash: &artifact_hash,
                current: current.as_ref(),
                audit_status,
                previously_hydrated_and_mutated,
                is_user_write: false,
            };
            let outcome = evaluate(&candidate, etv_result.as_ref());

            let transitions = self.apply_outcome(
                episode_id,
                &resolution,
                &artifact_hash,
                current.as_ref(),
                outcome,
            )?;
            all_transitions.extend(transitions);
        }

        Ok(all_transitions)
    }

    /// Decrement every pending tombstone's retention counter by one episode
    /// and delete StateMap rows whose retention has expired. Called once per
    /// finalized episode by the HTTP boundary.
    pub fn expire_tombstones(&self) -> Result<Vec<EntityKey>> {
        let expired = self.tombstones.tick_all()?;
        for key in &expired {
            self.state_map.delete(key)?;
            self.tombstones.clear(key)?;
        }
        Ok(expired)
    }

    fn apply_outcome(
        &self,
        episode_id: &str,
        resolution: &Resolution,
        artifact_hash: &str,
        current: Option<&tinymem_core::EntityState>,
        outcome: PromotionOutcome,
    ) -> Result<Vec<StateTransition>> {
        let now = chrono::Utc::now();
        let metadata = EntityMetadata {
            symbols: resolution.symbols.clone(),
            ast_node_count: resolution.ast_node_count,
        };

        match outcome {
            PromotionOutcome::Rejected {
                reason,
                requires_user_confirmation,
            } => {
                let transition = StateTransition {
                    episode_id: episode_id.to_string(),
                    entity_key: resolution.entity_key.clone(),
                    from_state: current.map(|c| c.state),
                    to_state: State::Proposed,
                    artifact_hash: artifact_hash.to_string(),
                    timestamp: now,
                    reason,
                    requires_user_confirmation,
                };
                self.ledger.record_transition(&transition)?;
                // A rejection never mutates an existing StateMap row (spec.md
                // Scenario 5/3): it only blocks promotion. Only a genuinely
                // new entity (no prior row) gets a PROPOSED row written.
                if current.is_none() {
                    self.state_map.set(
                        &resolution.entity_key,
                        resolution.entity_key.filepath(),
                        resolution.entity_key.symbol(),
                        artifact_hash,
                        resolution.confidence,
                        State::Proposed,
                        &metadata,
                    )?;
                }
                Ok(vec![transition])
            }

            PromotionOutcome::Promoted { supersedes } => {
                let mut transitions = Vec::new();

                if let Some(old_hash) = &supersedes {
                    transitions.push(StateTransition {
                        episode_id: episode_id.to_string(),
                        entity_key: resolution.entity_key.clone(),
                        from_state: current.map(|c| c.state),
                        to_state: State::Superseded,
                        artifact_hash: old_hash.clone(),
                        timestamp: now,
                        reason: "superseded by new authoritative artifact".to_string(),
                        requires_user_confirmation: false,
                    });
                }

                transitions.push(StateTransition {
                    episode_id: episode_id.to_string(),
                    entity_key: resolution.entity_key.clone(),
                    from_state: current.map(|c| c.state),
                    to_state: State::Authoritative,
                    artifact_hash: artifact_hash.to_string(),
                    timestamp: now,
                    reason: "promoted".to_string(),
                    requires_user_confirmation: false,
                });

                let dropped_symbols = tombstoned_symbols(current, resolution);
                let filepath = resolution.entity_key.filepath().to_string();
                for symbol in &dropped_symbols {
                    let sibling_key = EntityKey::new(&filepath, symbol);
                    if let Some(sibling) = self.state_map.get(&sibling_key)? {
                        transitions.push(StateTransition {
                            episode_id: episode_id.to_string(),
                            entity_key: sibling_key.clone(),
                            from_state: Some(sibling.state),
                            to_state: State::Tombstoned,
                            artifact_hash: sibling.artifact_hash.clone(),
                            timestamp: now,
                            reason: "symbol omitted from new authoritative artifact".to_string(),
                            requires_user_confirmation: false,
                        });
                        self.tombstones.set(
                            &sibling_key,
                            self.tombstone_config.retention_episodes,
                            episode_id,
                        )?;
                        self.state_map.set(
                            &sibling_key,
                            &sibling.filepath,
                            &sibling.symbol,
                            &sibling.artifact_hash,
                            sibling.confidence,
                            State::Tombstoned,
                            &sibling.metadata,
                        )?;
                    }
                }

                self.ledger.record_transitions(&transitions)?;
                self.state_map.set(
                    &resolution.entity_key,
                    resolution.entity_key.filepath(),
                    resolution.entity_key.symbol(),
                    artifact_hash,
                    resolution.confidence,
                    State::Authoritative,
                    &metadata,
                )?;

                Ok(transitions)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tinymem_core::compute_hash;
    use tinymem_etv::{EtvCache, FileReader, ReadOutcome};
    use tinymem_resolver::NullParser;
    use tinymem_storage::Db;

    struct AlwaysFoundReader(Vec<u8>);
    impl FileReader for AlwaysFoundReader {
        fn read(&self, _absolute_path: &str) -> ReadOutcome {
            ReadOutcome::Found(self.0.clone())
        }
    }

    fn runtime_with_reader(reader: Box<dyn FileReader>) -> Runtime {
        let db = Db::open_in_memory().unwrap();
        let vault = Vault::new(db.clone());
        let ledger = Ledger::new(db.clone());
        let state_map = StateMap::new(db.clone());
        let resolver = Resolver::new(std::sync::Arc::new(NullParser), state_map.clone());
        let etv = EtvChecker::new(reader, EtvCache::disabled());
        let tombstones = TombstoneTracker::new(db);
        Runtime::new(vault, ledger, state_map, resolver, etv, tombstones, TombstoneConfig::default())
    }

    #[test]
    fn user_write_promotes_directly_to_authoritative() {
        let rt = runtime_with_reader(Box::new(AlwaysFoundReader(b"unused".to_vec())));
        let content = "func Add(a, b int) int { return a + b }";
        let transitions = rt.user_write("ep1", "/math.go", content, Some("go")).unwrap();
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].to_state, State::Authoritative);

        let entity = rt.state_map.get(&EntityKey::new("/math.go", "Add")).unwrap().unwrap();
        assert_eq!(entity.state, State::Authoritative);
    }

    #[test]
    fn llm_response_stays_proposed_without_current_etv_stale() {
        let rt = runtime_with_reader(Box::new(AlwaysFoundReader(b"different on disk".to_vec())));
        // Seed an AUTHORITATIVE prior artifact so ETV has something to check.
        let prior_hash = compute_hash(b"original on disk");
        rt.state_map
            .set(
                &EntityKey::new("/math.go", "Add"),
                "/math.go",
                "Add",
                &prior_hash,
                Confidence::Confirmed,
                State::Authoritative,
                &EntityMetadata { symbols: vec!["Add".into()], ast_node_count: Some(5) },
            )
            .unwrap();

        let blocks = vec![CodeBlock {
            content: "func Add(a, b int) int { return a + b }".to_string(),
            filepath: Some("/math.go".to_string()),
            language_hint: Some("go".to_string()),
        }];
        let transitions = rt.llm_response("ep2", &blocks, &HashSet::new()).unwrap();
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].to_state, State::Proposed);
        assert_eq!(transitions[0].reason, "STALE");
        assert!(transitions[0].requires_user_confirmation);
    }

    #[test]
    fn dropping_a_symbol_tombstones_its_sibling_entity() {
        let rt = runtime_with_reader(Box::new(AlwaysFoundReader(b"whatever".to_vec())));
        // Prior authoritative artifact covering both Add and helper.
        rt.state_map
            .set(
                &EntityKey::new("/math.go", "Add"),
                "/math.go",
                "Add",
                "oldhash",
                Confidence::Confirmed,
                State::Authoritative,
                &EntityMetadata { symbols: vec!["Add".into(), "helper".into()], ast_node_count: Some(20) },
            )
            .unwrap();
        rt.state_map
            .set(
                &EntityKey::new("/math.go", "helper"),
                "/math.go",
                "helper",
                "oldhash",
                Confidence::Confirmed,
                State::Authoritative,
                &EntityMetadata { symbols: vec!["Add".into(), "helper".into()], ast_node_count: Some(20) },
            )
            .unwrap();

        let transitions = rt
            .user_write("ep3", "/math.go", "func Add(a, b int) int { return a + b }", Some("go"))
            .unwrap();

        let tombstoned = transitions
            .iter()
            .find(|t| t.entity_key.symbol() == "helper")
            .expect("helper transition recorded");
        assert_eq!(tombstoned.to_state, State::Tombstoned);

        let helper_row = rt.state_map.get(&EntityKey::new("/math.go", "helper")).unwrap().unwrap();
        assert_eq!(helper_row.state, State::Tombstoned);

        let pending = rt.tombstones.get(&EntityKey::new("/math.go", "helper")).unwrap().unwrap();
        assert_eq!(pending.retention_episodes_remaining, 10);
    }

    #[test]
    fn unresolved_block_is_skipped_entirely() {
        let rt = runtime_with_reader(Box::new(AlwaysFoundReader(b"x".to_vec())));
        let blocks = vec![CodeBlock {
            content: "plain english, no code at all".to_string(),
            filepath: None,
            language_hint: None,
        }];
        let transitions = rt.llm_response("ep4", &blocks, &HashSet::new()).unwrap();
        assert!(transitions.is_empty());
    }
}
