//! The promotion gate machine (spec.md section 4.7): Gate A (structural
//! proof), the ETV gate, Gate B (authority grant), then tombstoning. This is
//! the only code path permitted to decide a StateMap mutation; everything
//! downstream of here is bookkeeping.

use tinymem_core::{AuditStatus, Confidence, EntityState, State};
use tinymem_etv::ETVResult;
use tinymem_resolver::{check_parity, ParityOutcome, Resolution};

/// A candidate the Runtime is evaluating: a freshly resolved artifact, plus
/// whatever the StateMap currently believes about that entity.
pub struct Candidate<'a> {
    pub resolution: &'a Resolution,
    pub artifact_hash: &'a str,
    pub current: Option<&'a EntityState>,
    /// Shadow Audit result for this artifact hash, if one has been recorded.
    pub audit_status: Option<AuditStatus>,
    /// True if the entity was hydrated in the immediately preceding episode
    /// and this turn mutates it without re-pasting content (Gate B,
    /// "user verification").
    pub previously_hydrated_and_mutated: bool,
    /// True for the user write-head entry point, which bypasses the ETV
    /// gate and is always Gate-B-sufficient.
    pub is_user_write: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromotionOutcome {
    /// The candidate is promoted to AUTHORITATIVE. `supersedes` names the
    /// prior artifact hash displaced from AUTHORITATIVE, if any.
    Promoted { supersedes: Option<String> },
    /// The candidate stays (or becomes) PROPOSED.
    Rejected {
        reason: String,
        requires_user_confirmation: bool,
    },
}

/// Run the full gate machine for one candidate. `etv` is `None` when there
/// is no current StateMap row to verify against (a brand-new entity) or for
/// the user write-head, which bypasses ETV entirely.
pub fn evaluate(candidate: &Candidate<'_>, etv: Option<&ETVResult>) -> PromotionOutcome {
    if candidate.is_user_write {
        // User write-head: directly promoted to AUTHORITATIVE once resolved
        // (spec.md section 4.7 Entry points) -- only the confidence subcheck
        // applies, not the parity subcheck. The user is the disk authority
        // for this moment, so a symbol legitimately dropped from the paste
        // must promote and tombstone its sibling, not get rejected at Gate A.
        return match gate_a_confidence(candidate) {
            Ok(()) => PromotionOutcome::Promoted {
                supersedes: candidate.current.map(|c| c.artifact_hash.clone()),
            },
            Err(outcome) => outcome,
        };
    }

    if let Err(outcome) = gate_a(candidate) {
        return outcome;
    }

    if let Some(etv) = etv {
        if etv.is_stale || etv.file_read_error.is_some() {
            return PromotionOutcome::Rejected {
                reason: "STALE".to_string(),
                requires_user_confirmation: true,
            };
        }
    }

    if !gate_b(candidate) {
        return PromotionOutcome::Rejected {
            reason: "no Gate B authority grant".to_string(),
            requires_user_confirmation: false,
        };
    }

    PromotionOutcome::Promoted {
        supersedes: candidate.current.map(|c| c.artifact_hash.clone()),
    }
}

/// Gate A: CONFIRMED confidence plus a passing Parity Checker result.
fn gate_a(candidate: &Candidate<'_>) -> Result<(), PromotionOutcome> {
    gate_a_confidence(candidate)?;

    let parity: ParityOutcome = check_parity(candidate.current, candidate.resolution);
    if !parity.ok {
        return Err(PromotionOutcome::Rejected {
            reason: parity.reason,
            requires_user_confirmation: false,
        });
    }

    Ok(())
}

/// The confidence subcheck of Gate A, used on its own by the user write-head
/// path, which is exempt from the parity subcheck.
fn gate_a_confidence(candidate: &Candidate<'_>) -> Result<(), PromotionOutcome> {
    if candidate.resolution.confidence != Confidence::Confirmed {
        return Err(PromotionOutcome::Rejected {
            reason: "resolution confidence below CONFIRMED".to_string(),
            requires_user_confirmation: false,
        });
    }
    Ok(())
}

/// Gate B: any one of the four authority grants is sufficient. Structural
/// parity (symbol set identical or a strict superset of the prior
/// AUTHORITATIVE artifact, or no prior artifact at all) is checked directly
/// here rather than re-running the Parity Checker, since Gate A has already
/// proven parity holds -- this branch exists for spec fidelity even though
/// in practice a Gate-A pass already implies it.
fn gate_b(candidate: &Candidate<'_>) -> bool {
    let structural_parity_sufficient = match candidate.current {
        None => true,
        Some(current) => {
            let previous: std::collections::HashSet<&String> =
                current.metadata.symbols.iter().collect();
            let new: std::collections::HashSet<&String> =
                candidate.resolution.symbols.iter().collect();
            previous.is_subset(&new)
        }
    };
    if structural_parity_sufficient {
        return true;
    }

    if candidate.audit_status == Some(AuditStatus::Completed) {
        return true;
    }

    if candidate.previously_hydrated_and_mutated {
        return true;
    }

    false
}

/// Which symbols of the prior AUTHORITATIVE artifact are absent from the
/// newly promoted artifact's symbol set -- these transition to TOMBSTONED
/// (spec.md section 4.7.5).
pub fn tombstoned_symbols(previous: Option<&EntityState>, resolution: &Resolution) -> Vec<String> {
    let Some(previous) = previous else {
        return Vec::new();
    };
    if previous.state != State::Authoritative {
        return Vec::new();
    }
    let new: std::collections::HashSet<&String> = resolution.symbols.iter().collect();
    previous
        .metadata
        .symbols
        .iter()
        .filter(|s| !new.contains(s))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tinymem_core::{EntityKey, EntityMetadata};
    use tinymem_resolver::ResolutionMethod;

    fn confirmed_resolution(symbols: &[&str]) -> Resolution {
        Resolution {
            entity_key: EntityKey::new("/a.go", "Add"),
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            confidence: Confidence::Confirmed,
            method: ResolutionMethod::AstExtraction,
            ast_node_count: Some(10),
        }
    }

    fn authoritative_state(symbols: &[&str], hash: &str) -> EntityState {
        EntityState {
            entity_key: EntityKey::new("/a.go", "Add"),
            filepath: "/a.go".to_string(),
            symbol: "Add".to_string(),
            artifact_hash: hash.to_string(),
            confidence: Confidence::Confirmed,
            state: State::Authoritative,
            last_updated: chrono::Utc::now(),
            metadata: EntityMetadata {
                symbols: symbols.iter().map(|s| s.to_string()).collect(),
                ast_node_count: Some(10),
            },
        }
    }

    #[test]
    fn new_entity_promotes_without_prior_state() {
        let resolution = confirmed_resolution(&["Add"]);
        let candidate = Candidate {
            resolution: &resolution,
            artifact_hash: "h1",
            current: None,
            audit_status: None,
            previously_hydrated_and_mutated: false,
            is_user_write: false,
        };
        assert_eq!(
            evaluate(&candidate, None),
            PromotionOutcome::Promoted { supersedes: None }
        );
    }

    #[test]
    fn inferred_confidence_is_rejected_at_gate_a() {
        let mut resolution = confirmed_resolution(&["Add"]);
        resolution.confidence = Confidence::Inferred;
        let candidate = Candidate {
            resolution: &resolution,
            artifact_hash: "h1",
            current: None,
            audit_status: None,
            previously_hydrated_and_mutated: false,
            is_user_write: false,
        };
        match evaluate(&candidate, None) {
            PromotionOutcome::Rejected { requires_user_confirmation, .. } => {
                assert!(!requires_user_confirmation);
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn missing_symbol_fails_gate_a_parity() {
        let current = authoritative_state(&["Add", "helper"], "h0");
        let resolution = confirmed_resolution(&["Add"]);
        let candidate = Candidate {
            resolution: &resolution,
            artifact_hash: "h1",
            current: Some(&current),
            audit_status: None,
            previously_hydrated_and_mutated: false,
            is_user_write: false,
        };
        match evaluate(&candidate, None) {
            PromotionOutcome::Rejected { .. } => {}
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn stale_etv_blocks_promotion_and_requires_confirmation() {
        let current = authoritative_state(&["Add"], "h0");
        let resolution = confirmed_resolution(&["Add"]);
        let candidate = Candidate {
            resolution: &resolution,
            artifact_hash: "h1",
            current: Some(&current),
            audit_status: None,
            previously_hydrated_and_mutated: false,
            is_user_write: false,
        };
        let etv = ETVResult {
            entity_key: "/a.go::Add".to_string(),
            is_stale: true,
            disk_hash: None,
            state_map_hash: "h0".to_string(),
            file_exists: false,
            file_read_error: None,
            skip_reason: None,
        };
        match evaluate(&candidate, Some(&etv)) {
            PromotionOutcome::Rejected { reason, requires_user_confirmation } => {
                assert_eq!(reason, "STALE");
                assert!(requires_user_confirmation);
            }
            other => panic!("expected STALE rejection, got {other:?}"),
        }
    }

    #[test]
    fn user_write_head_bypasses_etv_and_gate_b() {
        let current = authoritative_state(&["Add"], "h0");
        let resolution = confirmed_resolution(&["Add", "helper"]);
        let candidate = Candidate {
            resolution: &resolution,
            artifact_hash: "h1",
            current: Some(&current),
            audit_status: None,
            previously_hydrated_and_mutated: false,
            is_user_write: true,
        };
        assert_eq!(
            evaluate(&candidate, None),
            PromotionOutcome::Promoted { supersedes: Some("h0".to_string()) }
        );
    }

    #[test]
    fn shadow_audit_completed_satisfies_gate_b_when_parity_insufficient() {
        // A strict subset would normally fail gate A's parity check, so use
        // a sibling-symbol addition that passes gate A but, by construction
        // here, still isn't a superset of an unrelated tracked symbol set --
        // exercised via gate_b directly.
        let current = authoritative_state(&["Add", "helper"], "h0");
        let resolution = confirmed_resolution(&["Add", "helper", "extra"]);
        let candidate = Candidate {
            resolution: &resolution,
            artifact_hash: "h1",
            current: Some(&current),
            audit_status: Some(AuditStatus::Completed),
            previously_hydrated_and_mutated: false,
            is_user_write: false,
        };
        assert!(gate_b(&candidate));
        assert_eq!(
            evaluate(&candidate, None),
            PromotionOutcome::Promoted { supersedes: Some("h0".to_string()) }
        );
    }

    #[test]
    fn tombstones_symbols_dropped_from_new_authoritative_artifact() {
        let current = authoritative_state(&["Add", "helper"], "h0");
        let resolution = confirmed_resolution(&["Add"]);
        let dropped = tombstoned_symbols(Some(&current), &resolution);
        assert_eq!(dropped, vec!["helper".to_string()]);
    }

    #[test]
    fn no_tombstones_when_symbol_set_unchanged() {
        let current = authoritative_state(&["Add"], "h0");
        let resolution = confirmed_resolution(&["Add"]);
        assert!(tombstoned_symbols(Some(&current), &resolution).is_empty());
    }
}
