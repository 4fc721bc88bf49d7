//! The Parity Checker: mechanical structural comparison between a proposed
//! artifact and the current authoritative artifact for the same entity
//! (spec.md section 4.5). Parity is mechanical, not semantic -- it prevents
//! silent truncation, not refactoring.

use crate::resolution::Resolution;
use std::collections::HashSet;
use tinymem_core::{Confidence, EntityState};

/// Fraction of the previous AST node count below which a new artifact is
/// considered to have collapsed, even if its symbol set is nominally intact.
const COLLAPSE_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParityOutcome {
    pub ok: bool,
    pub reason: String,
    pub missing_symbols: Vec<String>,
    pub collapsed: bool,
}

impl ParityOutcome {
    fn ok() -> Self {
        Self {
            ok: true,
            reason: "ok".to_string(),
            missing_symbols: Vec::new(),
            collapsed: false,
        }
    }
}

/// Check whether `resolution` may legitimately replace `current` for the
/// entity it names.
pub fn check(current: Option<&EntityState>, resolution: &Resolution) -> ParityOutcome {
    // Partial/unresolved resolutions cannot overwrite anyway -- parity is not
    // enforced (there is nothing to lose information relative to).
    if resolution.confidence != Confidence::Confirmed {
        return ParityOutcome::ok();
    }

    let Some(current) = current else {
        // No current state: this is a new entity.
        return ParityOutcome::ok();
    };

    let previous_symbols: HashSet<&String> = current.metadata.symbols.iter().collect();
    let new_symbols: HashSet<&String> = resolution.symbols.iter().collect();

    let missing_symbols: Vec<String> = previous_symbols
        .difference(&new_symbols)
        .map(|s| s.to_string())
        .collect();

    let all_symbols_missing = !previous_symbols.is_empty() && new_symbols.is_disjoint(&previous_symbols);

    let node_count_collapsed = match (current.metadata.ast_node_count, resolution.ast_node_count) {
        (Some(prev), Some(now)) if prev > 0 => (now as f64) < (prev as f64) * COLLAPSE_THRESHOLD,
        _ => false,
    };

    let collapsed = all_symbols_missing || node_count_collapsed;

    if !missing_symbols.is_empty() || collapsed {
        let mut reason = String::new();
        if !missing_symbols.is_empty() {
            reason.push_str(&format!("missing symbols: {}", missing_symbols.join(", ")));
        }
        if collapsed {
            if !reason.is_empty() {
                reason.push_str("; ");
            }
            reason.push_str("structural collapse detected");
        }
        return ParityOutcome {
            ok: false,
            reason,
            missing_symbols,
            collapsed,
        };
    }

    ParityOutcome::ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolution::ResolutionMethod;
    use tinymem_core::{EntityKey, EntityMetadata, State};

    fn entity_state(symbols: &[&str], ast_node_count: Option<u64>) -> EntityState {
        EntityState {
            entity_key: EntityKey::new("/x.go", "X"),
            filepath: "/x.go".to_string(),
            symbol: "X".to_string(),
            artifact_hash: "oldhash".to_string(),
            confidence: Confidence::Confirmed,
            state: State::Authoritative,
            last_updated: chrono::Utc::now(),
            metadata: EntityMetadata {
                symbols: symbols.iter().map(|s| s.to_string()).collect(),
                ast_node_count,
            },
        }
    }

    fn resolution(symbols: &[&str], ast_node_count: Option<u64>) -> Resolution {
        Resolution {
            entity_key: EntityKey::new("/x.go", "X"),
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            confidence: Confidence::Confirmed,
            method: ResolutionMethod::AstExtraction,
            ast_node_count,
        }
    }

    #[test]
    fn no_current_state_is_ok() {
        let outcome = check(None, &resolution(&["X"], Some(10)));
        assert!(outcome.ok);
    }

    #[test]
    fn non_confirmed_resolution_is_not_enforced() {
        let mut r = resolution(&["X"], Some(10));
        r.confidence = Confidence::Inferred;
        let current = entity_state(&["X", "helper"], Some(100));
        let outcome = check(Some(&current), &r);
        assert!(outcome.ok);
    }

    #[test]
    fn missing_symbol_fails_parity() {
        let current = entity_state(&["X", "helper"], Some(100));
        let outcome = check(Some(&current), &resolution(&["X"], Some(90)));
        assert!(!outcome.ok);
        assert_eq!(outcome.missing_symbols, vec!["helper".to_string()]);
    }

    #[test]
    fn node_count_collapse_below_half_fails() {
        let current = entity_state(&["X"], Some(100));
        let outcome = check(Some(&current), &resolution(&["X"], Some(30)));
        assert!(!outcome.ok);
        assert!(outcome.collapsed);
    }

    #[test]
    fn superset_passes() {
        let current = entity_state(&["X"], Some(100));
        let outcome = check(Some(&current), &resolution(&["X", "helper"], Some(120)));
        assert!(outcome.ok);
    }

    #[test]
    fn all_symbols_missing_is_collapse() {
        let current = entity_state(&["X", "helper"], Some(100));
        let outcome = check(Some(&current), &resolution(&["Other"], Some(100)));
        assert!(!outcome.ok);
        assert!(outcome.collapsed);
    }
}
