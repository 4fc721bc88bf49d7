//! The four-stage entity resolution pipeline (spec.md section 4.4). Stages
//! run in order; the first stage to succeed wins. Deterministic and
//! side-effect-free: no embeddings, no fuzzy matching, no learned
//! similarity.

use crate::parser::Parser;
use crate::patterns::{all_pattern_tables, find_candidates, patterns_for_language};
use crate::resolution::{Resolution, ResolutionMethod};
use std::collections::HashSet;
use std::sync::Arc;
use tinymem_core::{Confidence, EntityKey};
use tinymem_storage::StateMap;

pub struct Resolver {
    parser: Arc<dyn Parser>,
    state_map: StateMap,
}

impl Resolver {
    pub fn new(parser: Arc<dyn Parser>, state_map: StateMap) -> Self {
        Self { parser, state_map }
    }

    /// Resolve `content`, optionally declared at `filepath` with
    /// `language_hint`.
    pub fn resolve(
        &self,
        content: &str,
        filepath: Option<&str>,
        language_hint: Option<&str>,
    ) -> crate::error::Result<Resolution> {
        if let Some(resolution) = self.stage_ast(content, filepath, language_hint) {
            return Ok(resolution);
        }
        if let Some(resolution) = self.stage_regex(content, filepath, language_hint) {
            return Ok(resolution);
        }
        if let Some(resolution) = self.stage_correlation(content, filepath)? {
            return Ok(resolution);
        }
        Ok(self.stage_failure(filepath))
    }

    /// Stage 1: AST extraction via the (opaque) Parser seam.
    fn stage_ast(
        &self,
        content: &str,
        filepath: Option<&str>,
        language_hint: Option<&str>,
    ) -> Option<Resolution> {
        let outcome = self.parser.parse(content, language_hint);
        let filepath = filepath?;
        if outcome.symbols.is_empty() {
            return None;
        }
        Some(Resolution {
            entity_key: EntityKey::new(filepath, &outcome.symbols[0]),
            symbols: outcome.symbols,
            confidence: Confidence::Confirmed,
            method: ResolutionMethod::AstExtraction,
            ast_node_count: outcome.ast_node_count,
        })
    }

    /// Stage 2: deterministic regex fallback over a language-keyed pattern
    /// table. A unique, fully-declared match is CONFIRMED; anything else
    /// detected is INFERRED.
    fn stage_regex(
        &self,
        content: &str,
        filepath: Option<&str>,
        language_hint: Option<&str>,
    ) -> Option<Resolution> {
        let candidates = match language_hint.and_then(patterns_for_language) {
            Some(table) => find_candidates(content, table),
            None => all_pattern_tables()
                .into_iter()
                .flat_map(|table| find_candidates(content, table))
                .collect(),
        };

        if candidates.is_empty() {
            return None;
        }

        let mut symbols: Vec<String> = candidates.iter().map(|c| c.symbol.clone()).collect();
        symbols.dedup();

        let unique_full = candidates.len() == 1 && candidates[0].full_declaration;
        let confidence = if unique_full {
            Confidence::Confirmed
        } else {
            Confidence::Inferred
        };

        let primary_symbol = &candidates[0].symbol;
        let entity_key = match filepath {
            Some(fp) => EntityKey::new(fp, primary_symbol),
            None => EntityKey::new("unknown", primary_symbol),
        };

        Some(Resolution {
            entity_key,
            symbols,
            confidence,
            method: ResolutionMethod::RegexFallback,
            ast_node_count: None,
        })
    }

    /// Stage 3: correlate the artifact's textual symbol set (every
    /// identifier-shaped token in the content, not just declarations --
    /// broader than stage 2's pattern match) against the existing StateMap.
    /// Never introduces a new entity -- it can only align to one that
    /// already exists.
    fn stage_correlation(
        &self,
        content: &str,
        _filepath: Option<&str>,
    ) -> crate::error::Result<Option<Resolution>> {
        let textual_symbols = crate::patterns::textual_identifiers(content);
        if textual_symbols.is_empty() {
            return Ok(None);
        }

        let existing = self.state_map.get_all()?;
        let mut matches: Vec<Resolution> = Vec::new();

        for entity in existing {
            if entity.metadata.symbols.is_empty() {
                continue;
            }
            let existing_set: HashSet<&String> = entity.metadata.symbols.iter().collect();
            let overlap = existing_set
                .iter()
                .filter(|s| textual_symbols.contains(s.as_str()))
                .count();
            let ratio = overlap as f64 / existing_set.len() as f64;
            if ratio > 0.5 {
                matches.push(Resolution {
                    entity_key: entity.entity_key.clone(),
                    symbols: entity.metadata.symbols.clone(),
                    confidence: Confidence::Inferred,
                    method: ResolutionMethod::StateMapCorrelation,
                    ast_node_count: None,
                });
            }
        }

        // Exactly one entity must cross the threshold (spec.md section 4.4
        // stage 3) -- two or more crossing it is an ambiguous correlation,
        // which falls through toward UNRESOLVED rather than guessing.
        if matches.len() == 1 {
            Ok(matches.pop())
        } else {
            Ok(None)
        }
    }

    fn stage_failure(&self, filepath: Option<&str>) -> Resolution {
        Resolution {
            entity_key: EntityKey::new(filepath.unwrap_or("unknown"), "unknown"),
            symbols: Vec::new(),
            confidence: Confidence::Unresolved,
            method: ResolutionMethod::Unresolved,
            ast_node_count: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{NullParser, ParseOutcome, Parser as ParserTrait};
    use tinymem_core::EntityMetadata;
    use tinymem_storage::Db;

    struct StubParser {
        outcome: ParseOutcome,
    }

    impl ParserTrait for StubParser {
        fn parse(&self, _content: &str, _language_hint: Option<&str>) -> ParseOutcome {
            self.outcome.clone()
        }
    }

    fn resolver_with(parser: Arc<dyn Parser>) -> Resolver {
        let db = Db::open_in_memory().unwrap();
        Resolver::new(parser, StateMap::new(db))
    }

    #[test]
    fn stage1_confirms_when_ast_finds_symbol_and_filepath_known() {
        let parser = Arc::new(StubParser {
            outcome: ParseOutcome { symbols: vec!["Add".into()], ast_node_count: Some(4) },
        });
        let resolver = resolver_with(parser);
        let r = resolver.resolve("func Add(a, b int) int { return a + b }", Some("/math.go"), Some("go")).unwrap();
        assert_eq!(r.confidence, Confidence::Confirmed);
        assert_eq!(r.entity_key.as_str(), "/math.go::Add");
        assert_eq!(r.ast_node_count, Some(4));
    }

    #[test]
    fn stage1_skipped_without_filepath_falls_through_to_regex() {
        let parser = Arc::new(StubParser {
            outcome: ParseOutcome { symbols: vec!["Add".into()], ast_node_count: Some(4) },
        });
        let resolver = resolver_with(parser);
        let r = resolver
            .resolve("func Add(a, b int) int { return a + b }", None, Some("go"))
            .unwrap();
        assert_eq!(r.method, ResolutionMethod::RegexFallback);
        assert_eq!(r.confidence, Confidence::Confirmed);
    }

    #[test]
    fn stage2_unique_match_is_confirmed() {
        let resolver = resolver_with(Arc::new(NullParser));
        let r = resolver
            .resolve("func Subtract(a, b int) int { return a - b }", Some("/math.go"), Some("go"))
            .unwrap();
        assert_eq!(r.method, ResolutionMethod::RegexFallback);
        assert_eq!(r.confidence, Confidence::Confirmed);
        assert_eq!(r.entity_key.as_str(), "/math.go::Subtract");
    }

    #[test]
    fn stage2_ambiguous_match_is_inferred() {
        let resolver = resolver_with(Arc::new(NullParser));
        let content = "func A() int { return 1 }\nfunc B() int { return 2 }";
        let r = resolver.resolve(content, Some("/x.go"), Some("go")).unwrap();
        assert_eq!(r.confidence, Confidence::Inferred);
    }

    #[test]
    fn stage3_correlates_to_existing_entity_without_creating_one() {
        let db = Db::open_in_memory().unwrap();
        let state_map = StateMap::new(db);
        let key = EntityKey::new("/x.go", "helper");
        state_map
            .set(
                &key,
                "/x.go",
                "helper",
                "oldhash",
                Confidence::Confirmed,
                tinymem_core::State::Authoritative,
                &EntityMetadata { symbols: vec!["helper".into()], ast_node_count: Some(10) },
            )
            .unwrap();
        let resolver = Resolver::new(Arc::new(NullParser), state_map);

        // mentions "helper" in prose, not a recognizable declaration in any language table
        let r = resolver.resolve("this references helper loosely", None, None).unwrap();
        assert_eq!(r.confidence, Confidence::Inferred);
        assert_eq!(r.method, ResolutionMethod::StateMapCorrelation);
        assert_eq!(r.entity_key.as_str(), "/x.go::helper");
    }

    #[test]
    fn stage4_unresolved_when_nothing_matches() {
        let resolver = resolver_with(Arc::new(NullParser));
        let r = resolver.resolve("plain english with no code", None, None).unwrap();
        assert_eq!(r.confidence, Confidence::Unresolved);
        assert_eq!(r.method, ResolutionMethod::Unresolved);
    }
}
