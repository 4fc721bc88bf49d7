//! The Resolution type: transient Resolver output (spec.md section 3).

use tinymem_core::{Confidence, EntityKey};

/// Which resolution stage produced a `Resolution`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMethod {
    AstExtraction,
    RegexFallback,
    StateMapCorrelation,
    Unresolved,
}

impl ResolutionMethod {
    pub fn label(&self) -> &'static str {
        match self {
            ResolutionMethod::AstExtraction => "ast",
            ResolutionMethod::RegexFallback => "regex",
            ResolutionMethod::StateMapCorrelation => "correlation",
            ResolutionMethod::Unresolved => "unresolved",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub entity_key: EntityKey,
    pub symbols: Vec<String>,
    pub confidence: Confidence,
    pub method: ResolutionMethod,
    pub ast_node_count: Option<u64>,
}
