//! The Parser seam (spec.md section 6): an opaque structural parser the
//! Resolver consumes. Failure must never raise to the Resolver -- it yields
//! an empty symbol list instead.

/// What a successful parse yields: the top-level symbols declared, and
/// optionally how many AST nodes the declaration comprises.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOutcome {
    pub symbols: Vec<String>,
    pub ast_node_count: Option<u64>,
}

/// A structural parser for one or more source languages. Implementations
/// live outside this crate (spec.md section 1: "source-code parsing
/// grammars (an opaque 'parser' that yields structural symbols)" is
/// explicitly out of scope) -- this trait is the only seam the Resolver
/// needs.
pub trait Parser: Send + Sync {
    /// Parse `content`. `language_hint` is an optional declared language
    /// (file extension or explicit tag); implementations may infer the
    /// language from content when absent. Must never panic -- a parse
    /// failure is communicated as `ParseOutcome { symbols: vec![], .. }`.
    fn parse(&self, content: &str, language_hint: Option<&str>) -> ParseOutcome;
}

/// A parser that never recognizes anything, used to exercise the Resolver's
/// regex/correlation/failure fallback stages in isolation.
#[derive(Debug, Default)]
pub struct NullParser;

impl Parser for NullParser {
    fn parse(&self, _content: &str, _language_hint: Option<&str>) -> ParseOutcome {
        ParseOutcome::default()
    }
}
