//! The language-keyed regex table for the Resolver's deterministic regex
//! fallback stage (spec.md section 4.4, stage 2).

use once_cell::sync::Lazy;
use regex::Regex;

/// One declaration pattern for a language: `capture` extracts the symbol
/// name; `kind` labels what it declares (used only for diagnostics).
pub struct DeclPattern {
    pub kind: &'static str,
    pub regex: Lazy<Regex>,
}

macro_rules! decl_pattern {
    ($kind:expr, $re:expr) => {
        DeclPattern {
            kind: $kind,
            regex: Lazy::new(|| Regex::new($re).expect("static pattern must compile")),
        }
    };
}

pub static GO_PATTERNS: &[DeclPattern] = &[
    decl_pattern!("func", r"(?m)^func\s+(?:\([^)]*\)\s*)?(\w+)\s*\("),
    decl_pattern!("type", r"(?m)^type\s+(\w+)\s+(?:struct|interface)\b"),
];

pub static RUST_PATTERNS: &[DeclPattern] = &[
    decl_pattern!("fn", r"(?m)^\s*(?:pub\s+)?(?:async\s+)?fn\s+(\w+)\s*[(<]"),
    decl_pattern!("struct", r"(?m)^\s*(?:pub\s+)?struct\s+(\w+)\b"),
    decl_pattern!("enum", r"(?m)^\s*(?:pub\s+)?enum\s+(\w+)\b"),
    decl_pattern!("trait", r"(?m)^\s*(?:pub\s+)?trait\s+(\w+)\b"),
];

pub static PYTHON_PATTERNS: &[DeclPattern] = &[
    decl_pattern!("def", r"(?m)^\s*def\s+(\w+)\s*\("),
    decl_pattern!("class", r"(?m)^\s*class\s+(\w+)\b"),
];

pub static JAVASCRIPT_PATTERNS: &[DeclPattern] = &[
    decl_pattern!("function", r"(?m)^\s*(?:export\s+)?(?:async\s+)?function\s+(\w+)\s*\("),
    decl_pattern!("class", r"(?m)^\s*(?:export\s+)?class\s+(\w+)\b"),
];

/// Resolve a language hint (file extension or explicit tag) to its pattern
/// table. Unknown hints fall back to `None` so the caller can try every
/// table.
pub fn patterns_for_language(hint: &str) -> Option<&'static [DeclPattern]> {
    match hint.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "go" => Some(GO_PATTERNS),
        "rs" | "rust" => Some(RUST_PATTERNS),
        "py" | "python" => Some(PYTHON_PATTERNS),
        "js" | "ts" | "jsx" | "tsx" | "javascript" | "typescript" => Some(JAVASCRIPT_PATTERNS),
        _ => None,
    }
}

pub fn all_pattern_tables() -> [&'static [DeclPattern]; 4] {
    [GO_PATTERNS, RUST_PATTERNS, PYTHON_PATTERNS, JAVASCRIPT_PATTERNS]
}

/// A declaration candidate found in `content` by `table`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub symbol: String,
    pub kind: &'static str,
    /// Whether a `{` appears within a short lookahead, treated as evidence
    /// the full declaration (not a truncated snippet) is present.
    pub full_declaration: bool,
}

pub fn find_candidates(content: &str, table: &[DeclPattern]) -> Vec<Candidate> {
    let mut out = Vec::new();
    for pattern in table {
        for caps in pattern.regex.captures_iter(content) {
            let Some(m) = caps.get(1) else { continue };
            let tail_start = m.end();
            let tail = &content[tail_start..(tail_start + 200).min(content.len())];
            let full_declaration = tail.contains('{') || pattern.kind == "fn" && tail.contains(';');
            out.push(Candidate {
                symbol: m.as_str().to_string(),
                kind: pattern.kind,
                full_declaration,
            });
        }
    }
    out
}

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Za-z_][A-Za-z0-9_]*\b").expect("static pattern must compile"));

/// Every identifier-shaped token in `content`, used by the Resolver's stage-3
/// StateMap correlation fallback. Broader than a declaration match: it picks
/// up mentions, not just declarations.
pub fn textual_identifiers(content: &str) -> std::collections::HashSet<String> {
    IDENTIFIER_RE
        .find_iter(content)
        .map(|m| m.as_str().to_string())
        .collect()
}
