//! Dependency extraction from escaped string literals.
//!
//! Template text chunks reach the compiler hook as they appear in generated
//! code: a single quoted, escaped string literal. When an inline-requires
//! pattern is configured, embedded substrings naming modules (for example an
//! image path inside an HTML attribute) must be cut out of the literal and
//! replaced with dependency-injection calls, without disturbing the escaping
//! of the surrounding text.
//!
//! # Escape-boundary safety
//!
//! Matching runs directly over the escaped form. That is only sound if no
//! match can start or end inside an escape sequence, so [`find_matches`]
//! discards any candidate whose text contains `"`, `\` or a control
//! character. Patterns are expected to be restricted to plain path-safe
//! characters; a pattern that tries to match escape-sequence characters
//! simply produces no splices.

use std::ops::Range;

use regex::Regex;
use tracing::trace;

/// One matched dependency reference inside an escaped literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralMatch {
    /// Byte span of the match within the escaped literal.
    pub span: Range<usize>,
}

impl LiteralMatch {
    /// The matched text, sliced out of the literal it was found in.
    pub fn text<'a>(&self, literal: &'a str) -> &'a str {
        &literal[self.span.clone()]
    }
}

fn is_escape_safe(text: &str) -> bool {
    !text.chars().any(|c| c == '"' || c == '\\' || c.is_control())
}

/// Find all inline-requireable substrings of an escaped literal.
///
/// Matches are found earliest-first and non-overlapping, scanning left to
/// right with no backtracking into consumed text. Candidates that could span
/// an escape-sequence boundary are dropped (see module docs).
pub fn find_matches(literal: &str, pattern: &Regex) -> Vec<LiteralMatch> {
    pattern
        .find_iter(literal)
        .filter(|m| {
            let safe = is_escape_safe(m.as_str());
            if !safe {
                trace!(matched = m.as_str(), "skipping escape-unsafe inline require match");
            }
            safe
        })
        .map(|m| LiteralMatch { span: m.range() })
        .collect()
}

/// Replace each matched span of `literal` with `transform(match_text)`.
///
/// The transform output is spliced in verbatim and is responsible for closing
/// and reopening the literal's quotes, e.g. `" + require("x.png") + "`, so
/// the result is a syntactically valid concatenation expression. With zero
/// matches the literal is returned unchanged.
pub fn splice<F>(literal: &str, matches: &[LiteralMatch], mut transform: F) -> String
where
    F: FnMut(&str) -> String,
{
    let mut out = String::with_capacity(literal.len());
    let mut consumed = 0;

    for m in matches {
        debug_assert!(m.span.start >= consumed, "matches must be sorted and non-overlapping");
        out.push_str(&literal[consumed..m.span.start]);
        out.push_str(&transform(m.text(literal)));
        consumed = m.span.end;
    }

    out.push_str(&literal[consumed..]);
    out
}
