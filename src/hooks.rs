//! The compiler hook: ledger-driven code-generation interception.
//!
//! [`LinkerCodegen`] implements [`CodegenHooks`] over a mutable borrow of the
//! job's [`Ledger`]. On first sight a reference is recorded as pending and the
//! compiler's default lookup code stands; once the driver has resolved it to a
//! module request, later passes substitute a dependency-injection expression.
//! Interception is strictly additive - with nothing resolved, the hooked
//! compiler produces byte-identical output to the unhooked one.

use regex::Regex;
use tracing::trace;

use crate::compiler::CodegenHooks;
use crate::ledger::{Ledger, Resolution};
use crate::literal;
use crate::reference::{PARTIAL_BLOCK, RefKey, ReferenceKind};

/// JSON-escape a module request for direct inclusion in emitted code.
fn json(request: &str) -> String {
    // Strings always serialize.
    serde_json::to_string(request).unwrap_or_default()
}

/// A `require(...)` dependency-injection expression.
fn require_expr(request: &str) -> String {
    format!("require({})", json(request))
}

/// A `require(...)` wrapped in the default-export unwrap helper, so both
/// ES-module default exports and bare CommonJS values work uniformly.
fn default_require_expr(request: &str) -> String {
    format!("__default(require({}))", json(request))
}

/// Code-generation hooks for one compile pass.
pub struct LinkerCodegen<'a> {
    ledger: &'a mut Ledger,
    inline_requires: Option<&'a Regex>,
}

impl<'a> LinkerCodegen<'a> {
    pub fn new(ledger: &'a mut Ledger, inline_requires: Option<&'a Regex>) -> Self {
        Self { ledger, inline_requires }
    }

    /// Ledger consultation shared by the unambiguous kinds: record on first
    /// sight, emit injection code once a module request is known.
    fn lookup(&mut self, key: RefKey, inject: fn(&str) -> String) -> Option<String> {
        match self.ledger.get(&key) {
            None => {
                self.ledger.record(key);
                None
            }
            Some(Resolution::Pending | Resolution::Unresolved) => None,
            Some(Resolution::Module(request)) => {
                trace!(reference = %key, %request, "emitting dependency injection");
                Some(inject(request))
            }
        }
    }
}

impl CodegenHooks for LinkerCodegen<'_> {
    fn name_lookup(&mut self, name: &str, kind: ReferenceKind) -> Option<String> {
        match kind {
            ReferenceKind::Partial => {
                // Built-in block-partial marker, never a module dependency.
                if name == PARTIAL_BLOCK {
                    return None;
                }
                self.lookup(RefKey::new(kind, name), require_expr)
            }
            ReferenceKind::Helper | ReferenceKind::Decorator => {
                self.lookup(RefKey::new(kind, name), default_require_expr)
            }
            ReferenceKind::ContextOrHelper => {
                // A previously promoted entry lives under the helper key and
                // is emitted as a helper; otherwise record the ambiguous key
                // and let the default context lookup stand.
                let helper_key = RefKey::new(ReferenceKind::Helper, name);
                if let Some(Resolution::Module(request)) = self.ledger.get(&helper_key) {
                    return Some(default_require_expr(request));
                }
                self.ledger.record(RefKey::new(kind, name));
                None
            }
        }
    }

    fn push_string(&mut self, value: &str) -> Option<String> {
        // Whole-value inlining: a literal whose entire value names a module
        // becomes a require of that value.
        let pattern = self.inline_requires?;
        if pattern.is_match(value) {
            trace!(value, "inlining string literal as module request");
            Some(require_expr(value))
        } else {
            None
        }
    }

    fn append_to_buffer(&mut self, chunk: &str) -> Option<String> {
        let pattern = self.inline_requires?;
        // Only quoted literal text chunks are scanned; anything else is
        // already an expression.
        if !chunk.starts_with('"') {
            return None;
        }

        let matches = literal::find_matches(chunk, pattern);
        if matches.is_empty() {
            return None;
        }

        trace!(count = matches.len(), "splicing inline requires into buffered chunk");
        Some(literal::splice(chunk, &matches, |m| {
            format!("\" + {} + \"", require_expr(m))
        }))
    }
}
