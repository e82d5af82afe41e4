//! Reference identities for template symbols.
//!
//! Every named thing a template can mention - a partial, a helper, a decorator,
//! or a bare identifier that may be either a data field or a helper - is tracked
//! in the [`Ledger`](crate::ledger::Ledger) under a [`RefKey`]. Keys carry the
//! single-character prefix notation used in trace output (`>greeting`,
//! `#shout`, `*activate`, `?title`), which also disambiguates identically named
//! references of different kinds.

use std::fmt;

use serde::Deserialize;

/// The reserved partial name used for block-partial recursion.
///
/// `{{> @partial-block}}` is a built-in construct; it must never be turned
/// into a module request regardless of what the search directories contain.
pub const PARTIAL_BLOCK: &str = "@partial-block";

/// Prefix marking a reference name as a verbatim module request.
///
/// `{{> $shared/header}}` bypasses directory and extension search entirely;
/// the text after the marker is used as the module request unchanged.
pub const ESCAPE_MARKER: char = '$';

/// The kind of symbolic reference a template compiler reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReferenceKind {
    /// A named sub-template (`{{> name}}`).
    Partial,
    /// A named callable (`{{name arg}}` or `{{#name}}...{{/name}}`).
    Helper,
    /// A block-rendering modifier (`{{*name}}`).
    Decorator,
    /// A bare identifier the compiler cannot classify: it may be a data
    /// context field or a zero-argument helper. Resolution decides.
    ContextOrHelper,
}

impl ReferenceKind {
    /// The ledger-key prefix character for this kind.
    pub const fn prefix(self) -> char {
        match self {
            Self::Partial => '>',
            Self::Helper => '#',
            Self::Decorator => '*',
            Self::ContextOrHelper => '?',
        }
    }

    /// Whether this kind participates in helper directory search and the
    /// known-helpers set. Decorators have their own directories and are
    /// deliberately not helper-like here.
    pub const fn is_helper_like(self) -> bool {
        matches!(self, Self::Helper | Self::ContextOrHelper)
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Partial => "partial",
            Self::Helper => "helper",
            Self::Decorator => "decorator",
            Self::ContextOrHelper => "context-or-helper",
        };
        f.write_str(name)
    }
}

/// Identity of one tracked reference: kind prefix plus name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RefKey {
    pub kind: ReferenceKind,
    pub name: String,
}

impl RefKey {
    pub fn new(kind: ReferenceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// Rewrite an ambiguous context-or-helper key into the helper namespace.
    ///
    /// Called when resolution proves the name is a helper module; from then on
    /// the reference lives under `#name` and the compiler treats it as a
    /// known helper.
    pub fn promote_to_helper(&self) -> Self {
        debug_assert_eq!(self.kind, ReferenceKind::ContextOrHelper);
        Self {
            kind: ReferenceKind::Helper,
            name: self.name.clone(),
        }
    }
}

impl fmt::Display for RefKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.name)
    }
}

/// Split a reference name into its verbatim module request, if escaped.
///
/// Returns `Some(rest)` when `name` starts with [`ESCAPE_MARKER`]; the rest is
/// the module request to use unmodified, skipping all directory search.
pub fn strip_escape_marker(name: &str) -> Option<&str> {
    name.strip_prefix(ESCAPE_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_notation() {
        assert_eq!(RefKey::new(ReferenceKind::Partial, "greeting").to_string(), ">greeting");
        assert_eq!(RefKey::new(ReferenceKind::Helper, "shout").to_string(), "#shout");
        assert_eq!(RefKey::new(ReferenceKind::Decorator, "activate").to_string(), "*activate");
        assert_eq!(RefKey::new(ReferenceKind::ContextOrHelper, "title").to_string(), "?title");
    }

    #[test]
    fn test_promotion_rewrites_kind_only() {
        let key = RefKey::new(ReferenceKind::ContextOrHelper, "title");
        let promoted = key.promote_to_helper();
        assert_eq!(promoted.kind, ReferenceKind::Helper);
        assert_eq!(promoted.name, "title");
    }

    #[test]
    fn test_escape_marker() {
        assert_eq!(strip_escape_marker("$shared/header"), Some("shared/header"));
        assert_eq!(strip_escape_marker("header"), None);
    }

    #[test]
    fn test_helper_like_kinds() {
        assert!(ReferenceKind::Helper.is_helper_like());
        assert!(ReferenceKind::ContextOrHelper.is_helper_like());
        assert!(!ReferenceKind::Partial.is_helper_like());
        assert!(!ReferenceKind::Decorator.is_helper_like());
    }
}
