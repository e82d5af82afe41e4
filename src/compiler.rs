//! The seam between the linker and the template compiler library.
//!
//! The linker does not compile Handlebars expressions itself. It drives an
//! external, versioned precompiler through the [`TemplateCompiler`] trait and
//! observes its code generation through the three [`CodegenHooks`] callback
//! slots. Whatever the hooks decline to rewrite, the compiler emits exactly as
//! it would unhooked, so first-pass output is always a valid fallback.

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::reference::ReferenceKind;

/// A template source the compiler library rejected. Fatal, never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct SyntaxError(pub String);

/// Options forwarded to the precompiler on each pass.
#[derive(Debug, Clone, Default)]
pub struct PrecompileOptions {
    /// Names the compiler must treat as helpers rather than context fields.
    /// Grows monotonically across passes as ambiguous references resolve.
    pub known_helpers: BTreeSet<String>,
    /// When set, an unrecognized bare identifier compiles as a context lookup
    /// instead of a possible helper invocation. False only on the first pass.
    pub known_helpers_only: bool,
    /// Caller-supplied compiler options, forwarded opaquely.
    pub extra: Map<String, Value>,
}

/// Interception points into the compiler's code-generation stage.
///
/// Each method may return replacement code; `None` means "emit what you would
/// have emitted anyway". Implementations must be additive: they never change
/// behavior except to substitute a dependency-injection expression for a
/// runtime lookup they can prove resolvable.
pub trait CodegenHooks {
    /// A symbolic lookup of `name` with reference kind `kind` is being
    /// generated. Return code to emit in place of the default lookup.
    fn name_lookup(&mut self, name: &str, kind: ReferenceKind) -> Option<String>;

    /// A string literal with raw (unescaped) value `value` is being pushed.
    /// Return code to push as a literal expression instead.
    fn push_string(&mut self, value: &str) -> Option<String>;

    /// A buffered output chunk is being appended. `chunk` is the literal
    /// exactly as it appears in generated code: quoted and escaped. Return a
    /// replacement expression, typically a concatenation splicing in
    /// dependency-injection calls.
    fn append_to_buffer(&mut self, chunk: &str) -> Option<String>;
}

/// An external template precompiler with a wire-format revision.
pub trait TemplateCompiler {
    /// The compiler's output format revision. Must match the runtime library
    /// the emitted module binds to.
    fn revision(&self) -> u32;

    /// Compile `source` into a precompiled template payload, routing code
    /// generation through `hooks`.
    fn precompile(
        &self,
        source: &str,
        options: &PrecompileOptions,
        hooks: &mut dyn CodegenHooks,
    ) -> Result<String, SyntaxError>;
}
