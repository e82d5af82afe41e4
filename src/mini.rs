//! A miniature reference precompiler.
//!
//! Real hosts drive the linker with a full Handlebars-compatible precompiler
//! behind the [`TemplateCompiler`] trait. [`MiniCompiler`] is a deliberately
//! tiny subset used by the CLI and the test suite: it understands text,
//! comments, partials (`{{> name}}`), decorators (`{{*name}}`), block open
//! and close tags, helper invocations with arguments, and bare identifiers.
//! It does not implement paths, hashes, subexpressions or whitespace control.
//!
//! What it does implement faithfully is the code-generation contract the
//! linker depends on: every symbolic lookup, string-literal push and buffered
//! text chunk is routed through [`CodegenHooks`], `knownHelpersOnly` governs
//! how bare identifiers compile after the first pass, and an unknown helper
//! invoked with arguments under `knownHelpersOnly` is a compile error, as in
//! the real compiler.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::compiler::{CodegenHooks, PrecompileOptions, SyntaxError, TemplateCompiler};
use crate::config::DEFAULT_RUNTIME_REVISION;
use crate::reference::ReferenceKind;

fn json(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

/// Miniature [`TemplateCompiler`] for tests and the demo CLI.
#[derive(Debug)]
pub struct MiniCompiler {
    revision: u32,
    passes: AtomicU32,
}

impl Default for MiniCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl MiniCompiler {
    pub fn new() -> Self {
        Self {
            revision: DEFAULT_RUNTIME_REVISION,
            passes: AtomicU32::new(0),
        }
    }

    /// Override the reported format revision (for version-gate tests).
    pub fn with_revision(mut self, revision: u32) -> Self {
        self.revision = revision;
        self
    }

    /// Number of compile passes performed so far.
    pub fn passes(&self) -> u32 {
        self.passes.load(Ordering::Relaxed)
    }
}

impl TemplateCompiler for MiniCompiler {
    fn revision(&self) -> u32 {
        self.revision
    }

    fn precompile(
        &self,
        source: &str,
        options: &PrecompileOptions,
        hooks: &mut dyn CodegenHooks,
    ) -> Result<String, SyntaxError> {
        self.passes.fetch_add(1, Ordering::Relaxed);

        let mut parts: Vec<String> = Vec::new();
        let mut rest = source;

        while let Some(open) = rest.find("{{") {
            if open > 0 {
                push_text(&mut parts, &rest[..open], hooks);
            }
            let after = &rest[open + 2..];
            let close = after
                .find("}}")
                .ok_or_else(|| SyntaxError("unclosed mustache expression".to_string()))?;
            let tag = after[..close].trim();
            rest = &after[close + 2..];
            compile_tag(tag, options, hooks, &mut parts)?;
        }
        if !rest.is_empty() {
            push_text(&mut parts, rest, hooks);
        }

        let body = if parts.is_empty() {
            "return \"\";".to_string()
        } else {
            format!("return {};", parts.join("\n      + "))
        };

        Ok(format!(
            "{{\"compiler\":[{}],\"main\":function(container,depth0,helpers,partials,data) {{\n      {}\n  }}}}",
            self.revision, body
        ))
    }
}

fn push_text(parts: &mut Vec<String>, text: &str, hooks: &mut dyn CodegenHooks) {
    let quoted = json(text);
    parts.push(hooks.append_to_buffer(&quoted).unwrap_or(quoted));
}

fn compile_tag(
    tag: &str,
    options: &PrecompileOptions,
    hooks: &mut dyn CodegenHooks,
    parts: &mut Vec<String>,
) -> Result<(), SyntaxError> {
    let Some(first) = tag.chars().next() else {
        return Err(SyntaxError("empty mustache expression".to_string()));
    };

    match first {
        // Comments and block closes generate no code.
        '!' | '/' => Ok(()),
        '>' => {
            let name = tag[1..].trim();
            let lookup = hooks
                .name_lookup(name, ReferenceKind::Partial)
                .unwrap_or_else(|| format!("lookupProperty(partials,{})", json(name)));
            parts.push(format!("container.invokePartial({lookup},depth0,data)"));
            Ok(())
        }
        '*' => {
            let name = tag[1..].trim();
            let lookup = hooks
                .name_lookup(name, ReferenceKind::Decorator)
                .unwrap_or_else(|| format!("lookupProperty(decorators,{})", json(name)));
            parts.push(format!("container.decorate({lookup},depth0)"));
            Ok(())
        }
        '#' => {
            let tokens = tokenize(&tag[1..])?;
            let name = tokens.first().cloned().unwrap_or_default();
            let args = compile_args(&tokens[1..], hooks);
            let lookup = hooks
                .name_lookup(&name, ReferenceKind::Helper)
                .unwrap_or_else(|| format!("lookupProperty(helpers,{})", json(&name)));
            parts.push(format!("{lookup}.call(depth0,{args}options)"));
            Ok(())
        }
        _ => {
            let tokens = tokenize(tag)?;
            let name = tokens.first().cloned().unwrap_or_default();

            if tokens.len() > 1 {
                // Helper invocation with arguments.
                if options.known_helpers_only && !options.known_helpers.contains(&name) {
                    return Err(SyntaxError(format!(
                        "you specified knownHelpersOnly, but used the unknown helper {name}"
                    )));
                }
                let args = compile_args(&tokens[1..], hooks);
                let lookup = hooks
                    .name_lookup(&name, ReferenceKind::Helper)
                    .unwrap_or_else(|| format!("lookupProperty(helpers,{})", json(&name)));
                parts.push(format!(
                    "container.escapeExpression({lookup}.call(depth0,{args}data))"
                ));
            } else if options.known_helpers.contains(&name) {
                // A known zero-argument helper.
                let lookup = hooks
                    .name_lookup(&name, ReferenceKind::Helper)
                    .unwrap_or_else(|| format!("lookupProperty(helpers,{})", json(&name)));
                parts.push(format!("container.escapeExpression({lookup}.call(depth0))"));
            } else {
                // Ambiguous: context field or zero-argument helper.
                match hooks.name_lookup(&name, ReferenceKind::ContextOrHelper) {
                    Some(injected) => parts.push(format!(
                        "container.escapeExpression({injected}.call(depth0))"
                    )),
                    None => parts.push(format!(
                        "container.escapeExpression(lookupProperty(depth0,{}))",
                        json(&name)
                    )),
                }
            }
            Ok(())
        }
    }
}

/// Compile argument tokens to code, routing string literals through the
/// `push_string` hook. Produces a trailing comma when non-empty.
fn compile_args(tokens: &[String], hooks: &mut dyn CodegenHooks) -> String {
    let mut out = String::new();
    for token in tokens {
        let code = if let Some(value) = token.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
            hooks.push_string(value).unwrap_or_else(|| json(value))
        } else {
            format!("lookupProperty(depth0,{})", json(token))
        };
        out.push_str(&code);
        out.push(',');
    }
    out
}

/// Split a mustache body into whitespace-separated tokens, keeping quoted
/// strings (with their quotes) as single tokens.
fn tokenize(body: &str) -> Result<Vec<String>, SyntaxError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in body.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if in_quotes {
        return Err(SyntaxError(format!("unterminated string literal in {{{{{body}}}}}")));
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}
