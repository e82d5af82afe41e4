//! The fixed-point compile/resolve driver.
//!
//! A linking job alternates between two stages until it reaches a fixed
//! point: a synchronous compile pass (the hook recording references into the
//! ledger as the compiler meets them) and a concurrent resolve stage (one
//! resolution per pending ledger entry, barrier-joined). A pass that resolves
//! at least one new reference forces a recompile with the enlarged
//! known-helpers set; a pass that resolves nothing is final, even if some
//! references stay unresolved - those remain runtime lookups.
//!
//! Termination: the set of referenceable names in a fixed source is finite
//! and ledger entries never revert, so the loop takes at most one pass more
//! than there are distinct references. [`MAX_PASSES`] caps it anyway in case
//! a compiler implementation violates that monotonicity.

use std::path::Path;

use futures::future::try_join_all;
use tracing::{debug, warn};

use crate::compiler::{PrecompileOptions, TemplateCompiler};
use crate::config::Options;
use crate::error::LinkError;
use crate::hooks::LinkerCodegen;
use crate::ledger::Ledger;
use crate::resolver::{FsBackend, RequestResolver, ResolutionBackend};

/// Defensive cap on compile passes. The termination argument makes this
/// unreachable for a well-behaved compiler.
const MAX_PASSES: u32 = 64;

/// Module emitted for an empty template source: no runtime import at all.
const EMPTY_STUB: &str = "module.exports = function(){return \"\";};\n";

/// Link a template source into a compiled module body, resolving references
/// against the filesystem.
///
/// `template_dir` is the directory of the template itself, searched after any
/// configured kind-specific directories.
pub async fn link(
    source: &str,
    template_dir: &Path,
    options: &Options,
    compiler: &dyn TemplateCompiler,
) -> Result<String, LinkError> {
    link_with_backend(source, template_dir, options, compiler, &FsBackend).await
}

/// [`link`] with a custom resolution backend.
pub async fn link_with_backend(
    source: &str,
    template_dir: &Path,
    options: &Options,
    compiler: &dyn TemplateCompiler,
    backend: &dyn ResolutionBackend,
) -> Result<String, LinkError> {
    // Version gate: refuse before any compile pass.
    let compiler_revision = compiler.revision();
    if compiler_revision != options.runtime.revision {
        return Err(LinkError::VersionMismatch {
            compiler: compiler_revision,
            runtime: options.runtime.revision,
        });
    }

    let inline_requires = options.inline_requires_regex()?;
    let exclude = options.exclude_regex()?;
    let resolver = RequestResolver::new(options, template_dir, backend, exclude);

    let mut ledger = Ledger::new();
    let mut known_helpers = options.initial_known_helpers();
    let mut pass = 0u32;
    let mut payload = String::new();

    loop {
        pass += 1;
        if pass > MAX_PASSES {
            warn!(pass, "compile pass limit reached, finalizing with pending references");
            break;
        }
        debug!(pass, "compilation pass");

        if !source.is_empty() {
            let precompile_options = PrecompileOptions {
                known_helpers: known_helpers.clone(),
                known_helpers_only: pass > 1,
                extra: options.precompile_options.clone(),
            };
            let mut hooks = LinkerCodegen::new(&mut ledger, inline_requires.as_ref());
            payload = compiler.precompile(source, &precompile_options, &mut hooks)?;
        }

        let pending = ledger.pending();
        if pending.is_empty() {
            break;
        }
        debug!(count = pending.len(), "resolving pending references");

        // Barrier: every pending entry is resolved concurrently and all
        // results are merged only after the whole batch completes. A single
        // hard resolver error fails the job.
        let results = try_join_all(pending.into_iter().map(|key| {
            let resolver = &resolver;
            async move {
                match resolver.resolve(&key.name, key.kind).await {
                    Ok(resolved) => Ok((key, resolved)),
                    Err(source) => Err(LinkError::Resolution {
                        kind: key.kind,
                        name: key.name,
                        source,
                    }),
                }
            }
        }))
        .await?;

        let mut progress = false;
        for (key, resolved) in results {
            match resolved {
                Some(request) => {
                    if let Some(promoted) = ledger.mark_module(&key, request) {
                        known_helpers.insert(promoted);
                    } else if key.kind.is_helper_like() {
                        known_helpers.insert(key.name.clone());
                    }
                    progress = true;
                }
                None => ledger.mark_unresolved(&key),
            }
        }

        if !progress {
            break;
        }
    }

    debug!(pass, references = ledger.len(), "fixed point reached, emitting module");
    Ok(emit_module(&payload, options))
}

/// Render the final module body around the precompiled payload.
fn emit_module(payload: &str, options: &Options) -> String {
    if payload.is_empty() {
        return EMPTY_STUB.to_string();
    }

    let runtime = serde_json::to_string(&options.runtime.path).unwrap_or_default();
    format!(
        "var Handlebars = require({runtime});\n\
         function __default(obj) {{ return obj && (obj.__esModule ? obj[\"default\"] : obj); }}\n\
         module.exports = __default(Handlebars).template({payload});\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeOptions;
    use crate::mini::MiniCompiler;
    use crate::reference::ReferenceKind;
    use crate::test_utils::StaticBackend;
    use std::path::PathBuf;

    fn views() -> PathBuf {
        PathBuf::from("/views")
    }

    #[tokio::test]
    async fn test_empty_source_emits_stub_without_runtime_import() {
        let compiler = MiniCompiler::new();
        let out = link_with_backend("", &views(), &Options::default(), &compiler, &StaticBackend::default())
            .await
            .unwrap();
        assert_eq!(out, EMPTY_STUB);
        assert!(!out.contains("Handlebars"));
        // The compiler is never invoked for an empty source.
        assert_eq!(compiler.passes(), 0);
    }

    #[tokio::test]
    async fn test_version_mismatch_fails_before_any_pass() {
        let compiler = MiniCompiler::new().with_revision(7);
        let err = link_with_backend(
            "Hello",
            &views(),
            &Options::default(),
            &compiler,
            &StaticBackend::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, LinkError::VersionMismatch { compiler: 7, runtime: 8 }));
        assert_eq!(compiler.passes(), 0);
    }

    #[tokio::test]
    async fn test_runtime_revision_can_match_custom_compiler() {
        let compiler = MiniCompiler::new().with_revision(7);
        let options = Options {
            runtime: RuntimeOptions { path: "my/runtime".into(), revision: 7 },
            ..Options::default()
        };
        let out = link_with_backend("Hello", &views(), &options, &compiler, &StaticBackend::default())
            .await
            .unwrap();
        assert!(out.contains("require(\"my/runtime\")"));
    }

    #[tokio::test]
    async fn test_reference_free_template_is_single_pass() {
        let compiler = MiniCompiler::new();
        let out = link_with_backend(
            "Hello world",
            &views(),
            &Options::default(),
            &compiler,
            &StaticBackend::default(),
        )
        .await
        .unwrap();

        assert_eq!(compiler.passes(), 1);
        assert!(out.contains("\"Hello world\""));
        assert!(out.contains("module.exports = __default(Handlebars).template("));
    }

    #[tokio::test]
    async fn test_resolved_partial_takes_exactly_two_passes() {
        let compiler = MiniCompiler::new();
        let backend =
            StaticBackend::default().with("/views/greeting.hbs", "./greeting.hbs");
        let out = link_with_backend(
            "Hello {{> greeting}}",
            &views(),
            &Options::default(),
            &compiler,
            &backend,
        )
        .await
        .unwrap();

        assert_eq!(compiler.passes(), 2);
        assert!(out.contains("require(\"./greeting.hbs\")"));
        assert!(!out.contains("lookupProperty(partials"));
    }

    #[tokio::test]
    async fn test_unresolved_helper_stays_runtime_lookup() {
        let compiler = MiniCompiler::new();
        let out = link_with_backend(
            "{{unknownHelper x}}",
            &views(),
            &Options::default(),
            &compiler,
            &StaticBackend::default(),
        )
        .await
        .unwrap();

        // The job succeeds and the original lookup code survives.
        assert!(out.contains("lookupProperty(helpers,\"unknownHelper\")"));
    }

    #[tokio::test]
    async fn test_syntax_error_is_fatal() {
        let compiler = MiniCompiler::new();
        let err = link_with_backend(
            "Hello {{> broken",
            &views(),
            &Options::default(),
            &compiler,
            &StaticBackend::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, LinkError::Syntax(_)));
        assert_eq!(compiler.passes(), 1);
    }

    #[tokio::test]
    async fn test_resolver_error_aborts_job() {
        let compiler = MiniCompiler::new();
        let backend = StaticBackend::default().failing_on("boom");
        let err = link_with_backend(
            "{{> boom}}",
            &views(),
            &Options::default(),
            &compiler,
            &backend,
        )
        .await
        .unwrap_err();

        match err {
            LinkError::Resolution { name, .. } => assert_eq!(name, "boom"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_ambiguous_reference_promotion() {
        let compiler = MiniCompiler::new();
        let backend = StaticBackend::default().with("/views/title", "./title.js");
        let out = link_with_backend(
            "{{title}}",
            &views(),
            &Options::default(),
            &compiler,
            &backend,
        )
        .await
        .unwrap();

        // Promoted to a helper and injected with the default-export unwrap.
        assert!(out.contains("__default(require(\"./title.js\"))"));
        assert_eq!(compiler.passes(), 2);
    }

    #[tokio::test]
    async fn test_same_name_under_two_kinds_resolves_once() {
        // The block helper records `#title` and the bare reference records
        // `?title` in the same pass; both land in the same merge batch and
        // the promotion must coexist with the helper's own result.
        let compiler = MiniCompiler::new();
        let backend = StaticBackend::default().with("/views/title", "./title.js");
        let out = link_with_backend(
            "{{#title}}x{{/title}} {{title}}",
            &views(),
            &Options::default(),
            &compiler,
            &backend,
        )
        .await
        .unwrap();

        assert_eq!(compiler.passes(), 2);
        assert!(out.contains("__default(require(\"./title.js\"))"));
        assert!(!out.contains("lookupProperty(depth0,\"title\")"));
    }

    #[tokio::test]
    async fn test_promotion_survives_helper_probe_miss() {
        // The backend answers only ambiguous probes, so the `#title` result
        // in the batch is a miss. The promoted module binding must still win
        // regardless of which result merges first.
        let compiler = MiniCompiler::new();
        let backend = StaticBackend::default()
            .with("/views/title", "./title.js")
            .answering_only(ReferenceKind::ContextOrHelper);
        let out = link_with_backend(
            "{{#title}}x{{/title}} {{title}}",
            &views(),
            &Options::default(),
            &compiler,
            &backend,
        )
        .await
        .unwrap();

        assert_eq!(compiler.passes(), 2);
        assert!(out.contains("__default(require(\"./title.js\"))"));
        assert!(!out.contains("lookupProperty(helpers,\"title\")"));
    }

    #[tokio::test]
    async fn test_termination_bound_for_distinct_references() {
        // Two references, both resolving on the first attempt: the loop must
        // stay within k + 1 = 3 passes (and in fact needs only 2).
        let compiler = MiniCompiler::new();
        let backend = StaticBackend::default()
            .with("/views/one.hbs", "./one.hbs")
            .with("/views/two.hbs", "./two.hbs");
        link_with_backend(
            "{{> one}} {{> two}}",
            &views(),
            &Options::default(),
            &compiler,
            &backend,
        )
        .await
        .unwrap();

        assert!(compiler.passes() <= 3);
    }
}
