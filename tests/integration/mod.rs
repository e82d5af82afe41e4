//! End-to-end linking scenarios.
//!
//! Each test drives the public `link` / `link_with_backend` entry points the
//! way a build-pipeline host would: template source in, module body out.
//!
//! ```bash
//! cargo test --test integration
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use hbs_link::config::{Options, RuntimeOptions};
use hbs_link::error::LinkError;
use hbs_link::mini::MiniCompiler;
use hbs_link::reference::ReferenceKind;
use hbs_link::test_utils::{StaticBackend, init_test_logging};
use hbs_link::{link, link_with_backend};
use tempfile::TempDir;

fn views() -> PathBuf {
    PathBuf::from("/views")
}

#[tokio::test]
async fn links_partial_from_the_filesystem() {
    init_test_logging(None);
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("greeting.hbs"), "<p>hi</p>").unwrap();

    let compiler = MiniCompiler::new();
    let module = link(
        "Hello {{> greeting}}",
        tmp.path(),
        &Options::default(),
        &compiler,
    )
    .await
    .unwrap();

    // Second pass replaced the partial lookup with a dependency injection on
    // the resolved path, and the module binds the payload to the runtime.
    assert_eq!(compiler.passes(), 2);
    assert!(module.contains("container.invokePartial(require("));
    assert!(module.contains("greeting.hbs"));
    assert!(module.contains("var Handlebars = require(\"handlebars/runtime\");"));
    assert!(module.contains("module.exports = __default(Handlebars).template("));
}

#[tokio::test]
async fn empty_source_emits_the_stub_module() {
    let compiler = MiniCompiler::new();
    let module = link("", Path::new("."), &Options::default(), &compiler).await.unwrap();

    assert_eq!(module, "module.exports = function(){return \"\";};\n");
    assert_eq!(compiler.passes(), 0);
}

#[tokio::test]
async fn unresolved_helper_keeps_runtime_lookup_and_succeeds() {
    let tmp = TempDir::new().unwrap();
    let compiler = MiniCompiler::new();
    let module = link(
        "{{unknownHelper x}}",
        tmp.path(),
        &Options::default(),
        &compiler,
    )
    .await
    .unwrap();

    assert!(module.contains("lookupProperty(helpers,\"unknownHelper\")"));
    assert!(!module.contains("require(\"./unknownHelper\")"));
}

#[tokio::test]
async fn version_mismatch_fails_before_compiling() {
    let compiler = MiniCompiler::new();
    let options = Options {
        runtime: RuntimeOptions { path: "handlebars/runtime".into(), revision: 7 },
        ..Options::default()
    };
    let err = link("Hello", Path::new("."), &options, &compiler).await.unwrap_err();

    assert!(matches!(err, LinkError::VersionMismatch { compiler: 8, runtime: 7 }));
    assert_eq!(compiler.passes(), 0);
}

#[tokio::test]
async fn inline_requires_splices_dependencies_into_literal_text() {
    let compiler = MiniCompiler::new();
    let options = Options {
        inline_requires: Some(r"\./images/[\w./-]+".into()),
        ..Options::default()
    };
    let module = link_with_backend(
        r#"<img src="./images/cat.png"> and <img src="./images/dog.png">"#,
        &views(),
        &options,
        &compiler,
        &StaticBackend::default(),
    )
    .await
    .unwrap();

    assert!(module.contains(r#"" + require("./images/cat.png") + ""#));
    assert!(module.contains(r#"" + require("./images/dog.png") + ""#));
    // The surrounding markup survives inside the re-quoted segments.
    assert!(module.contains("img src="));
}

#[tokio::test]
async fn whole_value_helper_argument_is_inlined() {
    let compiler = MiniCompiler::new();
    let options = Options {
        inline_requires: Some(r"^\./images/".into()),
        ..Options::default()
    };
    let module = link_with_backend(
        r#"{{img "./images/cat.png"}}"#,
        &views(),
        &options,
        &compiler,
        &StaticBackend::default(),
    )
    .await
    .unwrap();

    assert!(module.contains("require(\"./images/cat.png\")"));
}

#[tokio::test]
async fn ambiguous_name_is_promoted_to_helper() {
    let compiler = MiniCompiler::new();
    let backend = StaticBackend::default().with("/views/title", "./helpers/title.js");
    let module = link_with_backend("{{title}}", &views(), &Options::default(), &compiler, &backend)
        .await
        .unwrap();

    assert_eq!(compiler.passes(), 2);
    assert!(module.contains("__default(require(\"./helpers/title.js\"))"));
    assert!(!module.contains("lookupProperty(depth0,\"title\")"));
}

#[tokio::test]
async fn block_helper_and_bare_reference_share_a_name() {
    // `{{#title}}` and `{{title}}` record the same name under two kinds in
    // one pass; both resolutions land in the same merge batch and must end
    // up as a single helper binding.
    let compiler = MiniCompiler::new();
    let backend = StaticBackend::default().with("/views/title", "./title.js");
    let module = link_with_backend(
        "{{#title}}x{{/title}} {{title}}",
        &views(),
        &Options::default(),
        &compiler,
        &backend,
    )
    .await
    .unwrap();

    assert_eq!(compiler.passes(), 2);
    assert!(module.contains("__default(require(\"./title.js\"))"));
    // Once promoted, the name is never compiled as a context-field lookup.
    assert!(!module.contains("lookupProperty(depth0,\"title\")"));
}

#[tokio::test]
async fn shared_name_promotion_survives_helper_miss() {
    // Divergent outcomes for the two kinds: the helper probe misses while
    // the ambiguous probe resolves. Whichever result merges first, the
    // promoted module binding must survive into the output.
    let compiler = MiniCompiler::new();
    let backend = StaticBackend::default()
        .with("/views/title", "./title.js")
        .answering_only(ReferenceKind::ContextOrHelper);
    let module = link_with_backend(
        "{{#title}}x{{/title}} {{title}}",
        &views(),
        &Options::default(),
        &compiler,
        &backend,
    )
    .await
    .unwrap();

    assert!(module.contains("__default(require(\"./title.js\"))"));
    assert!(!module.contains("lookupProperty(helpers,\"title\")"));
}

#[tokio::test]
async fn excluded_resolution_stays_a_runtime_lookup() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("greeting.hbs"), "hi").unwrap();

    let compiler = MiniCompiler::new();
    let options = Options {
        exclude: Some("greeting".into()),
        ..Options::default()
    };
    let module = link("{{> greeting}}", tmp.path(), &options, &compiler).await.unwrap();

    assert_eq!(compiler.passes(), 1);
    assert!(module.contains("lookupProperty(partials,\"greeting\")"));
}

#[tokio::test]
async fn escaped_reference_bypasses_search() {
    let compiler = MiniCompiler::new();
    let module = link_with_backend(
        "{{> $shared/header}}",
        &views(),
        &Options::default(),
        &compiler,
        &StaticBackend::default(),
    )
    .await
    .unwrap();

    assert!(module.contains("require(\"shared/header\")"));
}

#[tokio::test]
async fn partial_block_marker_never_becomes_a_dependency() {
    let compiler = MiniCompiler::new();
    let backend = StaticBackend::default().with("/views/@partial-block", "./oops");
    let module = link_with_backend(
        "{{> @partial-block}}",
        &views(),
        &Options::default(),
        &compiler,
        &backend,
    )
    .await
    .unwrap();

    assert_eq!(compiler.passes(), 1);
    assert!(module.contains("lookupProperty(partials,\"@partial-block\")"));
    assert!(!module.contains("require(\"./oops\")"));
}

#[tokio::test]
async fn host_options_json_round_trip() {
    let tmp = TempDir::new().unwrap();
    let shared = tmp.path().join("shared");
    fs::create_dir(&shared).unwrap();
    fs::write(shared.join("card.handlebars"), "<div/>").unwrap();

    let options: Options = serde_json::from_str(&format!(
        r#"{{
            "runtime": "my/runtime",
            "partialDirs": [{}],
            "extensions": ".handlebars"
        }}"#,
        serde_json::to_string(shared.to_str().unwrap()).unwrap()
    ))
    .unwrap();

    let compiler = MiniCompiler::new();
    let module = link("{{> card}}", tmp.path(), &options, &compiler).await.unwrap();

    assert!(module.contains("var Handlebars = require(\"my/runtime\");"));
    assert!(module.contains("card.handlebars"));
}

#[tokio::test]
async fn backend_failure_aborts_the_whole_job() {
    let compiler = MiniCompiler::new();
    let backend = StaticBackend::default()
        .with("/views/fine.hbs", "./fine.hbs")
        .failing_on("broken");
    let err = link_with_backend(
        "{{> fine}} {{> broken}}",
        &views(),
        &Options::default(),
        &compiler,
        &backend,
    )
    .await
    .unwrap_err();

    match err {
        LinkError::Resolution { name, .. } => assert_eq!(name, "broken"),
        other => panic!("unexpected error: {other}"),
    }
}
