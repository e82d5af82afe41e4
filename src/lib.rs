//! hbs-link - build-time Handlebars template linker
//!
//! Compiles a Handlebars template into a small JavaScript module whose
//! symbolic references (partials, helpers, decorators, and ambiguous
//! context-or-helper names) are resolved at build time into explicit
//! `require(...)` dependency-injection expressions. References that cannot be
//! resolved keep the compiler's original runtime-lookup code, so linking never
//! fails just because a name stayed dynamic.
//!
//! # Architecture Overview
//!
//! Linking one template is an iterative fixed-point job:
//!
//! 1. The [`driver`] invokes an external [`compiler::TemplateCompiler`] with
//!    the [`hooks`] layer installed on its code-generation stage.
//! 2. The hooks record every symbolic reference they meet into the per-job
//!    [`ledger::Ledger`] and, for already-resolved entries, substitute
//!    dependency-injection expressions for runtime lookups.
//! 3. The driver resolves all newly recorded references concurrently through
//!    the [`resolver`] (directory and extension search over a pluggable async
//!    backend).
//! 4. If anything new resolved, recompile with the enlarged knowledge;
//!    otherwise emit the final module body.
//!
//! Embedded references inside already-escaped literal text chunks (for
//! example image paths in HTML attributes) are handled by the [`literal`]
//! extractor, which splices dependency-injection calls into the escaped
//! literal without disturbing its quoting.
//!
//! # Core Modules
//!
//! - [`config`] - recognized options, mirroring the host's JSON options object
//! - [`reference`] / [`ledger`] - reference identities and resolution state
//! - [`compiler`] - the trait seam to the external template compiler
//! - [`hooks`] - code-generation interception backed by the ledger
//! - [`resolver`] - request building plus directory/extension search
//! - [`literal`] - dependency extraction from escaped string literals
//! - [`driver`] - the fixed-point loop and module emission
//! - [`mini`] - a miniature reference compiler for the CLI and tests
//!
//! # Example
//!
//! ```rust,no_run
//! use hbs_link::{config::Options, driver::link, mini::MiniCompiler};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), hbs_link::error::LinkError> {
//! let compiler = MiniCompiler::new();
//! let module = link(
//!     "Hello {{> greeting}}",
//!     Path::new("src/views"),
//!     &Options::default(),
//!     &compiler,
//! )
//! .await?;
//! assert!(module.contains("module.exports"));
//! # Ok(())
//! # }
//! ```
//!
//! # Output shapes
//!
//! An empty template source produces a stub module returning an empty string,
//! with no runtime import. Anything else produces a module that imports the
//! configured runtime library, defines a default-export unwrap helper, and
//! binds the precompiled payload to the runtime's template constructor.

// Core engine
pub mod compiler;
pub mod driver;
pub mod hooks;
pub mod ledger;
pub mod literal;
pub mod reference;
pub mod resolver;

// Configuration and errors
pub mod config;
pub mod error;

// Host shim
pub mod cli;

// Reference compiler for the CLI and tests
pub mod mini;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::Options;
pub use driver::{link, link_with_backend};
pub use error::LinkError;
