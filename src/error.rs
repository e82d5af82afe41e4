//! Error taxonomy for linking jobs.
//!
//! Every fatal condition surfaces exactly once, through the `Result` returned
//! by [`link`](crate::driver::link); no partial output is ever emitted
//! alongside an error. A reference that merely fails to resolve is *not* an
//! error - it stays a runtime lookup in the compiled output and never reaches
//! this module.

use thiserror::Error;

use crate::compiler::SyntaxError;
use crate::reference::ReferenceKind;

/// Fatal failures of a linking job.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The template compiler's output format revision does not match the
    /// runtime library the emitted module would bind to. Reported before any
    /// compile pass is attempted.
    #[error(
        "handlebars compiler revision {compiler} does not match runtime revision {runtime}; \
         emitted modules would fail to load"
    )]
    VersionMismatch { compiler: u32, runtime: u32 },

    /// The compiler library rejected the template source.
    #[error("template syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    /// The resolution backend reported a hard error (distinct from
    /// "not found") while resolving one reference. First error wins; the job
    /// aborts without waiting for other in-flight resolutions.
    #[error("failed to resolve {kind} '{name}'")]
    Resolution {
        kind: ReferenceKind,
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// A configured regex option failed to compile.
    #[error("invalid {option} pattern '{pattern}'")]
    Pattern {
        option: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
