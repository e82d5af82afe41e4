//! Test utilities for hbs-link.
//!
//! Provides a scripted in-memory resolution backend so linking scenarios run
//! without touching the filesystem, plus one-shot logging initialization for
//! tests. Available to integration tests through the `test-utils` feature.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Once;

use anyhow::{Result, bail};
use futures::future::BoxFuture;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::reference::ReferenceKind;
use crate::resolver::ResolutionBackend;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has any effect. Respects `RUST_LOG` when no explicit
/// level is given; stays silent when neither is provided.
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// Scripted [`ResolutionBackend`]: candidate paths answer from a fixed table.
///
/// Candidates are keyed by their full normalized path string. Anything not in
/// the table is not-found; a name listed via [`failing_on`](Self::failing_on)
/// produces a hard backend error to exercise job-abort paths.
#[derive(Debug, Default)]
pub struct StaticBackend {
    entries: HashMap<String, String>,
    failing: Vec<String>,
    only_kind: Option<ReferenceKind>,
}

impl StaticBackend {
    /// Script `candidate` to resolve to `resolved`.
    #[must_use]
    pub fn with(mut self, candidate: impl Into<String>, resolved: impl Into<String>) -> Self {
        self.entries.insert(candidate.into(), resolved.into());
        self
    }

    /// Script any candidate containing `fragment` to fail hard.
    #[must_use]
    pub fn failing_on(mut self, fragment: impl Into<String>) -> Self {
        self.failing.push(fragment.into());
        self
    }

    /// Answer probes of `kind` only; every other kind is not-found. Lets a
    /// test give the same name different outcomes per reference kind.
    #[must_use]
    pub fn answering_only(mut self, kind: ReferenceKind) -> Self {
        self.only_kind = Some(kind);
        self
    }
}

impl ResolutionBackend for StaticBackend {
    fn probe<'a>(
        &'a self,
        candidate: &'a Path,
        kind: ReferenceKind,
    ) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move {
            let key = candidate.to_string_lossy();
            if self.failing.iter().any(|fragment| key.contains(fragment)) {
                bail!("scripted backend failure for {key}");
            }
            if self.only_kind.is_some_and(|only| only != kind) {
                return Ok(None);
            }
            Ok(self.entries.get(key.as_ref()).cloned())
        })
    }
}
