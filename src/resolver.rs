//! Request resolution: from symbolic reference name to module request.
//!
//! The resolver turns a reference name into a module request string
//! (respecting the `$` verbatim escape and the root-relative policy), then
//! searches an ordered sequence of candidate directories and extensions for a
//! module that answers it. Each `(directory, extension)` candidate is probed
//! through the pluggable asynchronous [`ResolutionBackend`]; the first
//! successful probe wins, a configured exclusion pattern vetoes individual
//! candidates, and exhausting every candidate yields `Ok(None)` - not-found is
//! not an error, it just leaves the reference as a runtime lookup.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use regex::Regex;
use tracing::debug;

use crate::config::{Options, RootRelative};
use crate::reference::{ReferenceKind, strip_escape_marker};

/// Pluggable asynchronous existence/resolution check.
///
/// A backend answers one candidate probe at a time:
/// `Ok(Some(resolved))` on success, `Ok(None)` for not-found, `Err` for a
/// hard failure that aborts the whole job. Backends own their timeout policy;
/// the resolver imposes none.
pub trait ResolutionBackend: Send + Sync {
    fn probe<'a>(
        &'a self,
        candidate: &'a Path,
        kind: ReferenceKind,
    ) -> BoxFuture<'a, Result<Option<String>>>;
}

/// Default backend: the candidate resolves iff it is an existing file.
#[derive(Debug, Default)]
pub struct FsBackend;

impl ResolutionBackend for FsBackend {
    fn probe<'a>(
        &'a self,
        candidate: &'a Path,
        _kind: ReferenceKind,
    ) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move {
            match tokio::fs::metadata(candidate).await {
                Ok(meta) if meta.is_file() => Ok(Some(candidate.to_string_lossy().into_owned())),
                Ok(_) => Ok(None),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(err) => Err(err)
                    .with_context(|| format!("failed to probe {}", candidate.display())),
            }
        })
    }
}

/// Resolves reference names against search directories and extensions.
pub struct RequestResolver<'a> {
    options: &'a Options,
    template_dir: &'a Path,
    backend: &'a dyn ResolutionBackend,
    exclude: Option<Regex>,
}

impl<'a> RequestResolver<'a> {
    pub fn new(
        options: &'a Options,
        template_dir: &'a Path,
        backend: &'a dyn ResolutionBackend,
        exclude: Option<Regex>,
    ) -> Self {
        Self { options, template_dir, backend, exclude }
    }

    /// Build the module request for a reference name.
    ///
    /// Helper and ambiguous references fall back to a bare relative request
    /// when dedicated helper directories are configured: the directories take
    /// precedence over the root-relative prefix.
    fn reference_to_request(&self, name: &str, kind: ReferenceKind) -> String {
        if kind.is_helper_like()
            && !self.options.helper_dirs.is_empty()
            && self.options.root_relative != RootRelative::Off
        {
            return format!("./{name}");
        }
        self.options.root_relative.apply(name)
    }

    /// Candidate directories for a kind: configured kind-specific directories
    /// first, then the template's own directory.
    fn search_dirs(&self, kind: ReferenceKind) -> Vec<&Path> {
        let configured = match kind {
            ReferenceKind::Partial => &self.options.partial_dirs,
            ReferenceKind::Decorator => &self.options.decorator_dirs,
            ReferenceKind::Helper | ReferenceKind::ContextOrHelper => &self.options.helper_dirs,
        };
        configured.iter().map(PathBuf::as_path).chain([self.template_dir]).collect()
    }

    /// Candidate extensions for a kind: only partials have any.
    fn search_extensions(&self, kind: ReferenceKind) -> Vec<&str> {
        match kind {
            ReferenceKind::Partial => self.options.extensions.iter().map(String::as_str).collect(),
            _ => vec![""],
        }
    }

    /// Resolve a reference name of the given kind to a module request.
    ///
    /// `Ok(None)` means every candidate was exhausted or vetoed; the caller
    /// leaves the reference as a runtime lookup.
    pub async fn resolve(&self, name: &str, kind: ReferenceKind) -> Result<Option<String>> {
        // Escaped names are verbatim module requests; no search.
        if let Some(verbatim) = strip_escape_marker(name) {
            debug!(%kind, name, request = verbatim, "using verbatim module request");
            return Ok(Some(verbatim.to_string()));
        }

        let request = self.reference_to_request(name, kind);

        for dir in self.search_dirs(kind) {
            for ext in self.search_extensions(kind) {
                let candidate = normalize(&dir.join(format!("{request}{ext}")));
                debug!(%kind, %request, candidate = %candidate.display(), "attempting to resolve");

                match self.backend.probe(&candidate, kind).await? {
                    Some(resolved) => {
                        if let Some(exclude) = &self.exclude {
                            if exclude.is_match(&resolved) {
                                debug!(%kind, %resolved, "excluding resolved path");
                                continue;
                            }
                        }
                        debug!(%kind, %request, %resolved, "resolved");
                        return Ok(Some(resolved));
                    }
                    None => {
                        debug!(%kind, candidate = %candidate.display(), "failed to resolve");
                    }
                }
            }
        }

        Ok(None)
    }
}

/// Lexically normalize a path: drop `.` components and fold `..` into the
/// preceding component where possible. No filesystem access.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                match out.components().next_back() {
                    Some(Component::Normal(_)) => {
                        out.pop();
                    }
                    _ => out.push(Component::ParentDir),
                }
            }
            other => out.push(other),
        }
    }
    out
}
