//! Linker configuration.
//!
//! [`Options`] mirrors the JSON options object a host build pipeline hands the
//! linker, so it derives `Deserialize` with camelCase field names. All fields
//! have defaults; `Options::default()` is a fully working configuration.
//!
//! The pluggable resolution backend is not part of the deserializable options;
//! it is supplied programmatically through
//! [`link_with_backend`](crate::driver::link_with_backend).

use std::collections::BTreeSet;
use std::path::PathBuf;

use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::error::LinkError;

/// Default candidate extensions for partial search. The empty extension is
/// tried last so an exact request always wins over a suffixed one only when
/// no suffixed file exists earlier in the order.
pub const DEFAULT_EXTENSIONS: [&str; 3] = [".handlebars", ".hbs", ""];

/// Default runtime library import path.
pub const DEFAULT_RUNTIME_PATH: &str = "handlebars/runtime";

/// Default expected runtime format revision (Handlebars 4.x).
pub const DEFAULT_RUNTIME_REVISION: u32 = 8;

/// How an unprefixed reference name becomes a module request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RootRelative {
    /// Resolve relative to the template's own directory (`./name`). Default.
    #[default]
    TemplateRelative,
    /// Prepend a configured root-relative prefix (`<prefix><name>`).
    Prefix(String),
    /// Disabled: the name is already an opaque module request, use it as-is.
    Off,
}

impl RootRelative {
    /// Build the module request for `name` under this policy.
    pub fn apply(&self, name: &str) -> String {
        match self {
            Self::TemplateRelative => format!("./{name}"),
            Self::Prefix(prefix) => format!("{prefix}{name}"),
            Self::Off => name.to_string(),
        }
    }
}

impl<'de> Deserialize<'de> for RootRelative {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // An empty string turns root-relative resolution off, matching the
        // original option shape; any other string is a prefix.
        let s = String::deserialize(deserializer)?;
        if s.is_empty() {
            Ok(Self::Off)
        } else {
            Ok(Self::Prefix(s))
        }
    }
}

/// The runtime library the emitted module binds its payload to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeOptions {
    /// Import path emitted into the output module.
    pub path: String,
    /// Format revision the runtime expects; gated against the compiler's
    /// revision before any compile pass.
    pub revision: u32,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            path: DEFAULT_RUNTIME_PATH.to_string(),
            revision: DEFAULT_RUNTIME_REVISION,
        }
    }
}

impl<'de> Deserialize<'de> for RuntimeOptions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Accepts either a bare import path string or the full form.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Path(String),
            Full {
                path: String,
                #[serde(default = "default_revision")]
                revision: u32,
            },
        }
        fn default_revision() -> u32 {
            DEFAULT_RUNTIME_REVISION
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Path(path) => Self { path, revision: DEFAULT_RUNTIME_REVISION },
            Repr::Full { path, revision } => Self { path, revision },
        })
    }
}

/// Recognized linker options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    /// Runtime library import path and expected format revision.
    pub runtime: RuntimeOptions,

    /// Helper names the compiler should treat as known from the first pass.
    pub known_helpers: Vec<String>,

    /// Extra precompiler options, forwarded opaquely. A `knownHelpers` array
    /// of strings inside is merged into the allowlist.
    pub precompile_options: Map<String, Value>,

    /// How unprefixed reference names become module requests.
    pub root_relative: RootRelative,

    /// Extra search directories for partials, tried before the template's own
    /// directory.
    pub partial_dirs: Vec<PathBuf>,

    /// Extra search directories for helpers and ambiguous references.
    pub helper_dirs: Vec<PathBuf>,

    /// Extra search directories for decorators.
    pub decorator_dirs: Vec<PathBuf>,

    /// Candidate file extensions for partial search, in order. Accepts a list
    /// or a single space/comma/semicolon-delimited string.
    #[serde(deserialize_with = "deserialize_extensions")]
    pub extensions: Vec<String>,

    /// Regex selecting literal values and embedded text eligible for inline
    /// dependency extraction.
    pub inline_requires: Option<String>,

    /// Regex vetoing resolved paths from becoming dependencies. A vetoed
    /// resolution counts as not-found and the search continues.
    pub exclude: Option<String>,

    /// Verbose resolution tracing in the CLI. Library code always traces
    /// through `tracing`; this only raises the subscriber level.
    pub debug: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            runtime: RuntimeOptions::default(),
            known_helpers: Vec::new(),
            precompile_options: Map::new(),
            root_relative: RootRelative::default(),
            partial_dirs: Vec::new(),
            helper_dirs: Vec::new(),
            decorator_dirs: Vec::new(),
            extensions: DEFAULT_EXTENSIONS.iter().map(ToString::to_string).collect(),
            inline_requires: None,
            exclude: None,
            debug: false,
        }
    }
}

impl Options {
    /// The initial known-helpers allowlist: the top-level option merged with
    /// any `knownHelpers` string array inside the opaque precompiler options.
    pub fn initial_known_helpers(&self) -> BTreeSet<String> {
        let mut set: BTreeSet<String> = self.known_helpers.iter().cloned().collect();
        if let Some(Value::Array(extra)) = self.precompile_options.get("knownHelpers") {
            set.extend(extra.iter().filter_map(|v| v.as_str().map(ToString::to_string)));
        }
        set
    }

    /// Compile the inline-requires pattern, if configured.
    pub fn inline_requires_regex(&self) -> Result<Option<Regex>, LinkError> {
        compile_pattern(self.inline_requires.as_deref(), "inlineRequires")
    }

    /// Compile the exclusion pattern, if configured.
    pub fn exclude_regex(&self) -> Result<Option<Regex>, LinkError> {
        compile_pattern(self.exclude.as_deref(), "exclude")
    }
}

fn compile_pattern(source: Option<&str>, option: &'static str) -> Result<Option<Regex>, LinkError> {
    source
        .map(|pattern| {
            Regex::new(pattern).map_err(|source| LinkError::Pattern {
                option,
                pattern: pattern.to_string(),
                source,
            })
        })
        .transpose()
}

fn deserialize_extensions<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        List(Vec<String>),
        Delimited(String),
    }

    Ok(match Repr::deserialize(deserializer)? {
        Repr::List(list) => list,
        Repr::Delimited(s) => {
            s.split([' ', ',', ';']).map(ToString::to_string).collect()
        }
    })
}
