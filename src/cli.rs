//! Command-line host shim.
//!
//! Links a single template file and writes the emitted module to stdout or a
//! file. This is the standalone stand-in for a build-pipeline host: it loads
//! the same JSON options object a host would pass programmatically and drives
//! the linker with the built-in [`MiniCompiler`](crate::mini::MiniCompiler).
//! Real pipelines embed the library and supply their own compiler.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::config::Options;
use crate::driver::link;
use crate::mini::MiniCompiler;

/// Compile a Handlebars template into a module with statically resolved
/// dependencies.
#[derive(Debug, Parser)]
#[command(name = "hbs-link", version, about)]
pub struct Cli {
    /// Template file to link
    template: PathBuf,

    /// JSON file with linker options
    #[arg(long, value_name = "FILE")]
    options: Option<PathBuf>,

    /// Write the emitted module here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Trace every compile pass and resolution attempt
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let options = match &self.options {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read options file {}", path.display()))?;
                serde_json::from_str::<Options>(&text)
                    .with_context(|| format!("invalid options file {}", path.display()))?
            }
            None => Options::default(),
        };

        init_tracing(self.verbose || options.debug);

        let source = std::fs::read_to_string(&self.template)
            .with_context(|| format!("failed to read template {}", self.template.display()))?;
        let template_dir = self
            .template
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), PathBuf::from);

        let compiler = MiniCompiler::new();
        let module = link(&source, &template_dir, &options, &compiler)
            .await
            .with_context(|| format!("failed to link {}", self.template.display()))?;

        match &self.output {
            Some(path) => std::fs::write(path, module)
                .with_context(|| format!("failed to write {}", path.display()))?,
            None => print!("{module}"),
        }

        Ok(())
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("hbs_link=debug")
    } else {
        EnvFilter::from_default_env()
    };
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init();
}
