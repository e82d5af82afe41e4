//! hbs-link CLI entry point
//!
//! Parses arguments and runs one linking job. Failures are reported once,
//! with their context chain, and exit non-zero.

use anyhow::Result;
use clap::Parser;
use hbs_link::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(err) = cli.execute().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }

    Ok(())
}
