//! CLI entry point for the series downloader.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};

mod app;
mod cli;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    app::terminal::init_tracing(app::terminal::default_level(cli.quiet, cli.verbose));

    debug!(?cli, "CLI arguments parsed");
    info!("Series downloader starting");

    let exit = app::runtime::run(cli).await?;
    debug!(?exit, "finished");
    Ok(exit.code())
}
