//! CLI entry point for webdownload.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};

mod app;
mod app_config;
mod cli;

use app::settings::{RunSettings, default_log_level};
use cli::Args;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    let file_config = app_config::load_default_file_config()?;

    // Priority: RUST_LOG env var > quiet flag > verbose flag > config > info
    let default_level = default_log_level(&args, file_config.as_ref().and_then(|c| c.verbosity));
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");
    let settings = RunSettings::resolve(&args, file_config.as_ref());
    debug!(?settings, "settings resolved");
    info!("webdownload starting");

    let summary = app::runtime::run(&args, &settings).await?;
    if summary.failed > 0 {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
