//! # MushGuard
//!
//! A command-line front end for the `mushguard` library.
//!
//! `mushguard analyze` runs the three-stage mushroom analysis over image files
//! and directories, printing one JSON object per file and optionally recording
//! the results in SQLite. `mushguard check` verifies and loads the models.

mod args;
mod core;
mod db;
mod file;

use anyhow::Result;
use args::{Args, Commands};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// The main entry point for the `mushguard` application.
#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only JSON.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,ort=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Analyze {
            paths,
            models,
            species,
            db,
            jobs,
            pretty,
        } => {
            let config = core::AnalyzeConfig {
                paths,
                models,
                species,
                db,
                jobs,
                pretty,
            };
            core::run_analyze(config).await?;
        }
        Commands::Check { models } => {
            tokio::task::spawn_blocking(move || core::run_check(&models)).await??;
        }
    }

    Ok(())
}
