//! Scribble CLI - personal notes from the terminal
//!
//! Runs an interactive session shell against Firebase (or in-process
//! services with `--offline`) and manages CLI profiles.

mod cli;
mod commands;
mod config_profiles;
mod error;
mod render;
mod repl;
mod session_store;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::shell::run_shell;
use crate::error::CliError;

const DEFAULT_LOG_FILTER: &str = "scribble=info,scribble_core=info";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Config { command }) => run_config(command, cli.profile.as_deref())?,
        Some(Commands::Completions { shell, output }) => {
            run_completions(shell, output.as_deref())?;
        }
        None => run_shell(cli.offline, cli.profile.as_deref()).await?,
    }

    Ok(())
}
