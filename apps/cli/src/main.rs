//! Switchyard CLI - route prompts across LLM providers from the command line.
//!
//! Provides a `switchyard` command that sends prompts through the routing
//! orchestrator, runs batches and inspects the configured routes.

mod commands;
mod setup;

use clap::{Parser, Subcommand};
use commands::batch::BatchArgs;
use commands::complete::CompleteArgs;
use setup::Settings;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Switchyard - resilient routing across LLM providers
#[derive(Parser, Debug)]
#[command(
    name = "switchyard",
    author,
    version,
    about = "Switchyard - resilient routing across LLM providers",
    long_about = "Switchyard routes each prompt to an ordered list of provider/model candidates by task type,\nwith response caching, per-provider circuit breakers and automatic failover."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    /// Configuration file (defaults to ./switchyard.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Answer every provider with the in-process mock
    #[arg(long, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one prompt through the router
    Complete(CompleteArgs),

    /// Send many prompts with bounded concurrency
    Batch(BatchArgs),

    /// Show the routing table
    Routes {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate the configuration and show provider readiness
    Check {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let settings = Settings { config: args.config, mock: args.mock };

    match args.command {
        Command::Complete(complete) => commands::complete::execute(&settings, complete).await,
        Command::Batch(batch) => commands::batch::execute(&settings, batch).await,
        Command::Routes { json } => commands::routes::execute(&settings, json),
        Command::Check { json } => commands::check::execute(&settings, json),
    }
}
