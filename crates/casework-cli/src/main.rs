//! Casework CLI - queue case artifacts offline and sync them later
//!
//! Every capture command writes to the local store only; `sync` and `watch`
//! deliver queued artifacts once the API is reachable.

mod cli;
mod commands;
mod error;
mod reachability;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::cache::run_cache;
use crate::commands::cancel::run_cancel;
use crate::commands::common::resolve_db_path;
use crate::commands::completions::run_completions;
use crate::commands::enqueue::run_enqueue;
use crate::commands::fetch::run_fetch;
use crate::commands::pending::run_pending;
use crate::commands::status::run_status;
use crate::commands::sync::{run_sync, run_watch};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "casework=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Commands::Enqueue { artifact } => run_enqueue(artifact, &db_path).await?,
        Commands::Pending {
            domain,
            victim,
            all,
            json,
        } => run_pending(domain, victim.as_deref(), all, json, &db_path).await?,
        Commands::Cancel { domain, id } => run_cancel(domain, id, &db_path).await?,
        Commands::Sync { offline } => run_sync(offline, &db_path).await?,
        Commands::Watch { interval } => run_watch(interval, &db_path).await?,
        Commands::Fetch {
            resource,
            id,
            max_age,
            cache_first,
            offline,
        } => {
            run_fetch(
                &resource,
                id.as_deref(),
                max_age,
                cache_first,
                offline,
                &db_path,
            )
            .await?;
        }
        Commands::Cache { command } => run_cache(command, &db_path).await?,
        Commands::Status { json } => run_status(json, &db_path).await?,
        Commands::Completions { shell, output } => {
            run_completions(shell, output.as_deref())?;
        }
    }

    Ok(())
}
