//! Till CLI - point-of-sale from the terminal
//!
//! Every command works offline against the local store; writes made while
//! the backend is unreachable are queued and replayed on the next online run,
//! or as soon as the backend answers again under `till watch`.

mod cli;
mod commands;
mod error;

use clap::Parser;
use till_core::Product;

use crate::cli::{Cli, Commands, ProductCommands, SalesCommands};
use crate::commands::common::Session;
use crate::commands::completions::run_completions;
use crate::commands::{changes, products, queue, sales, sync, watch};
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

    let directive = "till=info"
        .parse::<tracing_subscriber::filter::Directive>()
        .map_err(|error| CliError::Config(format!("invalid log directive: {error}")))?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    if cli.global.offline && matches!(cli.command, Commands::Watch) {
        return Err(CliError::Config("watch needs the backend; drop --offline".into()));
    }

    let session = Session::open(&cli.global).await?;
    // `sync` reports on the drain itself; `watch` drains from its own task
    if session.is_online() && !matches!(cli.command, Commands::Sync | Commands::Watch) {
        session.replay_pending().await;
    }

    match cli.command {
        Commands::Products { command } => match command {
            ProductCommands::List { query, json } => {
                products::run_list(&session, query.as_deref(), json).await?;
            }
            ProductCommands::Get { barcode, json } => {
                products::run_get(&session, &barcode, json).await?;
            }
            ProductCommands::Upsert {
                barcode,
                name,
                price,
                stock,
            } => {
                products::run_upsert(&session, Product::new(barcode, name, price, stock)).await?;
            }
        },
        Commands::Sales { command } => match command {
            SalesCommands::List { limit, json } => sales::run_list(&session, limit, json).await?,
            SalesCommands::Record { items } => sales::run_record(&session, &items).await?,
        },
        Commands::Changes { limit, json } => changes::run_changes(&session, limit, json).await?,
        Commands::Sync => sync::run_sync(&session).await?,
        Commands::Watch => watch::run_watch(&session).await?,
        Commands::Queue { json } => queue::run_queue(&session, json).await?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}
