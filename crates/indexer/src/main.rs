//! # Indexer
//!
//! The indexer tails a stream of contract state-write events, persists
//! them into the relational store defined in the [`db`] crate, derives
//! transformations, evaluates cached formulas, and dispatches webhooks.
//!
//! ## Ingestion
//!
//! Use the `index` subcommand to tail `indexer.sources.wasm` from
//! configuration and ingest it until shutdown.
//!
//! Refer to the [`cli::index`] documentation for more details.
//!
//! ## Webhook delivery
//!
//! `webhooks drain` delivers queued webhooks once, with bounded
//! concurrency and failure-count backoff.
//!
//! Refer to the [`cli::webhooks_drain`] documentation for more details.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

/// CLI general configuration and subcommands.
mod cli;

use clap::Parser;
use cli::{Cli, Command, WebhooksCommand};
use common::{config::Config, logging};
use db::Database;
use tracing::info;

/// Indexer entrypoint.
#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    let config = Config::new(cli.config)?;

    logging::init(&config);

    info!("connecting to database");
    let database = Database::connect(&config.database.url).await?;
    info!("database connection established");

    match cli.command {
        Command::Index => cli::index(database, &config).await?,
        Command::Webhooks {
            command: WebhooksCommand::Drain,
        } => cli::webhooks_drain(database, &config).await?,
    }

    Ok(())
}
