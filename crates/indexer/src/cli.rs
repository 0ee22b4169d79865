/// `index` subcommand.
mod index;

/// `webhooks` subcommand group.
mod webhooks;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use index::index;
pub use webhooks::drain as webhooks_drain;

/// Primary CLI configuration, serves as an entrypoint to [`clap`].
#[derive(Parser)]
#[command(about, version)]
pub(crate) struct Cli {
    /// Selected subcommand.
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file.
    #[clap(short, long, value_parser)]
    pub config: Option<PathBuf>,
}

/// Supported subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Tail the configured event stream and ingest it until shutdown.
    Index,

    /// Webhook delivery maintenance.
    Webhooks {
        #[command(subcommand)]
        command: WebhooksCommand,
    },
}

/// `webhooks` subcommands.
#[derive(Subcommand)]
pub(crate) enum WebhooksCommand {
    /// Drain the pending webhook queue once.
    Drain,
}
