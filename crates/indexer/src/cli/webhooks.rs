//! `webhooks drain` subcommand: deliver pending webhooks with bounded
//! concurrency and failure-count backoff.

use common::config::Config;
use db::DatabaseConnection;
use tracing::info;

const DRAIN_CONCURRENCY: usize = 8;

/// Drain the pending webhook queue once.
pub async fn drain(database: DatabaseConnection, config: &Config) -> anyhow::Result<()> {
    let indexer_config = config
        .indexer
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("missing [indexer] configuration"))?;

    let http = reqwest::Client::new();
    let (delivered, failed) = indexer::webhook::drain(
        &database,
        &http,
        indexer_config.soketi.as_ref(),
        DRAIN_CONCURRENCY,
    )
    .await?;

    info!(delivered, failed, "webhook drain complete");

    Ok(())
}
