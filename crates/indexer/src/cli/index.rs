//! `index` subcommand: tail the configured event stream and ingest it.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use common::config::Config;
use db::DatabaseConnection;
use indexer::{
    ingest::IngestionDriver,
    reindex::NullSearchIndex,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

/// Tail `config.indexer.sources.wasm` until end of stream or shutdown
/// signal, then perform a final flush.
pub async fn index(database: DatabaseConnection, config: &Config) -> anyhow::Result<()> {
    let indexer_config = config
        .indexer
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("missing [indexer] configuration"))?;

    let mut driver = IngestionDriver::new(database, indexer_config, NullSearchIndex).await?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received, finishing current line");
                shutdown.store(true, Ordering::SeqCst);
            }
        });
    }

    let mut lines = open_source(&indexer_config.sources.wasm).await?;

    loop {
        let Some(line) = lines.next_line().await? else {
            break;
        };

        driver.push_line(&line).await?;

        if shutdown.load(Ordering::SeqCst) {
            break;
        }
    }

    let summary = driver.flush().await?;
    info!(
        events = summary.events,
        transformations = summary.transformations,
        webhooks_enqueued = summary.webhooks_enqueued,
        computations_updated = summary.computations_updated,
        computations_destroyed = summary.computations_destroyed,
        "final flush complete"
    );

    Ok(())
}

async fn open_source(
    source: &str,
) -> anyhow::Result<tokio::io::Lines<Box<dyn tokio::io::AsyncBufRead + Unpin + Send>>> {
    let reader: Box<dyn tokio::io::AsyncBufRead + Unpin + Send> = if source == "-" {
        Box::new(BufReader::new(tokio::io::stdin()))
    } else {
        Box::new(BufReader::new(tokio::fs::File::open(source).await?))
    };

    Ok(reader.lines())
}
