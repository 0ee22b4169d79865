//! Parses lines from the event stream, de-dups within a block, and flushes
//! on block boundary or batch threshold (§4.5).

use std::collections::{HashMap, HashSet};

use common::config::{Indexer as IndexerConfig, WebhookDefinition};
use db::{DatabaseConnection, DbErr};
use derive_more::{Display, Error, From};

use super::{record::RawRecord, store};
use crate::{
    cache::{self, Change},
    formula::FormulaError,
    key::KeyError,
    reindex::SearchIndex,
    transform,
    webhook::{self, subscription::Subscription},
};

/// A fatal failure that halts ingestion. Per-record parse errors are
/// reported and skipped instead of reaching this type (§7).
#[derive(Debug, Display, Error, From)]
pub enum FlushError {
    Db(DbErr),
    Formula(FormulaError),
}

/// Summary of one [`IngestionDriver::flush`] call, surfaced for logging.
#[derive(Debug, Default, Clone, Copy)]
pub struct FlushSummary {
    pub events: usize,
    pub transformations: usize,
    pub webhooks_enqueued: usize,
    pub computations_updated: usize,
    pub computations_destroyed: usize,
}

/// The ingestion driver's in-memory state (§4.5).
pub struct IngestionDriver<S: SearchIndex = crate::reindex::NullSearchIndex> {
    db: DatabaseConnection,
    search_index: S,
    transform_rules: Vec<transform::Rule>,
    subscriptions: HashMap<&'static str, Box<dyn Subscription>>,
    webhooks: Vec<WebhookDefinition>,
    soketi: Option<common::config::Soketi>,
    http: reqwest::Client,
    batch: usize,
    cache_updates: bool,
    webhooks_enabled: bool,
    initial_block: u64,
    pending: Vec<RawRecord>,
    last_block_height_seen: Option<u64>,
    caught_up: bool,
}

impl<S: SearchIndex> IngestionDriver<S> {
    /// Build a driver, computing `initialBlock` from `config` and the
    /// persisted checkpoint.
    pub async fn new(
        db: DatabaseConnection,
        config: &IndexerConfig,
        search_index: S,
    ) -> Result<Self, DbErr> {
        let state = crate::state::load(&db).await?;
        let initial_block = config
            .initial_block_height
            .unwrap_or(state.last_wasm_block_height_exported as u64 + 1);

        Ok(Self {
            db,
            search_index,
            transform_rules: transform::rules::builtin(),
            subscriptions: webhook::subscription::builtin(),
            webhooks: config.webhooks.clone(),
            soketi: config.soketi.clone(),
            http: reqwest::Client::new(),
            batch: config.batch,
            cache_updates: config.cache_updates,
            webhooks_enabled: config.webhooks_enabled,
            initial_block,
            pending: Vec::new(),
            last_block_height_seen: None,
            caught_up: false,
        })
    }

    /// Parse and buffer one line of the stream, flushing first if this
    /// record starts a new block and the batch threshold is already met.
    pub async fn push_line(&mut self, line: &str) -> Result<(), FlushError> {
        let record: RawRecord = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(error) => {
                tracing::warn!(%error, "skipping structurally invalid record");
                return Ok(());
            }
        };

        if record.block_height < self.initial_block {
            return Ok(());
        }

        if !self.caught_up {
            self.caught_up = true;
            tracing::info!(block_height = record.block_height, "caught up");
        }

        let starts_new_block = self
            .last_block_height_seen
            .is_some_and(|last| record.block_height > last);

        if self.pending.len() >= self.batch && starts_new_block {
            self.flush().await?;
        }

        self.last_block_height_seen = Some(record.block_height);
        self.pending.push(record);

        Ok(())
    }

    /// Run the nine-step flush procedure against the buffered pending
    /// records, then clear the buffer.
    pub async fn flush(&mut self) -> Result<FlushSummary, FlushError> {
        if self.pending.is_empty() {
            return Ok(FlushSummary::default());
        }

        // (1) within-block, within-contract, within-key dedup, last wins.
        let deduped = dedup_last_write_wins(&self.pending);

        // (2) parse to normalized form.
        let mut parsed = Vec::with_capacity(deduped.len());
        for record in &deduped {
            match record.parse() {
                Ok(event) => parsed.push(event),
                Err(error) => report_parse_error(record, error),
            }
        }

        // (3) event store upsert.
        store::upsert_contracts(&self.db, &parsed).await?;
        let event_rows = store::upsert_events(&self.db, &parsed).await?;

        // (4) transformer.
        let mut transformation_outputs = Vec::new();
        for event in &parsed {
            transformation_outputs.extend(transform::apply(&self.transform_rules, event));
        }
        let transformation_rows = transform::write(&self.db, transformation_outputs).await?;

        // (5) cache invalidation.
        let mut computations_updated = 0;
        let mut computations_destroyed = 0;
        if self.cache_updates {
            let mut changes: Vec<Change> = event_rows
                .iter()
                .map(|row| Change {
                    contract: row.contract_address.clone(),
                    key: row.key.clone(),
                    block_height: row.block_height as u64,
                })
                .collect();
            changes.extend(transformation_rows.iter().map(|row| Change {
                contract: row.contract_address.clone(),
                key: row.name.clone(),
                block_height: row.block_height as u64,
            }));

            let counts = cache::update_computation_validity_dependent_on_changes(&self.db, &changes).await?;
            computations_updated = counts.updated;
            computations_destroyed = counts.destroyed;
        }

        // (6) webhook enqueue.
        let mut webhooks_enqueued = 0;
        if self.webhooks_enabled && !self.webhooks.is_empty() {
            let event_ids: Vec<(crate::ingest::record::ParsedEvent, i64)> = parsed
                .iter()
                .cloned()
                .zip(event_rows.iter().map(|row| row.id))
                .collect();
            webhooks_enqueued =
                webhook::enqueue(&self.db, &event_ids, &parsed, &self.webhooks, &self.subscriptions)
                    .await?;
        }

        // (7) advance checkpoint.
        let latest_block_height = parsed.iter().map(|event| event.block_height).max();
        let latest_block_time = parsed.iter().map(|event| event.block_time_unix_ms).max();
        if let (Some(height), Some(time)) = (latest_block_height, latest_block_time) {
            crate::state::advance(&self.db, height, height, time).await?;
        }

        // (8) reindex.
        let contracts: HashSet<String> =
            parsed.iter().map(|event| event.contract_address.clone()).collect();
        let contracts: Vec<String> = contracts.into_iter().collect();
        if let Err(error) = self.search_index.reindex(&contracts).await {
            tracing::warn!(%error, "search reindex failed");
        }

        // (9) clear buffer.
        self.pending.clear();

        Ok(FlushSummary {
            events: event_rows.len(),
            transformations: transformation_rows.len(),
            webhooks_enqueued,
            computations_updated,
            computations_destroyed,
        })
    }
}

fn dedup_last_write_wins(pending: &[RawRecord]) -> Vec<RawRecord> {
    let mut last_index: HashMap<(u64, String, String), usize> = HashMap::new();
    for (index, record) in pending.iter().enumerate() {
        last_index.insert(record.dedup_key(), index);
    }

    let mut indices: Vec<usize> = last_index.into_values().collect();
    indices.sort_unstable();
    indices.into_iter().map(|index| pending[index].clone()).collect()
}

fn report_parse_error(record: &RawRecord, error: KeyError) {
    tracing::warn!(
        block_height = record.block_height,
        contract_address = %record.contract_address,
        %error,
        "dropping malformed event"
    );
}

#[cfg(test)]
mod tests {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use common::config::Indexer as IndexerConfig;
    use db::{event, EntityTrait};

    use super::*;
    use crate::{reindex::NullSearchIndex, testing::create_database};

    fn line(block_height: u64, contract: &str, key: &[u8], value: &str, delete: bool) -> String {
        serde_json::json!({
            "blockHeight": block_height,
            "blockTimeUnixMs": block_height * 1000,
            "contractAddress": contract,
            "codeId": 1,
            "key": STANDARD.encode(key),
            "value": STANDARD.encode(value),
            "delete": delete,
        })
        .to_string()
    }

    fn config(batch: usize) -> IndexerConfig {
        let mut config = common::config::Config::for_tests()
            .indexer
            .expect("test config always has an indexer section");
        config.batch = batch;
        config
    }

    #[tokio::test]
    async fn flushes_only_at_block_boundaries() {
        let db = create_database().await;
        let config = config(2);
        let mut driver = IngestionDriver::new(db.clone(), &config, NullSearchIndex)
            .await
            .unwrap();

        // Batch threshold (2) is met after these two, but both are block 1 —
        // the flush must wait for the first record of a new block.
        driver.push_line(&line(1, "a", b"k1", "1", false)).await.unwrap();
        driver.push_line(&line(1, "a", b"k2", "2", false)).await.unwrap();
        assert_eq!(event::Entity::find().all(&db).await.unwrap().len(), 0);

        // First record of block 2: threshold already met, so this triggers a
        // flush of everything buffered so far (block 1's two events) before
        // being buffered itself.
        driver.push_line(&line(2, "a", b"k1", "3", false)).await.unwrap();
        let rows = event::Entity::find().all(&db).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.block_height == 1));
    }

    #[tokio::test]
    async fn dedups_last_write_wins_within_a_block() {
        let db = create_database().await;
        let config = config(100);
        let mut driver = IngestionDriver::new(db.clone(), &config, NullSearchIndex)
            .await
            .unwrap();

        driver.push_line(&line(1, "a", b"k1", "first", false)).await.unwrap();
        driver.push_line(&line(1, "a", b"k1", "second", false)).await.unwrap();
        driver.flush().await.unwrap();

        let rows = event::Entity::find().all(&db).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn skips_records_before_initial_block() {
        let db = create_database().await;
        let mut config = config(100);
        config.initial_block_height = Some(200);
        let mut driver = IngestionDriver::new(db.clone(), &config, NullSearchIndex)
            .await
            .unwrap();

        driver.push_line(&line(150, "a", b"k1", "ignored", false)).await.unwrap();
        driver.push_line(&line(200, "a", b"k1", "kept", false)).await.unwrap();
        driver.flush().await.unwrap();

        let rows = event::Entity::find().all(&db).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].block_height, 200);
    }

    #[tokio::test]
    async fn replaying_a_batch_is_idempotent() {
        let db = create_database().await;
        let config = config(100);

        for _ in 0..2 {
            let mut driver = IngestionDriver::new(db.clone(), &config, NullSearchIndex)
                .await
                .unwrap();
            driver.push_line(&line(1, "a", b"k1", "only", false)).await.unwrap();
            driver.push_line(&line(2, "a", b"k2", "second", false)).await.unwrap();
            driver.flush().await.unwrap();
        }

        let rows = event::Entity::find().all(&db).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn tombstone_as_first_write_has_no_value() {
        let db = create_database().await;
        let config = config(100);
        let mut driver = IngestionDriver::new(db.clone(), &config, NullSearchIndex)
            .await
            .unwrap();

        driver.push_line(&line(1, "a", b"k1", "", true)).await.unwrap();
        driver.flush().await.unwrap();

        let rows = event::Entity::find().all(&db).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].delete);
        assert_eq!(rows[0].value, None);
        assert_eq!(rows[0].value_json, None);
    }
}
