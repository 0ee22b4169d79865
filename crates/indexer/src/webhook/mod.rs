//! Matches events to subscriptions, enqueues resolved deliveries, and
//! drains them with retry.

pub mod subscription;

use db::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder};

use crate::ingest::record::ParsedEvent;

/// Resolves the most recent value for `(contract, key)` strictly before a
/// given event's block, first against the in-flight batch, then against
/// the persisted event store.
pub struct PreviousValueLookup<'a> {
    batch: &'a [ParsedEvent],
    db: &'a DatabaseConnection,
}

impl<'a> PreviousValueLookup<'a> {
    pub fn new(batch: &'a [ParsedEvent], db: &'a DatabaseConnection) -> Self {
        Self { batch, db }
    }

    /// The previous value for the same `(contract, key)` as `event`, at a
    /// strictly lower block height.
    pub async fn get_previous(
        &self,
        event: &ParsedEvent,
    ) -> Result<Option<serde_json::Value>, DbErr> {
        if let Some(found) = self
            .batch
            .iter()
            .filter(|candidate| {
                candidate.contract_address == event.contract_address
                    // Matching candidate.key against event.key, not against
                    // itself — a same-key, earlier-in-batch write.
                    && candidate.key == event.key
                    && candidate.block_height < event.block_height
            })
            .max_by_key(|candidate| candidate.block_height)
        {
            return Ok(value_of(found.delete, &found.value, &found.value_json));
        }

        let row = db::event::Entity::find()
            .filter(db::event::Column::ContractAddress.eq(&event.contract_address))
            .filter(db::event::Column::Key.eq(&event.key))
            .filter(db::event::Column::BlockHeight.lt(event.block_height as i64))
            .order_by_desc(db::event::Column::BlockHeight)
            .one(self.db)
            .await?;

        Ok(row.and_then(|row| value_of(row.delete, &row.value, &row.value_json)))
    }
}

fn value_of(
    delete: bool,
    value: &Option<String>,
    value_json: &Option<serde_json::Value>,
) -> Option<serde_json::Value> {
    if delete {
        return None;
    }
    Some(
        value_json
            .clone()
            .unwrap_or_else(|| serde_json::Value::String(value.clone().unwrap_or_default())),
    )
}

mod enqueue;
pub use enqueue::enqueue;

mod delivery;
pub use delivery::{drain, fire, DeliveryError};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::create_database;

    fn event(contract: &str, key: &str, block_height: u64, value: &str) -> ParsedEvent {
        ParsedEvent {
            block_height,
            block_time_unix_ms: block_height * 1000,
            contract_address: contract.to_owned(),
            code_id: 1,
            key: key.to_owned(),
            value: Some(value.to_owned()),
            value_json: None,
            delete: false,
        }
    }

    /// Regression test for the source's `e.key === e.key` predicate (§9,
    /// open question (a)): a batch containing an earlier write to a
    /// *different* key on the same contract must not be mistaken for that
    /// key's previous value.
    #[tokio::test]
    async fn previous_value_ignores_unrelated_keys_in_the_same_batch() {
        let db = create_database().await;
        let batch = vec![
            event("a", "other-key", 1, "unrelated"),
            event("a", "balance:x", 5, "10"),
        ];
        let lookup = PreviousValueLookup::new(&batch, &db);

        let current = event("a", "balance:x", 10, "20");
        let previous = lookup.get_previous(&current).await.unwrap();

        assert_eq!(previous, Some(serde_json::Value::String(String::from("10"))));
    }

    #[tokio::test]
    async fn previous_value_is_none_when_key_is_new() {
        let db = create_database().await;
        let batch = vec![event("a", "other-key", 1, "unrelated")];
        let lookup = PreviousValueLookup::new(&batch, &db);

        let current = event("a", "balance:x", 10, "20");
        let previous = lookup.get_previous(&current).await.unwrap();

        assert_eq!(previous, None);
    }
}
