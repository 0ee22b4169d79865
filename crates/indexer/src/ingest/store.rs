//! Event Store: idempotent upsert of [`db::contract`] and [`db::event`]
//! rows (§4.1).

use std::collections::BTreeMap;

use db::{
    sea_query::OnConflict, contract, event, ActiveValue, ColumnTrait, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter,
};

use super::record::ParsedEvent;

const CONTRACT_UPSERT_RETRIES: u32 = 3;

struct ContractCandidate {
    code_id: u64,
    max_block: u64,
    min_block: u64,
}

/// Extract the unique contracts referenced by `events` and upsert them:
/// `code_id` always reflects the event with the greatest `block_height` in
/// this batch; `instantiated_at_block` is only ever used on first insert
/// and is never touched by the conflict clause.
pub async fn upsert_contracts(db: &DatabaseConnection, events: &[ParsedEvent]) -> Result<(), DbErr> {
    if events.is_empty() {
        return Ok(());
    }

    let mut candidates: BTreeMap<String, ContractCandidate> = BTreeMap::new();
    for event in events {
        candidates
            .entry(event.contract_address.clone())
            .and_modify(|candidate| {
                if event.block_height > candidate.max_block {
                    candidate.max_block = event.block_height;
                    candidate.code_id = event.code_id;
                }
                if event.block_height < candidate.min_block {
                    candidate.min_block = event.block_height;
                }
            })
            .or_insert(ContractCandidate {
                code_id: event.code_id,
                max_block: event.block_height,
                min_block: event.block_height,
            });
    }

    let models: Vec<contract::ActiveModel> = candidates
        .into_iter()
        .map(|(address, candidate)| contract::ActiveModel {
            address: ActiveValue::Set(address),
            code_id: ActiveValue::Set(candidate.code_id as i64),
            instantiated_at_block: ActiveValue::Set(candidate.min_block as i64),
        })
        .collect();

    let mut attempt = 0;
    loop {
        let result = contract::Entity::insert_many(models.clone())
            .on_conflict(
                OnConflict::column(contract::Column::Address)
                    .update_column(contract::Column::CodeId)
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await;

        match result {
            Ok(_) => return Ok(()),
            Err(error) if attempt + 1 < CONTRACT_UPSERT_RETRIES => {
                attempt += 1;
                tracing::warn!(attempt, %error, "retrying contract upsert");
            }
            Err(error) => return Err(error),
        }
    }
}

/// Bulk-insert `events`, updating `(value, value_json, delete)` on
/// `(block_height, contract_address, key)` conflict. Returns the final
/// rows, one per input event, in the same order.
pub async fn upsert_events(
    db: &DatabaseConnection,
    events: &[ParsedEvent],
) -> Result<Vec<event::Model>, DbErr> {
    if events.is_empty() {
        return Ok(Vec::new());
    }

    let models = events.iter().map(|event| event::ActiveModel {
        id: ActiveValue::NotSet,
        block_height: ActiveValue::Set(event.block_height as i64),
        contract_address: ActiveValue::Set(event.contract_address.clone()),
        key: ActiveValue::Set(event.key.clone()),
        value: ActiveValue::Set(event.value.clone()),
        value_json: ActiveValue::Set(event.value_json.clone()),
        delete: ActiveValue::Set(event.delete),
        block_time_unix_ms: ActiveValue::Set(event.block_time_unix_ms as i64),
    });

    event::Entity::insert_many(models)
        .on_conflict(
            OnConflict::columns([
                event::Column::BlockHeight,
                event::Column::ContractAddress,
                event::Column::Key,
            ])
            .update_columns([
                event::Column::Value,
                event::Column::ValueJson,
                event::Column::Delete,
            ])
            .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    let mut rows = Vec::with_capacity(events.len());
    for event in events {
        let row = event::Entity::find()
            .filter(event::Column::BlockHeight.eq(event.block_height as i64))
            .filter(event::Column::ContractAddress.eq(&event.contract_address))
            .filter(event::Column::Key.eq(&event.key))
            .one(db)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(String::from("event just upserted")))?;
        rows.push(row);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::create_database;

    fn event(contract: &str, code_id: u64, block_height: u64) -> ParsedEvent {
        ParsedEvent {
            block_height,
            block_time_unix_ms: block_height * 1000,
            contract_address: contract.to_owned(),
            code_id,
            key: String::from("1,2,3"),
            value: Some(String::from("value")),
            value_json: None,
            delete: false,
        }
    }

    #[tokio::test]
    async fn contract_upsert_updates_code_id_but_never_instantiated_at_block() {
        let db = create_database().await;

        upsert_contracts(&db, &[event("a", 1, 10)]).await.unwrap();
        upsert_contracts(&db, &[event("a", 2, 20)]).await.unwrap();

        let row = contract::Entity::find_by_id("a").one(&db).await.unwrap().unwrap();
        assert_eq!(row.code_id, 2);
        assert_eq!(row.instantiated_at_block, 10);
    }

    #[tokio::test]
    async fn contract_upsert_uses_the_earliest_block_in_the_batch() {
        let db = create_database().await;

        upsert_contracts(&db, &[event("a", 1, 20), event("a", 2, 10)]).await.unwrap();

        let row = contract::Entity::find_by_id("a").one(&db).await.unwrap().unwrap();
        assert_eq!(row.instantiated_at_block, 10);
        // code_id reflects the event with the greatest block_height in the
        // batch, not insertion order.
        assert_eq!(row.code_id, 1);
    }

    #[tokio::test]
    async fn event_upsert_replaces_value_on_conflict() {
        let db = create_database().await;

        upsert_contracts(&db, &[event("a", 1, 10)]).await.unwrap();
        upsert_events(&db, &[event("a", 1, 10)]).await.unwrap();
        let mut updated = event("a", 1, 10);
        updated.value = Some(String::from("updated"));
        let rows = upsert_events(&db, &[updated]).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value.as_deref(), Some("updated"));
        assert_eq!(event::Entity::find().all(&db).await.unwrap().len(), 1);
    }
}
