use std::sync::Arc;

use aide::{transform::TransformOperation, OperationIo};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_derive_error::ErrorResponse;
use db::{event, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use derive_more::{Display, Error, From};
use futures_util::TryStreamExt;
use schemars::JsonSchema;
use serde::Serialize;

use crate::pagination::Pagination;

/// Errors that may occur during the contract event list request handling.
#[derive(ErrorResponse, Display, From, Error, OperationIo)]
#[aide(output)]
pub(super) enum ContractEventsError {
    /// Database-related error.
    DatabaseError(DbErr),
}

/// A single contract event.
#[derive(Serialize, JsonSchema)]
pub struct ContractEvent {
    /// Height of the block in which this write/delete occurred.
    block_height: i64,

    /// Canonical storage key.
    key: String,

    /// Raw UTF-8 value. Absent when `delete` is `true`.
    value: Option<String>,

    /// Whether this entry is a tombstone for `key`.
    delete: bool,

    /// Unix-millisecond timestamp of `block_height`.
    block_time_unix_ms: i64,
}

/// Generate OAPI documentation for the [`events`] handler.
pub(super) fn docs(op: TransformOperation) -> TransformOperation {
    op.summary("List the most recent state-change events for a contract.")
        .description("Returns events newest-block-first, 25 per page.")
        .response::<200, Json<Vec<ContractEvent>>>()
}

/// Contract event list request handler.
pub(super) async fn events(
    Path(address): Path<String>,
    Query(pagination): Query<Pagination>,
    State(db): State<Arc<DatabaseConnection>>,
) -> Result<Json<Vec<ContractEvent>>, ContractEventsError> {
    let events = event::Entity::find()
        .filter(event::Column::ContractAddress.eq(address))
        .order_by_desc(event::Column::BlockHeight)
        .limit(pagination.limit())
        .offset(pagination.offset())
        .stream(&*db)
        .await?
        .map_ok(|model| ContractEvent {
            block_height: model.block_height,
            key: model.key,
            value: model.value,
            delete: model.delete,
            block_time_unix_ms: model.block_time_unix_ms,
        })
        .try_collect()
        .await?;

    Ok(Json(events))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_json::assert_json;
    use axum::{body::Body, http::Request};
    use common::config::Config;
    use db::{contract, event, ActiveValue, DatabaseConnection, EntityTrait};
    use tower::ServiceExt;

    use crate::testing::{create_database, ResponseBodyExt};

    async fn create_test_env(db: &DatabaseConnection) {
        contract::Entity::insert(contract::ActiveModel {
            address: ActiveValue::Set(String::from("contract1")),
            code_id: ActiveValue::Set(1),
            instantiated_at_block: ActiveValue::Set(10),
        })
        .exec_without_returning(db)
        .await
        .expect("unable to insert contract");

        event::Entity::insert(event::ActiveModel {
            id: ActiveValue::NotSet,
            block_height: ActiveValue::Set(10),
            contract_address: ActiveValue::Set(String::from("contract1")),
            key: ActiveValue::Set(String::from("1,2,3")),
            value: ActiveValue::Set(Some(String::from("hello"))),
            value_json: ActiveValue::Set(None),
            delete: ActiveValue::Set(false),
            block_time_unix_ms: ActiveValue::Set(1_000),
        })
        .exec_without_returning(db)
        .await
        .expect("unable to insert event");
    }

    #[tokio::test]
    async fn successful() {
        let db = create_database().await;
        create_test_env(&db).await;

        let response = crate::app_router(Arc::new(db), Arc::new(Config::for_tests()))
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/contracts/contract1/events")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_json!(response.json().await, [
            {
                "block_height": 10,
                "key": "1,2,3",
                "value": "hello",
                "delete": false,
                "block_time_unix_ms": 1000,
            }
        ]);
    }

    #[tokio::test]
    async fn unknown_contract() {
        let db = create_database().await;

        let response = crate::app_router(Arc::new(db), Arc::new(Config::for_tests()))
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/contracts/nope/events")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_json!(response.json().await, []);
    }
}
