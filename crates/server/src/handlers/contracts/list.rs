use std::sync::Arc;

use aide::{transform::TransformOperation, OperationIo};
use axum::{extract::{Query, State}, Json};
use axum_derive_error::ErrorResponse;
use db::{contract, DatabaseConnection, DbErr, EntityTrait, QueryOrder, QuerySelect};
use derive_more::{Display, Error, From};
use schemars::JsonSchema;
use serde::Serialize;

use crate::pagination::Pagination;

/// Errors that may occur during the contract list request handling.
#[derive(ErrorResponse, Display, From, Error, OperationIo)]
#[aide(output)]
pub(super) enum ContractListError {
    /// Database-related error.
    DatabaseError(DbErr),
}

/// A single contract summary entry.
#[derive(Serialize, JsonSchema)]
pub struct ContractSummary {
    /// Contract address.
    #[schemars(example = "crate::schema::example_contract")]
    address: String,

    /// Current code identifier.
    code_id: i64,

    /// Height of the earliest event observed for this contract.
    instantiated_at_block: i64,
}

/// Generate OAPI documentation for the [`list`] handler.
pub(super) fn docs(op: TransformOperation) -> TransformOperation {
    op.summary("List indexed smart contracts.")
        .description("Returns the most recently instantiated contracts first, 25 per page.")
        .response::<200, Json<Vec<ContractSummary>>>()
}

/// Contract list request handler.
pub(super) async fn list(
    Query(pagination): Query<Pagination>,
    State(db): State<Arc<DatabaseConnection>>,
) -> Result<Json<Vec<ContractSummary>>, ContractListError> {
    let contracts = contract::Entity::find()
        .order_by_desc(contract::Column::InstantiatedAtBlock)
        .limit(pagination.limit())
        .offset(pagination.offset())
        .all(&*db)
        .await?
        .into_iter()
        .map(|model| ContractSummary {
            address: model.address,
            code_id: model.code_id,
            instantiated_at_block: model.instantiated_at_block,
        })
        .collect();

    Ok(Json(contracts))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_json::assert_json;
    use axum::{body::Body, http::Request};
    use common::config::Config;
    use db::{contract, ActiveValue, DatabaseConnection, EntityTrait};
    use tower::ServiceExt;

    use crate::testing::{create_database, ResponseBodyExt};

    async fn create_test_env(db: &DatabaseConnection) {
        for (address, code_id, block) in [("contract1", 1, 10), ("contract2", 2, 20)] {
            contract::Entity::insert(contract::ActiveModel {
                address: ActiveValue::Set(String::from(address)),
                code_id: ActiveValue::Set(code_id),
                instantiated_at_block: ActiveValue::Set(block),
            })
            .exec_without_returning(db)
            .await
            .expect("unable to insert contract");
        }
    }

    #[tokio::test]
    async fn lists_newest_first() {
        let db = create_database().await;
        create_test_env(&db).await;

        let response = crate::app_router(Arc::new(db), Arc::new(Config::for_tests()))
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/contracts/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_json!(response.json().await, [
            {"address": "contract2", "code_id": 2, "instantiated_at_block": 20},
            {"address": "contract1", "code_id": 1, "instantiated_at_block": 10},
        ]);
    }
}
