use std::sync::Arc;

use aide::{transform::TransformOperation, OperationIo};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_derive_error::ErrorResponse;
use db::{contract, DatabaseConnection, DbErr, EntityTrait};
use derive_more::{Display, Error, From};
use schemars::JsonSchema;
use serde::Serialize;

use crate::schema::example_error;

/// Errors that may occur during the contract details request handling.
#[derive(ErrorResponse, Display, From, Error, OperationIo)]
#[aide(output)]
pub(super) enum ContractDetailsError {
    /// Database-related error.
    DatabaseError(DbErr),

    /// No contract is indexed under the requested address.
    #[status(StatusCode::NOT_FOUND)]
    #[display(fmt = "contract not found")]
    ContractNotFound,
}

/// Contract details response body.
#[derive(Serialize, JsonSchema)]
pub struct ContractDetails {
    /// Contract address.
    #[schemars(example = "crate::schema::example_contract")]
    address: String,

    /// Current code identifier.
    code_id: i64,

    /// Height of the earliest event observed for this contract.
    instantiated_at_block: i64,
}

/// Generate OAPI documentation for the [`details`] handler.
pub(super) fn docs(op: TransformOperation) -> TransformOperation {
    op.summary("Fetch a single indexed smart contract.")
        .response::<200, Json<ContractDetails>>()
        .response_with::<404, Json<serde_json::Value>, _>(|op| {
            op.description("No contract is indexed under the requested address.")
                .example(example_error(ContractDetailsError::ContractNotFound))
        })
}

/// Contract details request handler.
pub(super) async fn details(
    Path(address): Path<String>,
    State(db): State<Arc<DatabaseConnection>>,
) -> Result<Json<ContractDetails>, ContractDetailsError> {
    let model = contract::Entity::find_by_id(address)
        .one(&*db)
        .await?
        .ok_or(ContractDetailsError::ContractNotFound)?;

    Ok(Json(ContractDetails {
        address: model.address,
        code_id: model.code_id,
        instantiated_at_block: model.instantiated_at_block,
    }))
}
