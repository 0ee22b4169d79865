use std::{collections::BTreeMap, sync::Arc};

use aide::{transform::TransformOperation, OperationIo};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use axum_derive_error::ErrorResponse;
use common::config::Config;
use db::{state, DatabaseConnection, DbErr, EntityTrait};
use derive_more::{Display, Error, From};
use indexer::{
    cache::{self, CacheError},
    formula::{registry, FormulaError},
};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::schema::example_error;

/// Errors that may occur while answering a `compute` request.
#[derive(ErrorResponse, Display, From, Error, OperationIo)]
#[aide(output)]
pub(super) enum ComputeError {
    /// Database-related error.
    DatabaseError(DbErr),

    /// `args` was present but not a JSON object of string values.
    #[status(StatusCode::BAD_REQUEST)]
    #[display(fmt = "args must be a JSON object of string to string")]
    InvalidArgs,

    /// No formula is registered under the requested name.
    #[status(StatusCode::NOT_FOUND)]
    #[display(fmt = "unknown formula")]
    UnknownFormula,

    /// The formula raised during evaluation; nothing was cached.
    #[status(StatusCode::UNPROCESSABLE_ENTITY)]
    #[display(fmt = "{_0}")]
    FormulaError(#[error(not(source))] String),

    /// `at_block` is beyond what has been indexed so far.
    #[status(StatusCode::ACCEPTED)]
    #[display(fmt = "block {_0} has not been indexed yet")]
    NotYetIndexed(#[error(not(source))] u64),
}

impl From<CacheError> for ComputeError {
    fn from(error: CacheError) -> Self {
        match error {
            CacheError::Db(error) => ComputeError::DatabaseError(error),
            CacheError::Formula(FormulaError::Db(error)) => ComputeError::DatabaseError(error),
            CacheError::Formula(FormulaError::Unknown(_)) => ComputeError::UnknownFormula,
            CacheError::Formula(FormulaError::Evaluation(message)) => {
                ComputeError::FormulaError(message)
            }
            CacheError::NotYetIndexed(height) => ComputeError::NotYetIndexed(height),
        }
    }
}

/// Query string accepted by the `compute` route.
#[derive(Deserialize, JsonSchema)]
pub(super) struct ComputeQuery {
    /// Block height to evaluate the formula at.
    ///
    /// Defaults to the most recently indexed block.
    #[serde(default)]
    #[schemars(example = "crate::schema::example_block_height")]
    at_block: Option<u64>,

    /// JSON object of string arguments the formula is evaluated with, for
    /// example `{"key":"1,2,3"}`.
    #[serde(default)]
    args: Option<String>,
}

/// Generate OAPI documentation for the [`compute`] handler.
pub(super) fn docs(op: TransformOperation) -> TransformOperation {
    op.summary("Evaluate a named formula against a contract's indexed state.")
        .description(
            r#"Returns the cached output if a covering computation already exists;
otherwise evaluates the formula and caches the result before returning it."#,
        )
        .response::<200, Json<Value>>()
        .response_with::<404, Json<Value>, _>(|op| {
            op.description("No formula is registered under the requested name.")
                .example(example_error(ComputeError::UnknownFormula))
        })
        .response_with::<202, Json<Value>, _>(|op| {
            op.description("The requested block has not been indexed yet.")
                .example(example_error(ComputeError::NotYetIndexed(1_000_001)))
        })
}

/// `compute(formula, contract, args, atBlock?)` request handler.
pub(super) async fn compute(
    Path((formula, contract)): Path<(String, String)>,
    Query(query): Query<ComputeQuery>,
    State(db): State<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<Config>>,
) -> Result<Json<Value>, ComputeError> {
    let args: BTreeMap<String, String> = match query.args {
        Some(raw) => serde_json::from_str(&raw).map_err(|_| ComputeError::InvalidArgs)?,
        None => BTreeMap::new(),
    };

    let registry = registry::builtin();
    let formula_impl = registry
        .get(formula.as_str())
        .ok_or(ComputeError::UnknownFormula)?;

    let at_block = match query.at_block {
        Some(height) => height,
        None => {
            state::Entity::find_by_id(state::SINGLETON_ID)
                .one(&*db)
                .await?
                .map(|row| row.latest_block_height as u64)
                .unwrap_or(0)
        }
    };

    let chain_id = config
        .indexer
        .as_ref()
        .map(|indexer| indexer.chain_id.as_str())
        .unwrap_or("unknown");

    let output = cache::query(&db, formula_impl.as_ref(), &contract, &args, at_block, chain_id).await?;

    Ok(Json(output))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_json::assert_json;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
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
            value: ActiveValue::Set(Some(String::from(r#"{"x":1}"#))),
            value_json: ActiveValue::Set(Some(serde_json::json!({"x": 1}))),
            delete: ActiveValue::Set(false),
            block_time_unix_ms: ActiveValue::Set(1_000),
        })
        .exec_without_returning(db)
        .await
        .expect("unable to insert event");
    }

    #[tokio::test]
    async fn evaluates_and_caches() {
        let db = create_database().await;
        create_test_env(&db).await;

        let response = crate::app_router(Arc::new(db), Arc::new(Config::for_tests()))
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/compute/get_value/contract1?args=%7B%22key%22%3A%221%2C2%2C3%22%7D&at_block=10")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_json!(response.json().await, {"x": 1});
    }

    #[tokio::test]
    async fn unknown_formula() {
        let db = create_database().await;
        create_test_env(&db).await;

        let response = crate::app_router(Arc::new(db), Arc::new(Config::for_tests()))
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/compute/nope/contract1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn not_yet_indexed() {
        let db = create_database().await;
        create_test_env(&db).await;

        let response = crate::app_router(Arc::new(db), Arc::new(Config::for_tests()))
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/compute/get_value/contract1?args=%7B%22key%22%3A%221%2C2%2C3%22%7D&at_block=999")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }
}
