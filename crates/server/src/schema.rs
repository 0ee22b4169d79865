use std::fmt::Display;

use axum::response::IntoResponse;
use serde_json::{json, Value};

/// Convert an error into a JSON value suitable for OAPI documentation.
pub(crate) fn example_error<E: Display + IntoResponse>(err: E) -> Value {
    let error = err.to_string();

    json! {{
        "code": err.into_response().status().as_u16(),
        "error": error,
    }}
}

/// Example contract address for OAPI documentation.
pub(crate) fn example_contract() -> String {
    String::from("cosmos1contractaddressexample00000000000000000000")
}

/// Example block height for OAPI documentation.
pub(crate) fn example_block_height() -> i64 {
    1_000_000
}
