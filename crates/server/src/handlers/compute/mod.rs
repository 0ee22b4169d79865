/// Formula evaluation route.
mod formula;

use std::sync::Arc;

use aide::axum::{routing::get_with, ApiRouter};
use db::DatabaseConnection;

/// Create an [`ApiRouter`] that provides an API server with the formula
/// computation route.
pub(crate) fn routes() -> ApiRouter<Arc<DatabaseConnection>> {
    ApiRouter::new()
        .api_route("/:formula/:contract", get_with(formula::compute, formula::docs))
        .with_path_items(|op| op.tag("Query API"))
}
