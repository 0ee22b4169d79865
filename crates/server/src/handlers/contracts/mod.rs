/// Smart contract details route.
mod details;

/// Smart contract events list route.
mod events;

/// Smart contract list route.
mod list;

use std::sync::Arc;

use aide::axum::{routing::get_with, ApiRouter};
use db::DatabaseConnection;

/// Create an [`ApiRouter`] that provides an API server with contract
/// listing, detail, and event routes.
pub(crate) fn routes() -> ApiRouter<Arc<DatabaseConnection>> {
    ApiRouter::new()
        .api_route("/", get_with(list::list, list::docs))
        .api_route("/:address", get_with(details::details, details::docs))
        .api_route("/:address/events", get_with(events::events, events::docs))
        .with_path_items(|op| op.tag("Contract management"))
}
