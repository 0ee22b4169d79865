//! # API server
//!
//! Read-only HTTP query surface over the indexer's store: cached formula
//! computation and contract/event listing. The server will not handle TLS
//! termination by itself, thus it has to be proxied via some other server
//! which will handle that.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

/// Route handlers.
mod handlers;

/// Resource pagination structs.
mod pagination;

/// [`schemars`] crate helper functions.
mod schema;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use aide::{
    axum::ApiRouter,
    openapi::{OpenApi, Tag},
    transform::TransformOpenApi,
};
use axum::{Extension, Server};
use common::{config::Config, logging};
use db::{Database, DatabaseConnection};
use tracing::info;

/// API server entrypoint.
#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::new(None)?;

    logging::init(&config);

    let Some(server_config) = config.server.as_ref() else {
        return Err(anyhow::Error::msg("unable to load server config"));
    };

    info!("connecting to database");
    let database = Arc::new(Database::connect(&config.database.url).await?);
    info!("database connection established");
    let server = Server::bind(&server_config.address);
    let config = Arc::new(config);

    let mut api = OpenApi::default();

    server
        .serve(
            app_router(database, config)
                .finish_api_with(&mut api, api_docs)
                .layer(Extension(Arc::new(api)))
                .into_make_service(),
        )
        .await?;

    Ok(())
}

/// Construct a [`ApiRouter`] with API server endpoints.
fn app_router(database: Arc<DatabaseConnection>, config: Arc<Config>) -> ApiRouter {
    ApiRouter::new()
        .nest("/compute", handlers::compute::routes())
        .nest("/contracts", handlers::contracts::routes())
        .nest("/docs", handlers::docs::routes())
        .layer(Extension(config))
        .with_state(database)
}

/// Document public API using [`aide`] crate.
fn api_docs(api: TransformOpenApi) -> TransformOpenApi {
    api.title("Indexer query API")
        .description("Read-only formula computation and contract/event listing routes")
        .tag(Tag {
            name: "Query API".into(),
            ..Default::default()
        })
        .tag(Tag {
            name: "Contract management".into(),
            ..Default::default()
        })
}
