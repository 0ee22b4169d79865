//! Blockchain-state indexer and query engine library.
//!
//! Tails a stream of contract state-write events, persists them, derives
//! transformations, evaluates cached formulas, and dispatches webhooks.
//! See each module for the corresponding subsystem.

pub mod cache;
pub mod formula;
pub mod ingest;
pub mod key;
pub mod reindex;
pub mod state;
pub mod transform;
pub mod webhook;

/// Shared test fixtures: an in-memory, fully migrated database.
#[cfg(test)]
pub(crate) mod testing {
    use db::{Database, DatabaseConnection};
    use migration::MigratorTrait;

    pub async fn create_database() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("unable to create test database");

        migration::Migrator::up(&db, None)
            .await
            .expect("unable to run migrations");

        db
    }
}
