pub use sea_orm_migration::prelude::*;

mod m20220101_000001_create_contracts_table;
mod m20220101_000002_create_wasm_events_table;
mod m20220101_000003_create_wasm_event_transformations_table;
mod m20220101_000004_create_computations_table;
mod m20220101_000005_create_computation_dependencies_table;
mod m20220101_000006_create_pending_webhooks_table;
mod m20220101_000007_create_state_table;

pub(crate) use m20220101_000001_create_contracts_table::Contracts;
pub(crate) use m20220101_000002_create_wasm_events_table::WasmEvents;
pub(crate) use m20220101_000004_create_computations_table::Computations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20220101_000001_create_contracts_table::Migration),
            Box::new(m20220101_000002_create_wasm_events_table::Migration),
            Box::new(m20220101_000003_create_wasm_event_transformations_table::Migration),
            Box::new(m20220101_000004_create_computations_table::Migration),
            Box::new(m20220101_000005_create_computation_dependencies_table::Migration),
            Box::new(m20220101_000006_create_pending_webhooks_table::Migration),
            Box::new(m20220101_000007_create_state_table::Migration),
        ]
    }
}
