//! Singleton pipeline checkpoint row.
//!
//! Initialized on first start, read-write throughout, never destroyed.
//! Every column update must use monotonic-max semantics — callers should go
//! through [`indexer::ingest`](../../indexer/ingest/index.html)'s
//! checkpoint helper rather than writing this entity directly, to avoid a
//! regression under crash-restart.

use sea_orm::entity::prelude::*;

/// Row identifier of the single [`Model`] row this table ever holds.
pub const SINGLETON_ID: i64 = 1;

/// State model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "state")]
pub struct Model {
    /// Always [`SINGLETON_ID`].
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,

    /// Height of the last block whose events were fully flushed.
    pub last_wasm_block_height_exported: i64,

    /// Height of the most recent block observed in the stream.
    pub latest_block_height: i64,

    /// Unix-millisecond timestamp of `latest_block_height`.
    pub latest_block_time_unix_ms: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
