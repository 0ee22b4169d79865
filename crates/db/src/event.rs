//! Raw contract state write/delete events, as discovered by the ingestion
//! driver.
//!
//! `(block_height, contract_address, key)` is unique — see the index in the
//! `events` table migration. Events are append-only at the row-identity
//! level: a duplicate tuple replaces `(value, value_json, delete)` rather
//! than inserting a second row.

use sea_orm::entity::prelude::*;

/// Event model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "wasm_events")]
pub struct Model {
    /// Unique row identifier.
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Height of the block in which this write/delete occurred.
    pub block_height: i64,

    /// Address of the contract this event belongs to.
    pub contract_address: String,

    /// Canonical (comma-separated decimal byte list) storage key.
    pub key: String,

    /// Raw UTF-8 value. Defined only when `delete` is `false`.
    pub value: Option<String>,

    /// Parsed JSON form of `value`, when parsing as UTF-8 JSON succeeds.
    pub value_json: Option<Json>,

    /// Whether this row is a tombstone for `key`.
    pub delete: bool,

    /// Unix-millisecond timestamp of `block_height`.
    pub block_time_unix_ms: i64,
}

/// Event model relations.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::contract::Entity",
        from = "Column::ContractAddress",
        to = "super::contract::Column::Address"
    )]
    Contract,
}

impl Related<super::contract::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Contract.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
