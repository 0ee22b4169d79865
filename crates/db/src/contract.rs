//! A single smart contract instance, as discovered from its first event.
//!
//! `instantiated_at_block` is write-once: it reflects the earliest event
//! ever observed for the address, not necessarily the first event seen in
//! any particular ingestion batch. `code_id` is mutable — it changes when
//! the chain records a contract migration.

use sea_orm::entity::prelude::*;

/// Smart contract information model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "contracts")]
pub struct Model {
    /// Contract address, primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub address: String,

    /// Current code identifier.
    pub code_id: i64,

    /// Height of the earliest event ever observed for this contract.
    pub instantiated_at_block: i64,
}

/// Smart contract model relations.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::event::Entity")]
    Events,
}

impl Related<super::event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Events.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
