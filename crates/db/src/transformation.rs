//! Rule-derived normalized projections of raw [`events`](super::event).
//!
//! `(block_height, contract_address, name)` is unique; a transformation row
//! is upserted with the latest projected value on duplicate, the same way
//! `events` rows are.

use sea_orm::entity::prelude::*;

/// Transformation model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "wasm_event_transformations")]
pub struct Model {
    /// Unique row identifier.
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Height of the block whose event produced this row.
    pub block_height: i64,

    /// Address of the contract this transformation belongs to.
    pub contract_address: String,

    /// Rule-assigned name, possibly embedding decoded key segments.
    pub name: String,

    /// Projected value, or `null` for a deletion whose rule propagates it.
    pub value: Option<Json>,
}

/// Transformation model relations.
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
