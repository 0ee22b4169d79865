//! A cached formula output over a contiguous block range.
//!
//! Identity is `(formula, target_contract, args)`; `args` holds the
//! already-canonicalized (key-sorted JSON) argument mapping, so equality on
//! the column is equality on the logical identity. No two rows for the same
//! identity should have overlapping `[block_height_valid,
//! block_height_latest]` ranges — enforced by
//! [`indexer::cache`](../../indexer/cache/index.html), not by a database
//! constraint, since SQLite (used in tests) cannot express range-exclusion
//! constraints.

use sea_orm::entity::prelude::*;

/// Computation model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "computations")]
pub struct Model {
    /// Unique row identifier.
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Name of the formula that produced `output`.
    pub formula: String,

    /// Contract the formula was evaluated against.
    pub target_contract: String,

    /// Canonicalized (key-sorted JSON) argument mapping.
    pub args: String,

    /// First block height for which `output` is valid.
    pub block_height_valid: i64,

    /// Last block height for which `output` is valid.
    pub block_height_latest: i64,

    /// Cached formula output, as JSON.
    pub output: Option<Json>,
}

/// Computation model relations.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::computation_dependency::Entity")]
    Dependencies,
}

impl Related<super::computation_dependency::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Dependencies.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
