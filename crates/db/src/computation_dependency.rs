//! Many-to-one side table recording which `(contract, key-or-prefix)` reads
//! a [`computation`](super::computation) performed during evaluation.
//!
//! Used for the reverse lookup "which computations depend on this key",
//! driven by [`indexer::cache`](../../indexer/cache/index.html)'s
//! invalidation pass.

use sea_orm::entity::prelude::*;

/// Computation dependency model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "computation_dependencies")]
pub struct Model {
    /// Unique row identifier.
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Owning computation.
    pub computation_id: i64,

    /// Contract this dependency was read from.
    pub contract: String,

    /// Key or key-prefix that was read.
    pub key_or_prefix: String,

    /// Whether `key_or_prefix` is a prefix (range read) rather than a full
    /// key (point read).
    pub is_prefix: bool,
}

/// Computation dependency model relations.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::computation::Entity",
        from = "Column::ComputationId",
        to = "super::computation::Column::Id"
    )]
    Computation,
}

impl Related<super::computation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Computation.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
