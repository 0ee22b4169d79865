//! Queued webhook deliveries.
//!
//! Created on event match, deleted on successful delivery; `failures` is
//! incremented and the row kept on failure.

use sea_orm::entity::prelude::*;

/// Pending webhook model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "pending_webhooks")]
pub struct Model {
    /// Unique row identifier.
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Event that triggered this delivery.
    pub event_id: i64,

    /// Serialized endpoint descriptor (`Url` or `Soketi` variant).
    pub endpoint: Json,

    /// Resolved value to deliver.
    pub value: Json,

    /// Count of prior failed delivery attempts.
    pub failures: i32,

    /// Unix-millisecond timestamp of the most recent delivery attempt, if
    /// any has been made. `None` for a row that has never been attempted.
    pub last_attempted_at: Option<i64>,
}

/// Pending webhook model relations.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::event::Entity",
        from = "Column::EventId",
        to = "super::event::Column::Id"
    )]
    Event,
}

impl Related<super::event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Event.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
