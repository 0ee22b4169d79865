//! Singleton [`db::state`] checkpoint repository.
//!
//! Every update goes through [`advance`], which applies `GREATEST`-style
//! monotonic-max semantics to each column, so a crash-and-restart (or a
//! replayed batch, see the idempotence law in §8) can never regress the
//! checkpoint.

use db::{
    sea_query::OnConflict, state, ActiveValue, ColumnTrait, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter,
};

/// Read the current checkpoint, inserting the zeroed singleton row if this
/// is the first run.
pub async fn load(db: &DatabaseConnection) -> Result<state::Model, DbErr> {
    if let Some(existing) = state::Entity::find_by_id(state::SINGLETON_ID)
        .one(db)
        .await?
    {
        return Ok(existing);
    }

    let model = state::ActiveModel {
        id: ActiveValue::Set(state::SINGLETON_ID),
        last_wasm_block_height_exported: ActiveValue::Set(0),
        latest_block_height: ActiveValue::Set(0),
        latest_block_time_unix_ms: ActiveValue::Set(0),
    };

    state::Entity::insert(model)
        .on_conflict(
            OnConflict::column(state::Column::Id)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    state::Entity::find_by_id(state::SINGLETON_ID)
        .one(db)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(String::from("state singleton")))
}

/// Advance the checkpoint to at least `block_height`/`block_time_unix_ms`,
/// and at least `last_wasm_block_height_exported` for the exported height.
///
/// Never regresses any column, even if called with a smaller value (for
/// example, via a replayed batch).
pub async fn advance(
    db: &DatabaseConnection,
    last_wasm_block_height_exported: u64,
    latest_block_height: u64,
    latest_block_time_unix_ms: u64,
) -> Result<(), DbErr> {
    let current = load(db).await?;

    let next = state::ActiveModel {
        id: ActiveValue::Unchanged(state::SINGLETON_ID),
        last_wasm_block_height_exported: ActiveValue::Set(
            current
                .last_wasm_block_height_exported
                .max(last_wasm_block_height_exported as i64),
        ),
        latest_block_height: ActiveValue::Set(
            current.latest_block_height.max(latest_block_height as i64),
        ),
        latest_block_time_unix_ms: ActiveValue::Set(
            current
                .latest_block_time_unix_ms
                .max(latest_block_time_unix_ms as i64),
        ),
    };

    state::Entity::update(next)
        .filter(state::Column::Id.eq(state::SINGLETON_ID))
        .exec(db)
        .await?;

    Ok(())
}
