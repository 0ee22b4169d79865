//! Pattern-matches parsed events against transformation rules and writes
//! the derived [`db::transformation`] rows.

/// Built-in example rules.
pub mod rules;

use db::{
    sea_query::OnConflict, transformation, ActiveValue, ColumnTrait, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter,
};

use crate::{ingest::record::ParsedEvent, key::key_has_prefix};

/// What a rule's `project` function decided for a given event.
pub enum Projected {
    /// The rule does not apply to this event; produce no row.
    Skip,
    /// The rule applies; `None` is a propagated deletion (tombstone),
    /// `Some` is the derived value.
    Value(Option<serde_json::Value>),
}

/// A single transformation rule: `{ nameTemplate, contractFilter, keyFilter,
/// project }` from §4.2.
pub struct Rule {
    /// Identifies the rule in logs; not stored anywhere.
    pub id: &'static str,

    /// Restricts the rule to specific contracts, by code id. `None` matches
    /// every contract.
    pub code_ids: Option<&'static [u64]>,

    /// Matches on the canonical key (exact match or prefix, depending on
    /// the closure's own logic — `key_has_prefix` is provided as a helper).
    pub key_filter: fn(&str) -> bool,

    /// Produces the stored transformation `name`, possibly embedding
    /// decoded key segments.
    pub name_template: fn(&ParsedEvent) -> String,

    /// Projects the event to a transformation value, or skips it.
    pub project: fn(&ParsedEvent) -> Projected,
}

/// One row this flush wants to create or update.
pub struct TransformationOutput {
    pub block_height: u64,
    pub contract_address: String,
    pub name: String,
    pub value: Option<serde_json::Value>,
}

/// Apply every rule in `rules` against `event`, producing zero or more
/// transformation outputs.
pub fn apply(rules: &[Rule], event: &ParsedEvent) -> Vec<TransformationOutput> {
    rules
        .iter()
        .filter(|rule| {
            rule.code_ids
                .map_or(true, |ids| ids.contains(&event.code_id))
        })
        .filter(|rule| (rule.key_filter)(&event.key))
        .filter_map(|rule| match (rule.project)(event) {
            Projected::Skip => None,
            Projected::Value(value) => Some(TransformationOutput {
                block_height: event.block_height,
                contract_address: event.contract_address.clone(),
                name: (rule.name_template)(event),
                value,
            }),
        })
        .collect()
}

/// Upsert `outputs`, returning the final rows — used as additional
/// change-keys for computation cache invalidation.
pub async fn write(
    db: &DatabaseConnection,
    outputs: Vec<TransformationOutput>,
) -> Result<Vec<transformation::Model>, DbErr> {
    if outputs.is_empty() {
        return Ok(Vec::new());
    }

    let identities: Vec<(i64, String, String)> = outputs
        .iter()
        .map(|output| {
            (
                output.block_height as i64,
                output.contract_address.clone(),
                output.name.clone(),
            )
        })
        .collect();

    let models = outputs.into_iter().map(|output| transformation::ActiveModel {
        id: ActiveValue::NotSet,
        block_height: ActiveValue::Set(output.block_height as i64),
        contract_address: ActiveValue::Set(output.contract_address),
        name: ActiveValue::Set(output.name),
        value: ActiveValue::Set(output.value),
    });

    transformation::Entity::insert_many(models)
        .on_conflict(
            OnConflict::columns([
                transformation::Column::BlockHeight,
                transformation::Column::ContractAddress,
                transformation::Column::Name,
            ])
            .update_column(transformation::Column::Value)
            .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    // sea-orm 0.11 has no portable upsert-returning; re-select by the
    // identity we just wrote.
    let mut rows = Vec::with_capacity(identities.len());
    for (block_height, contract_address, name) in identities {
        if let Some(row) = transformation::Entity::find()
            .filter(transformation::Column::BlockHeight.eq(block_height))
            .filter(transformation::Column::ContractAddress.eq(contract_address))
            .filter(transformation::Column::Name.eq(name))
            .one(db)
            .await?
        {
            rows.push(row);
        }
    }

    Ok(rows)
}

/// Test whether `key` lies at or under a literal prefix.
pub fn prefix(prefix: &'static str) -> impl Fn(&str) -> bool {
    move |key| key_has_prefix(key, prefix)
}
