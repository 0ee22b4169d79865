//! Stores past formula outputs keyed by `(formula, contract, args,
//! blockRange)` and keeps them correct as new events arrive, without ever
//! re-running a formula during ingestion.

use std::collections::BTreeMap;

use db::{
    computation, computation_dependency, state, ActiveValue, ColumnTrait,
    DatabaseConnection, DbErr, EntityTrait, QueryFilter, TransactionTrait,
};
use derive_more::{Display, Error, From};

use crate::formula::{compute_contract_range, Dependency, Formula, FormulaError};

/// A query that could not be answered from cache or current state.
#[derive(Debug, Display, Error, From)]
pub enum CacheError {
    Db(DbErr),
    Formula(FormulaError),
    #[display(fmt = "block {_0} has not been indexed yet")]
    NotYetIndexed(#[error(not(source))] u64),
}

/// Key-sort `args` into the canonical form a computation's identity is
/// keyed on.
pub fn canonicalize_args(args: &BTreeMap<String, String>) -> String {
    // BTreeMap already iterates in key order, so this is key-sorted JSON.
    serde_json::to_string(args).expect("string-keyed map always serializes")
}

/// `query(formula, contract, args, atBlock)`.
///
/// Returns the cached output if a covering row exists; otherwise evaluates
/// and caches it, provided `at_block` has already been indexed.
pub async fn query(
    db: &DatabaseConnection,
    formula: &dyn Formula,
    contract: &str,
    args: &BTreeMap<String, String>,
    at_block: u64,
    chain_id: &str,
) -> Result<serde_json::Value, CacheError> {
    let canonical_args = canonicalize_args(args);

    if let Some(row) = computation::Entity::find()
        .filter(computation::Column::Formula.eq(formula.name()))
        .filter(computation::Column::TargetContract.eq(contract))
        .filter(computation::Column::Args.eq(canonical_args.clone()))
        .filter(computation::Column::BlockHeightValid.lte(at_block as i64))
        .filter(computation::Column::BlockHeightLatest.gte(at_block as i64))
        .one(db)
        .await?
    {
        return row.output.ok_or(CacheError::NotYetIndexed(at_block));
    }

    let checkpoint = state::Entity::find_by_id(state::SINGLETON_ID)
        .one(db)
        .await?;
    let latest_block_height = checkpoint.map(|row| row.latest_block_height).unwrap_or(0) as u64;

    if at_block > latest_block_height {
        return Err(CacheError::NotYetIndexed(at_block));
    }

    let intervals =
        compute_contract_range(db, formula, contract, args, chain_id, at_block, at_block).await?;

    let output = intervals
        .first()
        .map(|interval| interval.output.clone())
        .unwrap_or(serde_json::Value::Null);

    create_from_computation_outputs(db, formula.name(), contract, &canonical_args, &intervals)
        .await?;

    Ok(output)
}

/// `createFromComputationOutputs`.
///
/// Upserts `intervals` so the identity's stored ranges stay pairwise
/// disjoint: a new interval whose output matches, and whose range directly
/// abuts, an existing row extends that row's `block_height_latest` instead
/// of inserting a new one.
pub async fn create_from_computation_outputs(
    db: &DatabaseConnection,
    formula: &str,
    contract: &str,
    canonical_args: &str,
    intervals: &[super::formula::Interval],
) -> Result<usize, DbErr> {
    if intervals.is_empty() {
        return Ok(0);
    }

    let mut written = 0;

    for interval in intervals {
        let abutting = computation::Entity::find()
            .filter(computation::Column::Formula.eq(formula))
            .filter(computation::Column::TargetContract.eq(contract))
            .filter(computation::Column::Args.eq(canonical_args))
            .filter(computation::Column::BlockHeightLatest.eq(interval.block_valid as i64 - 1))
            .one(db)
            .await?;

        let computation_id = match abutting {
            Some(existing) if existing.output.as_ref() == Some(&interval.output) => {
                let id = existing.id;
                let mut model: computation::ActiveModel = existing.into();
                model.block_height_latest = ActiveValue::Set(interval.block_latest as i64);
                computation::Entity::update(model).exec(db).await?;
                id
            }
            _ => {
                let model = computation::ActiveModel {
                    id: ActiveValue::NotSet,
                    formula: ActiveValue::Set(formula.to_owned()),
                    target_contract: ActiveValue::Set(contract.to_owned()),
                    args: ActiveValue::Set(canonical_args.to_owned()),
                    block_height_valid: ActiveValue::Set(interval.block_valid as i64),
                    block_height_latest: ActiveValue::Set(interval.block_latest as i64),
                    output: ActiveValue::Set(Some(interval.output.clone())),
                };
                let inserted = computation::Entity::insert(model).exec(db).await?;
                inserted.last_insert_id
            }
        };

        replace_dependencies(db, computation_id, &interval.dependencies).await?;
        written += 1;
    }

    Ok(written)
}

async fn replace_dependencies(
    db: &DatabaseConnection,
    computation_id: i64,
    dependencies: &[Dependency],
) -> Result<(), DbErr> {
    computation_dependency::Entity::delete_many()
        .filter(computation_dependency::Column::ComputationId.eq(computation_id))
        .exec(db)
        .await?;

    if dependencies.is_empty() {
        return Ok(());
    }

    let models = dependencies.iter().map(|dependency| {
        let (contract, key_or_prefix, is_prefix) = match dependency {
            Dependency::Point { contract, key } => (contract.clone(), key.clone(), false),
            Dependency::Prefix { contract, prefix } => (contract.clone(), prefix.clone(), true),
        };
        computation_dependency::ActiveModel {
            id: ActiveValue::NotSet,
            computation_id: ActiveValue::Set(computation_id),
            contract: ActiveValue::Set(contract),
            key_or_prefix: ActiveValue::Set(key_or_prefix),
            is_prefix: ActiveValue::Set(is_prefix),
        }
    });

    computation_dependency::Entity::insert_many(models)
        .exec_without_returning(db)
        .await?;

    Ok(())
}

/// Counts returned by [`update_computation_validity_dependent_on_changes`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InvalidationCounts {
    pub updated: usize,
    pub destroyed: usize,
}

/// A single changed `(contract, key)` from the current flush — a
/// `WasmEvent` write or a `WasmEventTransformation` write, both indexed the
/// same way for invalidation purposes.
pub struct Change {
    pub contract: String,
    pub key: String,
    pub block_height: u64,
}

/// `updateComputationValidityDependentOnChanges`.
///
/// For every computation whose dependency set intersects `changes`,
/// truncates or destroys it per §4.4's decision tree. Bounded work: linear
/// in `changes.len() * average dependents per key`.
pub async fn update_computation_validity_dependent_on_changes(
    db: &DatabaseConnection,
    changes: &[Change],
) -> Result<InvalidationCounts, DbErr> {
    let mut counts = InvalidationCounts::default();

    let txn = db.begin().await?;

    let contracts: std::collections::BTreeSet<&str> =
        changes.iter().map(|change| change.contract.as_str()).collect();

    let mut hmin_by_computation: BTreeMap<i64, u64> = BTreeMap::new();

    for contract in contracts {
        let candidates = computation_dependency::Entity::find()
            .filter(computation_dependency::Column::Contract.eq(contract))
            .all(&txn)
            .await?;

        for candidate in candidates {
            for change in changes.iter().filter(|change| change.contract == contract) {
                if !dependency_intersects(&candidate, &change.key) {
                    continue;
                }

                hmin_by_computation
                    .entry(candidate.computation_id)
                    .and_modify(|hmin| *hmin = (*hmin).min(change.block_height))
                    .or_insert(change.block_height);
            }
        }
    }

    for (computation_id, hmin) in hmin_by_computation {
        let Some(computation) = computation::Entity::find_by_id(computation_id).one(&txn).await?
        else {
            continue;
        };

        if hmin as i64 > computation.block_height_latest {
            continue;
        }

        if hmin as i64 <= computation.block_height_valid {
            computation::Entity::delete_by_id(computation.id)
                .exec(&txn)
                .await?;
            counts.destroyed += 1;
            continue;
        }

        let mut model: computation::ActiveModel = computation.into();
        model.block_height_latest = ActiveValue::Set(hmin as i64 - 1);
        computation::Entity::update(model).exec(&txn).await?;
        counts.updated += 1;
    }

    txn.commit().await?;

    Ok(counts)
}

fn dependency_intersects(candidate: &computation_dependency::Model, key: &str) -> bool {
    if candidate.is_prefix {
        crate::key::key_has_prefix(key, &candidate.key_or_prefix)
    } else {
        candidate.key_or_prefix == key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{formula::Interval, testing::create_database};

    fn interval(valid: u64, latest: u64, output: i64, contract: &str, key: &str) -> Interval {
        Interval {
            block_valid: valid,
            block_latest: latest,
            output: serde_json::json!(output),
            dependencies: vec![Dependency::Point {
                contract: contract.to_owned(),
                key: key.to_owned(),
            }],
        }
    }

    #[tokio::test]
    async fn extends_rightward_adjacent_equal_output_instead_of_inserting() {
        let db = create_database().await;

        create_from_computation_outputs(
            &db,
            "get_value",
            "a",
            "{}",
            &[interval(1, 10, 1, "a", "k1")],
        )
        .await
        .unwrap();
        create_from_computation_outputs(
            &db,
            "get_value",
            "a",
            "{}",
            &[interval(11, 20, 1, "a", "k1")],
        )
        .await
        .unwrap();

        let rows = computation::Entity::find().all(&db).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].block_height_valid, 1);
        assert_eq!(rows[0].block_height_latest, 20);
    }

    #[tokio::test]
    async fn truncates_when_change_falls_strictly_inside_the_range() {
        let db = create_database().await;

        create_from_computation_outputs(
            &db,
            "get_value",
            "a",
            "{}",
            &[interval(10, 20, 1, "a", "k1")],
        )
        .await
        .unwrap();

        let counts = update_computation_validity_dependent_on_changes(
            &db,
            &[Change { contract: String::from("a"), key: String::from("k1"), block_height: 15 }],
        )
        .await
        .unwrap();

        assert_eq!(counts, InvalidationCounts { updated: 1, destroyed: 0 });

        let row = computation::Entity::find().one(&db).await.unwrap().unwrap();
        assert_eq!(row.block_height_valid, 10);
        assert_eq!(row.block_height_latest, 14);
    }

    #[tokio::test]
    async fn destroys_when_change_is_at_or_before_the_valid_bound() {
        let db = create_database().await;

        create_from_computation_outputs(
            &db,
            "get_value",
            "a",
            "{}",
            &[interval(10, 20, 1, "a", "k1")],
        )
        .await
        .unwrap();

        let counts = update_computation_validity_dependent_on_changes(
            &db,
            &[Change { contract: String::from("a"), key: String::from("k1"), block_height: 10 }],
        )
        .await
        .unwrap();

        assert_eq!(counts, InvalidationCounts { updated: 0, destroyed: 1 });
        assert!(computation::Entity::find().one(&db).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn leaves_computation_untouched_when_change_is_after_its_range() {
        let db = create_database().await;

        create_from_computation_outputs(
            &db,
            "get_value",
            "a",
            "{}",
            &[interval(10, 20, 1, "a", "k1")],
        )
        .await
        .unwrap();

        let counts = update_computation_validity_dependent_on_changes(
            &db,
            &[Change { contract: String::from("a"), key: String::from("k1"), block_height: 25 }],
        )
        .await
        .unwrap();

        assert_eq!(counts, InvalidationCounts::default());

        let row = computation::Entity::find().one(&db).await.unwrap().unwrap();
        assert_eq!(row.block_height_latest, 20);
    }

    #[tokio::test]
    async fn prefix_dependency_is_invalidated_by_a_key_under_it() {
        let db = create_database().await;

        let prefix_interval = Interval {
            block_valid: 10,
            block_latest: 20,
            output: serde_json::json!(1),
            dependencies: vec![Dependency::Prefix {
                contract: String::from("a"),
                prefix: String::from("1,2"),
            }],
        };
        create_from_computation_outputs(&db, "get_map", "a", "{}", &[prefix_interval])
            .await
            .unwrap();

        let counts = update_computation_validity_dependent_on_changes(
            &db,
            &[Change { contract: String::from("a"), key: String::from("1,2,3"), block_height: 15 }],
        )
        .await
        .unwrap();

        assert_eq!(counts, InvalidationCounts { updated: 1, destroyed: 0 });
    }

    #[tokio::test]
    async fn unrelated_key_does_not_invalidate() {
        let db = create_database().await;

        create_from_computation_outputs(
            &db,
            "get_value",
            "a",
            "{}",
            &[interval(10, 20, 1, "a", "k1")],
        )
        .await
        .unwrap();

        let counts = update_computation_validity_dependent_on_changes(
            &db,
            &[Change { contract: String::from("a"), key: String::from("k2"), block_height: 15 }],
        )
        .await
        .unwrap();

        assert_eq!(counts, InvalidationCounts::default());
    }
}
