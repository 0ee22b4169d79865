//! Read-through, block-pinned view over contract state, and the range
//! evaluator built on top of it.

pub mod registry;

use std::{cell::RefCell, collections::BTreeMap};

use async_trait::async_trait;
use db::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder};
use derive_more::{Display, Error, From};

use crate::key::key_has_prefix;

/// A single dependency recorded during formula evaluation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Dependency {
    /// A full-key read via [`EvalContext::get`].
    Point { contract: String, key: String },
    /// A prefix (range) read via [`EvalContext::get_map`].
    Prefix { contract: String, prefix: String },
}

impl Dependency {
    /// Whether a change at `(contract, key)` invalidates this dependency.
    pub fn intersects(&self, contract: &str, key: &str) -> bool {
        match self {
            Dependency::Point { contract: c, key: k } => c == contract && k == key,
            Dependency::Prefix { contract: c, prefix } => {
                c == contract && key_has_prefix(key, prefix)
            }
        }
    }
}

/// A failure during formula evaluation. Caught at the call site; the
/// computation is not cached.
#[derive(Debug, Display, Error, From)]
pub enum FormulaError {
    Db(DbErr),
    #[display(fmt = "unknown formula {_0:?}")]
    Unknown(#[error(not(source))] String),
    #[display(fmt = "{_0}")]
    Evaluation(#[error(not(source))] String),
}

/// `getEnv()`'s return value.
#[derive(Debug, Clone)]
pub struct Env {
    pub block_height: u64,
    pub block_time_unix_ms: u64,
    pub chain_id: String,
    pub known_contracts: Vec<String>,
}

/// The environment a [`registry::Formula`] evaluates against: a block-pinned
/// read-through view over [`db::event`] that accumulates the dependency set
/// of the current evaluation.
pub struct EvalContext<'a> {
    db: &'a DatabaseConnection,
    block_height: u64,
    block_time_unix_ms: u64,
    chain_id: String,
    dependencies: RefCell<Vec<Dependency>>,
    known_contracts: RefCell<std::collections::BTreeSet<String>>,
}

impl<'a> EvalContext<'a> {
    pub fn new(
        db: &'a DatabaseConnection,
        block_height: u64,
        block_time_unix_ms: u64,
        chain_id: impl Into<String>,
    ) -> Self {
        Self {
            db,
            block_height,
            block_time_unix_ms,
            chain_id: chain_id.into(),
            dependencies: RefCell::new(Vec::new()),
            known_contracts: RefCell::new(std::collections::BTreeSet::new()),
        }
    }

    /// Read the value at `(contract, key)` as of the pinned block. A
    /// tombstone (the latest write being a delete) reads as `None`.
    pub async fn get(
        &self,
        contract: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, FormulaError> {
        self.remember_contract(contract);
        self.dependencies.borrow_mut().push(Dependency::Point {
            contract: contract.to_owned(),
            key: key.to_owned(),
        });

        let latest = db::event::Entity::find()
            .filter(db::event::Column::ContractAddress.eq(contract))
            .filter(db::event::Column::Key.eq(key))
            .filter(db::event::Column::BlockHeight.lte(self.block_height as i64))
            .order_by_desc(db::event::Column::BlockHeight)
            .one(self.db)
            .await?;

        Ok(latest.and_then(Self::visible_value))
    }

    /// Range-read every key under `prefix` for `contract`, as of the pinned
    /// block. Tombstoned keys are omitted.
    pub async fn get_map(
        &self,
        contract: &str,
        prefix: &str,
    ) -> Result<BTreeMap<String, serde_json::Value>, FormulaError> {
        self.remember_contract(contract);
        self.dependencies.borrow_mut().push(Dependency::Prefix {
            contract: contract.to_owned(),
            prefix: prefix.to_owned(),
        });

        let rows = db::event::Entity::find()
            .filter(db::event::Column::ContractAddress.eq(contract))
            .filter(db::event::Column::BlockHeight.lte(self.block_height as i64))
            .order_by_asc(db::event::Column::Key)
            .order_by_asc(db::event::Column::BlockHeight)
            .all(self.db)
            .await?;

        // Ascending block height per key: the last row seen for a key is
        // its latest value as of the pinned block.
        let mut latest_by_key: BTreeMap<String, db::event::Model> = BTreeMap::new();
        for row in rows {
            latest_by_key.insert(row.key.clone(), row);
        }

        Ok(latest_by_key
            .into_iter()
            .filter(|(key, _)| key_has_prefix(key, prefix))
            .filter_map(|(key, row)| Self::visible_value(row).map(|value| (key, value)))
            .collect())
    }

    /// First block time at which `(contract, key)` was ever written, as of
    /// the pinned block.
    pub async fn get_created_at(
        &self,
        contract: &str,
        key: &str,
    ) -> Result<Option<u64>, FormulaError> {
        self.remember_contract(contract);
        self.dependencies.borrow_mut().push(Dependency::Point {
            contract: contract.to_owned(),
            key: key.to_owned(),
        });

        let earliest = db::event::Entity::find()
            .filter(db::event::Column::ContractAddress.eq(contract))
            .filter(db::event::Column::Key.eq(key))
            .filter(db::event::Column::BlockHeight.lte(self.block_height as i64))
            .order_by_asc(db::event::Column::BlockHeight)
            .one(self.db)
            .await?;

        Ok(earliest.map(|row| row.block_time_unix_ms as u64))
    }

    /// `getEnv()`.
    pub fn env(&self) -> Env {
        Env {
            block_height: self.block_height,
            block_time_unix_ms: self.block_time_unix_ms,
            chain_id: self.chain_id.clone(),
            known_contracts: self.known_contracts.borrow().iter().cloned().collect(),
        }
    }

    /// Drain the dependency set accumulated so far.
    pub fn dependencies(&self) -> Vec<Dependency> {
        self.dependencies.borrow().clone()
    }

    fn remember_contract(&self, contract: &str) {
        self.known_contracts.borrow_mut().insert(contract.to_owned());
    }

    fn visible_value(row: db::event::Model) -> Option<serde_json::Value> {
        if row.delete {
            return None;
        }
        Some(
            row.value_json
                .unwrap_or_else(|| serde_json::Value::String(row.value.unwrap_or_default())),
        )
    }
}

/// A deterministic, dependency-tracked function of contract state at a
/// pinned block.
#[async_trait]
pub trait Formula: Send + Sync {
    /// Name this formula is registered under.
    fn name(&self) -> &'static str;

    /// Evaluate against `contract` with `args`, against `ctx`'s pinned
    /// block.
    async fn eval(
        &self,
        ctx: &EvalContext<'_>,
        contract: &str,
        args: &BTreeMap<String, String>,
    ) -> Result<serde_json::Value, FormulaError>;
}

/// One run of [`compute_contract_range`]: a maximal run of consecutive
/// evaluated blocks sharing the same output.
#[derive(Debug, Clone)]
pub struct Interval {
    pub block_valid: u64,
    pub block_latest: u64,
    pub output: serde_json::Value,
    pub dependencies: Vec<Dependency>,
}

/// Evaluate `formula` at every block in `[from_block, to_block]` where a
/// relevant event occurred for `contract`, run-length compressing adjacent
/// equal outputs into a single [`Interval`].
pub async fn compute_contract_range(
    db: &DatabaseConnection,
    formula: &dyn Formula,
    contract: &str,
    args: &BTreeMap<String, String>,
    chain_id: &str,
    from_block: u64,
    to_block: u64,
) -> Result<Vec<Interval>, FormulaError> {
    let mut change_points: std::collections::BTreeSet<u64> =
        std::collections::BTreeSet::from([from_block]);

    let rows = db::event::Entity::find()
        .filter(db::event::Column::ContractAddress.eq(contract))
        .filter(db::event::Column::BlockHeight.gte(from_block as i64))
        .filter(db::event::Column::BlockHeight.lte(to_block as i64))
        .all(db)
        .await?;
    for row in rows {
        change_points.insert(row.block_height as u64);
    }

    let change_points: Vec<u64> = change_points.into_iter().collect();
    let mut intervals: Vec<Interval> = Vec::new();

    for (index, &valid) in change_points.iter().enumerate() {
        let latest = change_points
            .get(index + 1)
            .map(|next| next - 1)
            .unwrap_or(to_block);

        // block time is only used for getEnv(); the latest known event
        // time at or before `valid` is close enough for a read-only view.
        let ctx = EvalContext::new(db, valid, block_time_for(db, contract, valid).await?, chain_id);
        let output = formula.eval(&ctx, contract, args).await?;
        let dependencies = ctx.dependencies();

        match intervals.last_mut() {
            Some(previous) if previous.output == output && previous.block_latest + 1 == valid => {
                previous.block_latest = latest;
                for dependency in dependencies {
                    if !previous.dependencies.contains(&dependency) {
                        previous.dependencies.push(dependency);
                    }
                }
            }
            _ => intervals.push(Interval {
                block_valid: valid,
                block_latest: latest,
                output,
                dependencies,
            }),
        }
    }

    Ok(intervals)
}

async fn block_time_for(
    db: &DatabaseConnection,
    contract: &str,
    at_block: u64,
) -> Result<u64, FormulaError> {
    let latest = db::event::Entity::find()
        .filter(db::event::Column::ContractAddress.eq(contract))
        .filter(db::event::Column::BlockHeight.lte(at_block as i64))
        .order_by_desc(db::event::Column::BlockHeight)
        .one(db)
        .await?;
    Ok(latest.map(|row| row.block_time_unix_ms as u64).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use db::{event, ActiveValue, EntityTrait};

    use super::*;
    use crate::testing::create_database;

    async fn insert_event(
        db: &DatabaseConnection,
        contract: &str,
        key: &str,
        block_height: i64,
        value_json: Option<serde_json::Value>,
        delete: bool,
    ) {
        event::Entity::insert(event::ActiveModel {
            id: ActiveValue::NotSet,
            block_height: ActiveValue::Set(block_height),
            contract_address: ActiveValue::Set(contract.to_owned()),
            key: ActiveValue::Set(key.to_owned()),
            value: ActiveValue::Set(value_json.as_ref().map(ToString::to_string)),
            value_json: ActiveValue::Set(value_json),
            delete: ActiveValue::Set(delete),
            block_time_unix_ms: ActiveValue::Set(block_height * 1000),
        })
        .exec_without_returning(db)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn get_returns_latest_at_or_before_the_pinned_block_and_records_a_dependency() {
        let db = create_database().await;
        insert_event(&db, "a", "k1", 10, Some(serde_json::json!(1)), false).await;
        insert_event(&db, "a", "k1", 20, Some(serde_json::json!(2)), false).await;

        let ctx = EvalContext::new(&db, 15, 15_000, "test-chain");
        let value = ctx.get("a", "k1").await.unwrap();
        assert_eq!(value, Some(serde_json::json!(1)));
        assert_eq!(
            ctx.dependencies(),
            vec![Dependency::Point { contract: String::from("a"), key: String::from("k1") }]
        );

        let ctx = EvalContext::new(&db, 25, 25_000, "test-chain");
        assert_eq!(ctx.get("a", "k1").await.unwrap(), Some(serde_json::json!(2)));
    }

    #[tokio::test]
    async fn get_returns_none_when_the_latest_write_is_a_tombstone() {
        let db = create_database().await;
        insert_event(&db, "a", "k1", 10, Some(serde_json::json!(1)), false).await;
        insert_event(&db, "a", "k1", 20, None, true).await;

        let ctx = EvalContext::new(&db, 25, 25_000, "test-chain");
        assert_eq!(ctx.get("a", "k1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn get_map_scopes_to_the_prefix_and_omits_tombstones() {
        let db = create_database().await;
        insert_event(&db, "a", "1,1", 10, Some(serde_json::json!("x")), false).await;
        insert_event(&db, "a", "1,2", 10, Some(serde_json::json!("y")), false).await;
        insert_event(&db, "a", "1,2", 20, None, true).await;
        insert_event(&db, "a", "2,1", 10, Some(serde_json::json!("z")), false).await;

        let ctx = EvalContext::new(&db, 25, 25_000, "test-chain");
        let map = ctx.get_map("a", "1").await.unwrap();

        assert_eq!(map.len(), 1);
        assert_eq!(map.get("1,1"), Some(&serde_json::json!("x")));
    }

    struct AlwaysOne;

    #[async_trait]
    impl Formula for AlwaysOne {
        fn name(&self) -> &'static str {
            "always_one"
        }

        async fn eval(
            &self,
            _ctx: &EvalContext<'_>,
            _contract: &str,
            _args: &BTreeMap<String, String>,
        ) -> Result<serde_json::Value, FormulaError> {
            Ok(serde_json::json!(1))
        }
    }

    #[tokio::test]
    async fn compute_contract_range_coalesces_adjacent_equal_outputs() {
        let db = create_database().await;
        insert_event(&db, "a", "k1", 10, Some(serde_json::json!(1)), false).await;
        insert_event(&db, "a", "k2", 15, Some(serde_json::json!(2)), false).await;

        let intervals =
            compute_contract_range(&db, &AlwaysOne, "a", &BTreeMap::new(), "test-chain", 1, 20)
                .await
                .unwrap();

        // Every evaluated block returns the same constant output, so the
        // whole range coalesces into a single interval.
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].block_valid, 1);
        assert_eq!(intervals[0].block_latest, 20);
    }
}
