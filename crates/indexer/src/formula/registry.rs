//! Maps formula names to implementations.
//!
//! The registry is a plain table: each deployment is expected to grow its
//! own named formulas the way it grows its own [`crate::transform::rules`].
//! The two formulas below illustrate the two shapes called out in the
//! design notes: a direct point read, and a contract-dispatched table of
//! sub-formulas keyed by the target's own declared contract name.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;

use super::{EvalContext, Formula, FormulaError};

/// Reads a single key verbatim; `args["key"]` is a canonical
/// (comma-separated decimal byte) key.
pub struct GetValue;

#[async_trait]
impl Formula for GetValue {
    fn name(&self) -> &'static str {
        "get_value"
    }

    async fn eval(
        &self,
        ctx: &EvalContext<'_>,
        contract: &str,
        args: &BTreeMap<String, String>,
    ) -> Result<serde_json::Value, FormulaError> {
        let key = args
            .get("key")
            .ok_or_else(|| FormulaError::Evaluation(String::from("missing required arg `key`")))?;

        Ok(ctx.get(contract, key).await?.unwrap_or(serde_json::Value::Null))
    }
}

/// Dispatches to a sub-formula by the contract's own `contract_info.contract`
/// name, read via the `config` transformation's `contract_info` field.
///
/// Mirrors the `voting_power` / `total_power` dispatch table called out in
/// the design notes: a contract declares what kind of contract it is, and
/// the formula looks up the matching implementation rather than branching
/// on `code_id`.
pub struct TotalPower {
    by_contract_name: HashMap<&'static str, Box<dyn Formula>>,
}

impl TotalPower {
    pub fn new() -> Self {
        let mut by_contract_name: HashMap<&'static str, Box<dyn Formula>> = HashMap::new();
        by_contract_name.insert("crates.io:dao-voting-token-staked", Box::new(GetValue));
        Self { by_contract_name }
    }
}

impl Default for TotalPower {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Formula for TotalPower {
    fn name(&self) -> &'static str {
        "total_power"
    }

    async fn eval(
        &self,
        ctx: &EvalContext<'_>,
        contract: &str,
        args: &BTreeMap<String, String>,
    ) -> Result<serde_json::Value, FormulaError> {
        let contract_info = ctx
            .get(contract, &crate::key::bytes_to_event_key(b"contract_info"))
            .await?
            .ok_or_else(|| FormulaError::Evaluation(String::from("contract has no contract_info")))?;

        let contract_name = contract_info
            .get("contract")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| FormulaError::Evaluation(String::from("contract_info missing `contract`")))?;

        let sub_formula = self
            .by_contract_name
            .get(contract_name)
            .ok_or_else(|| FormulaError::Evaluation(format!("no total_power formula for {contract_name}")))?;

        sub_formula.eval(ctx, contract, args).await
    }
}

/// Build the built-in formula registry.
pub fn builtin() -> HashMap<&'static str, Box<dyn Formula>> {
    let mut registry: HashMap<&'static str, Box<dyn Formula>> = HashMap::new();
    registry.insert(GetValue.name(), Box::new(GetValue));
    let total_power = TotalPower::new();
    registry.insert(total_power.name(), Box::new(total_power));
    registry
}
