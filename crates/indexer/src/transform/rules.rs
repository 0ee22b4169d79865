//! Example transformation rules.
//!
//! These illustrate the shape a deployment's own rule set takes; they are
//! not meaningful beyond demonstrating the engine in [`super`].

use super::{prefix, Projected, Rule};

/// A contract's raw `config` key, surfaced verbatim as a named
/// transformation so downstream formulas don't need to know the storage
/// key's byte layout.
const CONFIG: Rule = Rule {
    id: "config",
    code_ids: None,
    key_filter: config_key,
    name_template: |_event| String::from("config"),
    project: |event| Projected::Value(event.value_json.clone()),
};

fn config_key(key: &str) -> bool {
    prefix("99,111,110,102,105,103")(key) // b"config"
}

/// The built-in example rule set.
pub fn builtin() -> Vec<Rule> {
    vec![CONFIG]
}
