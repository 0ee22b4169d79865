//! Built-in subscription implementations.
//!
//! A subscription's endpoint is not part of the implementation: it is
//! supplied per-deployment by a [`common::config::WebhookDefinition`] that
//! names which subscription to evaluate and where matches should be
//! delivered.

use std::collections::HashMap;

use async_trait::async_trait;

use super::PreviousValueLookup;
use crate::{ingest::record::ParsedEvent, key::bytes_to_event_key};

/// `{ filter(event) -> bool, getValue(event, getPrevious) -> any }`.
#[async_trait]
pub trait Subscription: Send + Sync {
    /// Name this subscription is registered under, matched against
    /// [`common::config::WebhookDefinition::name`].
    fn name(&self) -> &'static str;

    /// Whether `event` is of interest to this subscription.
    fn filter(&self, event: &ParsedEvent) -> bool;

    /// Resolve the value to deliver for a matched event, or `None` to skip
    /// this match.
    async fn get_value(
        &self,
        event: &ParsedEvent,
        previous: &PreviousValueLookup<'_>,
    ) -> Option<serde_json::Value>;
}

/// Fires whenever a key under the `balance:` namespace changes, delivering
/// `{ from, to }`.
///
/// Illustrates the end-to-end shape from the design notes: a before/after
/// diff computed via [`PreviousValueLookup`].
pub struct BalanceChanged;

#[async_trait]
impl Subscription for BalanceChanged {
    fn name(&self) -> &'static str {
        "balance_changed"
    }

    fn filter(&self, event: &ParsedEvent) -> bool {
        crate::key::key_has_prefix(&event.key, &bytes_to_event_key(b"balance:"))
    }

    async fn get_value(
        &self,
        event: &ParsedEvent,
        previous: &PreviousValueLookup<'_>,
    ) -> Option<serde_json::Value> {
        let from = previous.get_previous(event).await.ok().flatten();
        let to = current_value(event);
        Some(serde_json::json!({ "from": from, "to": to }))
    }
}

fn current_value(event: &ParsedEvent) -> Option<serde_json::Value> {
    if event.delete {
        return None;
    }
    Some(
        event
            .value_json
            .clone()
            .unwrap_or_else(|| serde_json::Value::String(event.value.clone().unwrap_or_default())),
    )
}

/// Build the built-in subscription registry.
pub fn builtin() -> HashMap<&'static str, Box<dyn Subscription>> {
    let mut registry: HashMap<&'static str, Box<dyn Subscription>> = HashMap::new();
    registry.insert(BalanceChanged.name(), Box::new(BalanceChanged));
    registry
}
