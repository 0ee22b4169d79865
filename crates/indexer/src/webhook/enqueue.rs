use common::config::WebhookDefinition;
use db::{pending_webhook, ActiveValue, DatabaseConnection, DbErr, EntityTrait};

use super::{subscription::Subscription, PreviousValueLookup};
use crate::ingest::record::ParsedEvent;

/// Enqueue a [`pending_webhook::Model`] for every `(event, definition)` pair
/// whose subscription matches, skipping matches whose value or endpoint
/// resolution comes back empty.
pub async fn enqueue(
    db: &DatabaseConnection,
    event_ids: &[(ParsedEvent, i64)],
    batch: &[ParsedEvent],
    definitions: &[WebhookDefinition],
    registry: &std::collections::HashMap<&'static str, Box<dyn Subscription>>,
) -> Result<usize, DbErr> {
    let lookup = PreviousValueLookup::new(batch, db);
    let mut enqueued = 0;

    for (event, event_id) in event_ids {
        for definition in definitions {
            let Some(subscription) = registry.get(definition.name.as_str()) else {
                tracing::warn!(name = %definition.name, "no subscription registered for webhook");
                continue;
            };

            if !subscription.filter(event) {
                continue;
            }

            let Some(value) = subscription.get_value(event, &lookup).await else {
                continue;
            };

            let Ok(endpoint) = serde_json::to_value(&definition.endpoint) else {
                continue;
            };

            let model = pending_webhook::ActiveModel {
                id: ActiveValue::NotSet,
                event_id: ActiveValue::Set(*event_id),
                endpoint: ActiveValue::Set(endpoint),
                value: ActiveValue::Set(value),
                failures: ActiveValue::Set(0),
                last_attempted_at: ActiveValue::Set(None),
            };
            pending_webhook::Entity::insert(model).exec(db).await?;
            enqueued += 1;
        }
    }

    Ok(enqueued)
}
