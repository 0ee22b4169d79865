//! `fire()` and the bounded-concurrency drain loop.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use common::config::{Soketi, WebhookEndpointConfig};
use db::{pending_webhook, ActiveValue, DatabaseConnection, DbErr, EntityTrait};
use derive_more::{Display, Error, From};
use futures_util::stream::{FuturesUnordered, StreamExt};
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// A failed delivery attempt. The row is retained with `failures`
/// incremented; the caller's drain loop decides whether and when to retry.
#[derive(Debug, Display, Error, From)]
pub enum DeliveryError {
    Http(reqwest::Error),
    Db(DbErr),
    #[display(fmt = "webhook endpoint is not valid JSON")]
    MalformedEndpoint,
    #[display(fmt = "unknown webhook endpoint type")]
    UnknownEndpointType,
}

/// Deliver a single [`pending_webhook::Model`], returning `Ok(())` on
/// success. Every endpoint variant terminates in exactly one of success or
/// [`DeliveryError`] — an unknown type fails permanently rather than
/// silently falling through.
pub async fn fire(http: &reqwest::Client, soketi: Option<&Soketi>, row: &pending_webhook::Model) -> Result<(), DeliveryError> {
    let endpoint: WebhookEndpointConfig =
        serde_json::from_value(row.endpoint.clone()).map_err(|_| DeliveryError::MalformedEndpoint)?;

    match endpoint {
        WebhookEndpointConfig::Url { method, url, headers } => {
            let method: reqwest::Method = method.parse().unwrap_or(reqwest::Method::POST);
            let mut request = http
                .request(method, url)
                .header("Accept-Encoding", "gzip,deflate,compress");
            for (name, value) in &headers {
                request = request.header(name, value);
            }
            request.json(&row.value).send().await?.error_for_status()?;
            Ok(())
        }
        WebhookEndpointConfig::Soketi { channel, event } => {
            let soketi = soketi.ok_or(DeliveryError::UnknownEndpointType)?;
            deliver_soketi(http, soketi, &channel, &event, &row.value).await
        }
    }
}

async fn deliver_soketi(
    http: &reqwest::Client,
    soketi: &Soketi,
    channel: &str,
    event: &str,
    value: &serde_json::Value,
) -> Result<(), DeliveryError> {
    let body = serde_json::json!({
        "name": event,
        "channel": channel,
        "data": value,
    });
    let body = serde_json::to_vec(&body).map_err(|_| DeliveryError::MalformedEndpoint)?;

    let mut mac = Hmac::<Sha256>::new_from_slice(soketi.secret.as_bytes())
        .expect("hmac accepts a key of any length");
    mac.update(&body);
    let signature = hex::encode(mac.finalize().into_bytes());

    let scheme = if soketi.use_tls { "https" } else { "http" };
    let url = format!("{scheme}://{}/apps/{}/events", soketi.host, soketi.app_id);

    http.post(url)
        .header("X-Soketi-Key", &soketi.key)
        .header("X-Soketi-Signature", signature)
        .header("Content-Type", "application/json")
        .body(body)
        .send()
        .await?
        .error_for_status()?;

    Ok(())
}

/// Current unix-millisecond timestamp.
fn now_unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Backoff window for a row that has already failed `failures` times,
/// `2^failures` seconds capped at `2^10`.
fn backoff(failures: i32) -> Duration {
    Duration::from_secs(1 << failures.min(10))
}

/// Whether `row` is still inside its backoff window and should be skipped
/// rather than retried on this drain.
fn still_backing_off(row: &pending_webhook::Model, now_ms: i64) -> bool {
    let Some(last_attempted_at) = row.last_attempted_at else {
        return false;
    };

    if row.failures <= 0 {
        return false;
    }

    let elapsed = Duration::from_millis((now_ms - last_attempted_at).max(0) as u64);
    elapsed < backoff(row.failures)
}

/// Drain every pending webhook with bounded concurrency, skipping (not
/// sleeping on) rows still inside their `2^failures`-second backoff window
/// since `last_attempted_at`, so a single call returns promptly and is
/// idempotent to invoke repeatedly from a scheduler.
pub async fn drain(
    db: &DatabaseConnection,
    http: &reqwest::Client,
    soketi: Option<&Soketi>,
    concurrency: usize,
) -> Result<(usize, usize), DbErr> {
    let now_ms = now_unix_ms();
    let pending = pending_webhook::Entity::find().all(db).await?;
    let mut queue = pending
        .into_iter()
        .filter(|row| !still_backing_off(row, now_ms));

    let attempt = |row: pending_webhook::Model| async move {
        let result = fire(http, soketi, &row).await;
        (row, result)
    };

    let mut deliveries = FuturesUnordered::new();
    for row in queue.by_ref().take(concurrency) {
        deliveries.push(attempt(row));
    }

    let mut delivered = 0;
    let mut failed = 0;

    while let Some((row, result)) = deliveries.next().await {
        match result {
            Ok(()) => {
                pending_webhook::Entity::delete_by_id(row.id).exec(db).await?;
                delivered += 1;
            }
            Err(error) => {
                tracing::warn!(webhook_id = row.id, failures = row.failures, %error, "webhook delivery failed");
                let mut model: pending_webhook::ActiveModel = row.into();
                model.failures = ActiveValue::Set(model.failures.unwrap() + 1);
                model.last_attempted_at = ActiveValue::Set(Some(now_ms));
                pending_webhook::Entity::update(model).exec(db).await?;
                failed += 1;
            }
        }

        if let Some(next) = queue.next() {
            deliveries.push(attempt(next));
        }
    }

    Ok((delivered, failed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(failures: i32, last_attempted_at: Option<i64>) -> pending_webhook::Model {
        pending_webhook::Model {
            id: 1,
            event_id: 1,
            endpoint: serde_json::Value::Null,
            value: serde_json::Value::Null,
            failures,
            last_attempted_at,
        }
    }

    #[test]
    fn never_attempted_is_not_backing_off() {
        assert!(!still_backing_off(&row(0, None), 1_000_000));
    }

    #[test]
    fn within_backoff_window_is_skipped() {
        let failed_at = 1_000_000;
        let still_within = failed_at + backoff(1).as_millis() as i64 - 1;
        assert!(still_backing_off(&row(1, Some(failed_at)), still_within));
    }

    #[test]
    fn past_backoff_window_is_retried() {
        let failed_at = 1_000_000;
        let past_window = failed_at + backoff(1).as_millis() as i64 + 1;
        assert!(!still_backing_off(&row(1, Some(failed_at)), past_window));
    }
}
