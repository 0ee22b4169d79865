//! Wire format and normalized form of a single ingested event.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;

use crate::key::{self, KeyError};

/// One line of the event stream, as received.
///
/// Unknown fields are ignored (forward-compatible with chain node
/// additions); a missing required field fails structural validation and the
/// record is reported and skipped rather than halting ingestion.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    pub block_height: u64,
    pub block_time_unix_ms: u64,
    pub contract_address: String,
    pub code_id: u64,
    pub key: String,
    pub value: String,
    pub delete: bool,
}

/// A [`RawRecord`] after base64 decoding, JSON parsing, and key
/// canonicalization.
#[derive(Debug, Clone)]
pub struct ParsedEvent {
    pub block_height: u64,
    pub block_time_unix_ms: u64,
    pub contract_address: String,
    pub code_id: u64,
    pub key: String,
    pub value: Option<String>,
    pub value_json: Option<serde_json::Value>,
    pub delete: bool,
}

impl RawRecord {
    /// Parse `self` into a [`ParsedEvent`], decoding `value` from base64
    /// and canonicalizing `key`.
    ///
    /// A failure to parse `value` as UTF-8 JSON is silent: `value_json` is
    /// simply `None`. A failure to decode `key` or `value` as base64 is a
    /// structural error.
    pub fn parse(&self) -> Result<ParsedEvent, KeyError> {
        let key = key::base64_key_to_event_key(&self.key)?;

        let value = if self.delete {
            None
        } else {
            let raw = STANDARD.decode(&self.value)?;
            Some(String::from_utf8_lossy(&raw).into_owned())
        };

        let value_json = value
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok());

        Ok(ParsedEvent {
            block_height: self.block_height,
            block_time_unix_ms: self.block_time_unix_ms,
            contract_address: self.contract_address.clone(),
            code_id: self.code_id,
            key,
            value,
            value_json,
            delete: self.delete,
        })
    }

    /// Identity used for within-block, within-contract, within-key
    /// deduplication: keep the last record for each tuple.
    pub fn dedup_key(&self) -> (u64, String, String) {
        (self.block_height, self.contract_address.clone(), self.key.clone())
    }
}
