//! Storage key canonicalization.
//!
//! The chain stream encodes composite storage keys as base64 of the raw key
//! bytes. The store's canonical form is a comma-separated decimal byte list,
//! which sorts and matches stably without re-decoding base64 on every
//! comparison. Both directions are pure functions and form a round-trip
//! pair: `base64_key_to_event_key(eventKeyToBase64(k)) == k` for any byte
//! string `k`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use derive_more::{Display, Error, From};

/// A key failed to decode as base64, or a canonical key failed to parse
/// back into bytes.
#[derive(Debug, Display, Error, From)]
pub enum KeyError {
    Base64(base64::DecodeError),
    Segment(std::num::ParseIntError),
}

/// Decode a base64-encoded storage key into its canonical
/// comma-separated-decimal-byte form.
pub fn base64_key_to_event_key(key: &str) -> Result<String, KeyError> {
    let bytes = STANDARD.decode(key)?;
    Ok(bytes_to_event_key(&bytes))
}

/// Render raw key bytes in canonical form.
pub fn bytes_to_event_key(bytes: &[u8]) -> String {
    bytes.iter().map(u8::to_string).collect::<Vec<_>>().join(",")
}

/// Encode a canonical event key back to base64.
///
/// Inverse of [`base64_key_to_event_key`].
pub fn event_key_to_base64(key: &str) -> Result<String, KeyError> {
    let bytes = event_key_to_bytes(key)?;
    Ok(STANDARD.encode(bytes))
}

/// Parse a canonical event key back into raw bytes.
pub fn event_key_to_bytes(key: &str) -> Result<Vec<u8>, KeyError> {
    if key.is_empty() {
        return Ok(Vec::new());
    }

    key.split(',').map(|segment| segment.parse().map_err(KeyError::from)).collect()
}

/// Whether `key` falls under `prefix` in canonical form.
///
/// Canonical keys are comma-joined decimal bytes, so a naive
/// [`str::starts_with`] would wrongly match `"1,23"` against prefix `"1,2"`.
/// Matching is done on the decoded segment lists instead.
pub fn key_has_prefix(key: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }

    let mut key_segments = key.split(',');

    for prefix_segment in prefix.split(',') {
        match key_segments.next() {
            Some(key_segment) if key_segment == prefix_segment => continue,
            _ => return false,
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_base64() {
        let bytes = vec![0u8, 1, 2, 254, 255, 42];
        let base64 = STANDARD.encode(&bytes);

        let event_key = base64_key_to_event_key(&base64).unwrap();
        assert_eq!(event_key, "0,1,2,254,255,42");

        let round_tripped = event_key_to_base64(&event_key).unwrap();
        assert_eq!(round_tripped, base64);
    }

    #[test]
    fn round_trips_empty_key() {
        let base64 = STANDARD.encode([]);
        let event_key = base64_key_to_event_key(&base64).unwrap();
        assert_eq!(event_key, "");
        assert_eq!(event_key_to_base64(&event_key).unwrap(), base64);
    }

    #[test]
    fn prefix_matching_is_segment_aware() {
        assert!(key_has_prefix("1,2,3", "1,2"));
        assert!(key_has_prefix("1,2,3", ""));
        assert!(!key_has_prefix("1,23", "1,2"));
        assert!(!key_has_prefix("1,2", "1,2,3"));
    }

    #[test]
    fn rejects_invalid_encoding() {
        assert!(base64_key_to_event_key("not base64!!").is_err());
        assert!(event_key_to_bytes("1,not-a-byte,3").is_err());
    }
}
