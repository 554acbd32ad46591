//! Binary field encoding.
//!
//! The agent runtime serializes binary fields as URL-safe base64, possibly
//! without padding. Everything downstream of the transport expects standard
//! base64, so inbound payloads are canonicalized once, here.

// ============================================================================
// Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serializer};
use serde_json::Value;

use crate::error::Result;

// ============================================================================
// Constants
// ============================================================================

/// Object keys whose `data` member carries base64 bytes.
const BINARY_CONTAINERS: [&str; 3] = ["inline_data", "inlineData", "blob"];

// ============================================================================
// Normalization
// ============================================================================

/// Converts a URL-safe base64 string to standard base64.
///
/// Replaces `-` with `+` and `_` with `/`, then right-pads with `=` to a
/// multiple of 4. Input that is already padded comes back unchanged.
///
/// # Example
///
/// ```
/// use agent_live::protocol::url_safe_to_standard;
///
/// assert_eq!(url_safe_to_standard("abc"), "abc=");
/// assert_eq!(url_safe_to_standard("abcd"), "abcd");
/// assert_eq!(url_safe_to_standard("a-b_c"), "a+b/c===");
/// ```
#[must_use]
pub fn url_safe_to_standard(input: &str) -> String {
    let mut out: String = input
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();

    let remainder = out.len() % 4;
    if remainder != 0 {
        out.extend(std::iter::repeat_n('=', 4 - remainder));
    }
    out
}

/// Canonicalizes every binary field of an inbound JSON payload in place.
///
/// Walks the whole value; any `data` string under an `inline_data`,
/// `inlineData` or `blob` object is rewritten with [`url_safe_to_standard`].
/// Returns `true` if anything changed.
pub fn normalize_binary_fields(value: &mut Value) -> bool {
    match value {
        Value::Object(map) => {
            let mut changed = false;
            for (key, child) in map.iter_mut() {
                if BINARY_CONTAINERS.contains(&key.as_str())
                    && let Some(Value::String(data)) = child.get_mut("data")
                {
                    let normalized = url_safe_to_standard(data);
                    if normalized != *data {
                        *data = normalized;
                        changed = true;
                    }
                }
                changed |= normalize_binary_fields(child);
            }
            changed
        }
        Value::Array(items) => items
            .iter_mut()
            .fold(false, |changed, item| normalize_binary_fields(item) | changed),
        _ => false,
    }
}

/// Canonicalizes a raw inbound payload.
///
/// Non-JSON payloads are passed through untouched; parsing them is the
/// consumer's concern.
#[must_use]
pub fn normalize_payload(payload: &str) -> String {
    match serde_json::from_str::<Value>(payload) {
        Ok(mut value) => {
            if normalize_binary_fields(&mut value) {
                value.to_string()
            } else {
                payload.to_owned()
            }
        }
        Err(_) => payload.to_owned(),
    }
}

/// Decodes standard base64 into bytes.
///
/// # Errors
///
/// Returns [`Error::Base64`](crate::Error::Base64) on malformed input.
pub fn decode_standard(data: &str) -> Result<Vec<u8>> {
    Ok(STANDARD.decode(data)?)
}

// ============================================================================
// Serde Helpers
// ============================================================================

/// Serializes bytes as standard base64.
pub(crate) fn serialize_base64<S>(bytes: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&STANDARD.encode(bytes))
}

/// Deserializes standard or URL-safe base64 into bytes.
pub(crate) fn deserialize_base64<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    STANDARD
        .decode(url_safe_to_standard(&raw))
        .map_err(serde::de::Error::custom)
}

// ============================================================================
// Tests
// ============================================================================
