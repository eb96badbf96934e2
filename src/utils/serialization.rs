// src/utils/serialization.rs
//! Serialization helpers for device payloads.
//!
//! Provides:
//! - A JSON decode wrapper used by the device client
//! - A lenient size decoder for `file_size`, which the device reports either
//!   as a number or as a decimal string
//! - `encodeURIComponent`-style escaping for path segments

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{de::DeserializeOwned, Deserialize, Deserializer};

/// Deserializes a value from raw JSON bytes.
///
/// # Arguments
/// * `data` - response body as received from the device
pub fn deserialize<T: DeserializeOwned>(data: &[u8]) -> Result<T, serde_json::Error> {
    serde_json::from_slice(data)
}

/// Accepts `123`, `"123"` or a missing/null value.
pub fn lenient_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Number(u64),
        Text(String),
    }

    match Option::<Size>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Size::Number(n)) => Ok(Some(n)),
        Some(Size::Text(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Characters `encodeURIComponent` leaves alone: ASCII alphanumerics and
/// `-_.!~*'()`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encodes `input` the way `encodeURIComponent` does, escaping UTF-8
/// bytes.
pub fn encode_uri_component(input: &str) -> String {
    utf8_percent_encode(input, URI_COMPONENT).to_string()
}
