//! Turning raw broker messages into log records.
//!
//! Decoding never fails. Bad bytes are logged and replaced, missing values are
//! skipped, and whatever survives ends up in the record.
//!
//! NUL characters are valid UTF-8 but cannot be stored in a PostgreSQL text
//! column, so they are stripped here rather than failing the whole batch later.

use chrono::{DateTime, Utc};
use consumer_core::LogRecord;
use std::collections::HashMap;
use telemetry::metrics;
use tracing::warn;

/// Decodes message headers into a string map.
///
/// A header without a value is skipped. A value that is not UTF-8 is kept in
/// lossily decoded form, and NUL characters are removed. Later duplicates
/// overwrite earlier ones.
pub fn decode_headers<'a, I>(topic: &str, headers: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (&'a str, Option<&'a [u8]>)>,
{
    let mut decoded = HashMap::new();

    for (key, value) in headers {
        let Some(bytes) = value else {
            metrics().header_decode_warnings.inc();
            warn!(topic, header = key, "Header has no value, skipping");
            continue;
        };

        let value = match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            Err(e) => {
                metrics().header_decode_warnings.inc();
                warn!(topic, header = key, error = %e, "Header is not valid UTF-8, keeping lossy value");
                String::from_utf8_lossy(bytes).into_owned()
            }
        };

        let value = match strip_nul(&value) {
            Some(stripped) => {
                metrics().header_decode_warnings.inc();
                warn!(topic, header = key, "Header contains NUL characters, removing them");
                stripped
            }
            None => value,
        };

        decoded.insert(key.to_string(), value);
    }

    decoded
}

/// Decodes a message body. A missing body becomes an empty string.
pub fn decode_payload(topic: &str, payload: Option<&[u8]>) -> String {
    let Some(bytes) = payload else {
        return String::new();
    };

    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(e) => {
            metrics().payload_decode_warnings.inc();
            warn!(topic, error = %e, "Payload is not valid UTF-8, keeping lossy value");
            String::from_utf8_lossy(bytes).into_owned()
        }
    };

    match strip_nul(&text) {
        Some(stripped) => {
            metrics().payload_decode_warnings.inc();
            warn!(
                topic,
                removed = text.len() - stripped.len(),
                "Payload contains NUL characters, removing them"
            );
            stripped
        }
        None => text,
    }
}

/// Returns `text` without NUL characters, or `None` if it has none.
pub fn strip_nul(text: &str) -> Option<String> {
    if text.contains('\0') {
        Some(text.replace('\0', ""))
    } else {
        None
    }
}

/// Builds a record from the parts of a consumed message.
pub fn decode_message<'a, I>(
    topic: &str,
    payload: Option<&[u8]>,
    headers: I,
    received_at: DateTime<Utc>,
) -> LogRecord
where
    I: IntoIterator<Item = (&'a str, Option<&'a [u8]>)>,
{
    LogRecord::new(
        topic,
        decode_payload(topic, payload),
        received_at,
        decode_headers(topic, headers),
    )
}
