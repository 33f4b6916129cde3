//! The normalized log record produced by the consumer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::destination::Destination;
use crate::error::Result;

/// Header names promoted into dedicated record fields. Matching is case-sensitive.
pub mod header {
    pub const CORRELATION_ID: &str = "CorrelationId";
    pub const LOG_LEVEL: &str = "LogLevel";
    pub const SOURCE: &str = "Source";
}

/// A single consumed message, normalized for storage.
///
/// Records are built once by a message source and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub topic: String,
    pub payload: String,
    /// Assigned when the message was consumed, not when it was produced.
    pub received_at: DateTime<Utc>,
    pub correlation_id: Option<String>,
    pub log_level: Option<String>,
    pub source: Option<String>,
    /// Every decoded header, including the promoted ones.
    pub headers: HashMap<String, String>,
}

impl LogRecord {
    /// Builds a record, promoting well-known headers into named fields.
    pub fn new(
        topic: impl Into<String>,
        payload: impl Into<String>,
        received_at: DateTime<Utc>,
        headers: HashMap<String, String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            received_at,
            correlation_id: headers.get(header::CORRELATION_ID).cloned(),
            log_level: headers.get(header::LOG_LEVEL).cloned(),
            source: headers.get(header::SOURCE).cloned(),
            headers,
        }
    }

    /// A record is storable only when it has both a topic and a payload.
    pub fn is_valid(&self) -> bool {
        !self.topic.is_empty() && !self.payload.is_empty()
    }

    pub fn destination(&self) -> Destination {
        Destination::for_topic(&self.topic)
    }

    /// Headers as a JSON object string, the form they are stored in.
    pub fn headers_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.headers)?)
    }
}
