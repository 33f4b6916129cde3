//! Storage destinations and topic routing.

use serde::{Deserialize, Serialize};

/// Well-known topic names that route to a dedicated destination.
pub mod topic {
    pub const REQUEST_LOGS: &str = "request-logs";
    pub const ERROR_LOGS: &str = "error-logs";
    pub const EVENT_LOGS: &str = "event-logs";
}

/// One of the three tables a record can land in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Request,
    Error,
    Event,
}

impl Destination {
    /// All destinations, in schema creation order.
    pub const ALL: [Destination; 3] = [Self::Request, Self::Error, Self::Event];

    /// Routes a topic name to its destination.
    ///
    /// Matching is exact. Unknown topics fall back to [`Destination::Request`].
    pub fn for_topic(topic: &str) -> Self {
        match topic {
            topic::REQUEST_LOGS => Self::Request,
            topic::ERROR_LOGS => Self::Error,
            topic::EVENT_LOGS => Self::Event,
            _ => Self::Request,
        }
    }

    /// Table backing this destination.
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Request => "request_logs",
            Self::Error => "error_logs",
            Self::Event => "event_logs",
        }
    }
}
