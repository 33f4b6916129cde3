//! Kafka consumer configuration.

use consumer_core::destination::topic;
use consumer_core::{Error, Result};
use rdkafka::ClientConfig;
use serde::{Deserialize, Serialize};

/// Where a new consumer group starts reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OffsetReset {
    #[default]
    #[serde(alias = "earliest")]
    Earliest,
    #[serde(alias = "latest")]
    Latest,
}

impl OffsetReset {
    /// Value for librdkafka's `auto.offset.reset`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Earliest => "earliest",
            Self::Latest => "latest",
        }
    }
}

/// Kafka consumer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    /// Broker addresses
    pub brokers: Vec<String>,
    #[serde(default = "default_request_logs_topic")]
    pub request_logs_topic: String,
    #[serde(default = "default_error_logs_topic")]
    pub error_logs_topic: String,
    #[serde(default = "default_event_logs_topic")]
    pub event_logs_topic: String,
    /// Consumer group shared by all topic subscriptions
    #[serde(default = "default_group_id")]
    pub group_id: String,
    #[serde(default)]
    pub auto_offset_reset: OffsetReset,
    /// When false, every consumed message is committed synchronously
    #[serde(default)]
    pub enable_auto_commit: bool,
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u32,
    #[serde(default = "default_max_poll_interval_ms")]
    pub max_poll_interval_ms: u32,
}

fn default_request_logs_topic() -> String {
    topic::REQUEST_LOGS.to_string()
}

fn default_error_logs_topic() -> String {
    topic::ERROR_LOGS.to_string()
}

fn default_event_logs_topic() -> String {
    topic::EVENT_LOGS.to_string()
}

fn default_group_id() -> String {
    "log-consumer".to_string()
}

fn default_session_timeout_ms() -> u32 {
    10_000
}

fn default_max_poll_interval_ms() -> u32 {
    300_000
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            request_logs_topic: default_request_logs_topic(),
            error_logs_topic: default_error_logs_topic(),
            event_logs_topic: default_event_logs_topic(),
            group_id: default_group_id(),
            auto_offset_reset: OffsetReset::default(),
            enable_auto_commit: false,
            session_timeout_ms: default_session_timeout_ms(),
            max_poll_interval_ms: default_max_poll_interval_ms(),
        }
    }
}

impl KafkaConfig {
    /// Returns the broker list as a comma-separated string.
    pub fn broker_string(&self) -> String {
        self.brokers.join(",")
    }

    /// Subscribed topics in polling order.
    pub fn topics(&self) -> [&str; 3] {
        [
            self.request_logs_topic.as_str(),
            self.error_logs_topic.as_str(),
            self.event_logs_topic.as_str(),
        ]
    }

    pub fn validate(&self) -> Result<()> {
        if self.brokers.iter().all(|b| b.trim().is_empty()) {
            return Err(Error::config("kafka.brokers must list at least one broker"));
        }
        if self.group_id.trim().is_empty() {
            return Err(Error::config("kafka.group_id must not be empty"));
        }
        if let Some(empty) = self.topics().iter().position(|t| t.trim().is_empty()) {
            return Err(Error::config(format!("kafka topic #{} is empty", empty + 1)));
        }
        if self.max_poll_interval_ms < self.session_timeout_ms {
            return Err(Error::config(format!(
                "kafka.max_poll_interval_ms ({}) must be >= kafka.session_timeout_ms ({})",
                self.max_poll_interval_ms, self.session_timeout_ms
            )));
        }
        Ok(())
    }

    /// librdkafka client settings shared by every topic consumer.
    pub fn client_config(&self) -> ClientConfig {
        let mut client = ClientConfig::new();
        client
            .set("bootstrap.servers", self.broker_string())
            .set("group.id", &self.group_id)
            .set("auto.offset.reset", self.auto_offset_reset.as_str())
            .set("enable.auto.commit", self.enable_auto_commit.to_string())
            .set("session.timeout.ms", self.session_timeout_ms.to_string())
            .set("max.poll.interval.ms", self.max_poll_interval_ms.to_string())
            .set("enable.partition.eof", "false");
        client
    }
}
