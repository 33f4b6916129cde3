//! Per-topic Kafka message sources.

use async_trait::async_trait;
use consumer_core::{Error, LogRecord, ReceiveClock, Result};
use rdkafka::client::ClientContext;
use rdkafka::consumer::{CommitMode, Consumer, ConsumerContext, StreamConsumer};
use rdkafka::error::{KafkaError, KafkaResult};
use rdkafka::message::{BorrowedMessage, Headers, Message};
use std::sync::Arc;
use std::time::Duration;
use telemetry::metrics;
use tracing::{debug, error, info, warn};

use crate::config::KafkaConfig;
use crate::decode::decode_message;

/// A subscription that yields at most one record per poll.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Topic this source is subscribed to.
    fn topic(&self) -> &str;

    /// Waits up to `timeout` for the next record.
    ///
    /// `None` means nothing usable arrived: a timeout, the end of a partition,
    /// or a consume error that has already been logged.
    async fn poll(&self, timeout: Duration) -> Option<LogRecord>;
}

/// Client context that tags librdkafka errors with the topic they belong to.
pub struct TopicContext {
    topic: String,
}

impl TopicContext {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
        }
    }
}

impl ClientContext for TopicContext {
    fn error(&self, error: KafkaError, reason: &str) {
        error!(topic = %self.topic, error = %error, reason, "Kafka client error");
    }
}

impl ConsumerContext for TopicContext {}

/// Message source backed by one librdkafka consumer.
pub struct KafkaMessageSource {
    topic: String,
    consumer: StreamConsumer<TopicContext>,
    auto_commit: bool,
    clock: Arc<ReceiveClock>,
}

impl KafkaMessageSource {
    /// Creates a consumer in the configured group and subscribes it to `topic`.
    pub fn new(config: &KafkaConfig, topic: &str, clock: Arc<ReceiveClock>) -> Result<Self> {
        let consumer: StreamConsumer<TopicContext> = config
            .client_config()
            .create_with_context(TopicContext::new(topic))
            .map_err(|e| Error::broker(format!("Failed to create consumer for {topic}: {e}")))?;

        consumer
            .subscribe(&[topic])
            .map_err(|e| Error::broker(format!("Failed to subscribe to {topic}: {e}")))?;

        info!(
            topic,
            group_id = %config.group_id,
            auto_commit = config.enable_auto_commit,
            "Consumer subscribed"
        );

        Ok(Self {
            topic: topic.to_string(),
            consumer,
            auto_commit: config.enable_auto_commit,
            clock,
        })
    }

    /// One source per configured topic, in polling order.
    pub fn for_all_topics(config: &KafkaConfig, clock: Arc<ReceiveClock>) -> Result<Vec<Self>> {
        config
            .topics()
            .into_iter()
            .map(|topic| Self::new(config, topic, clock.clone()))
            .collect()
    }

    /// Leaves the consumer group. Safe to call more than once.
    pub fn close(&self) {
        self.consumer.unsubscribe();
        info!(topic = %self.topic, "Consumer unsubscribed");
    }

    fn to_record(&self, message: &BorrowedMessage<'_>) -> LogRecord {
        let headers = message
            .headers()
            .map(|headers| {
                headers
                    .iter()
                    .map(|h| (h.key, h.value))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        decode_message(message.topic(), message.payload(), headers, self.clock.now())
    }
}

/// Result of handling one consumed message's offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// librdkafka commits in the background
    Automatic,
    Committed,
    Failed,
}

/// Commits the offset of a consumed message when auto-commit is off.
///
/// A failed commit is logged and counted. It never drops the record; the
/// message may only be redelivered after a restart.
pub fn commit_consumed<F>(
    topic: &str,
    auto_commit: bool,
    partition: i32,
    offset: i64,
    commit: F,
) -> CommitOutcome
where
    F: FnOnce() -> KafkaResult<()>,
{
    if auto_commit {
        return CommitOutcome::Automatic;
    }

    match commit() {
        Ok(()) => {
            metrics().offset_commits.inc();
            debug!(topic, partition, offset, "Committed offset");
            CommitOutcome::Committed
        }
        Err(e) => {
            metrics().commit_errors.inc();
            warn!(topic, partition, offset, error = %e, "Failed to commit offset");
            CommitOutcome::Failed
        }
    }
}

/// Unwraps one receive result.
///
/// End of partition is quiet. Any other error is logged and counted, and like
/// end of partition yields `None`.
pub fn received<M>(topic: &str, result: KafkaResult<M>) -> Option<M> {
    match result {
        Ok(message) => Some(message),
        Err(KafkaError::PartitionEOF(partition)) => {
            debug!(topic, partition, "Reached end of partition");
            None
        }
        Err(e) => {
            metrics().consume_errors.inc();
            error!(topic, error = %e, "Failed to consume message");
            None
        }
    }
}

#[async_trait]
impl MessageSource for KafkaMessageSource {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn poll(&self, timeout: Duration) -> Option<LogRecord> {
        let result = tokio::time::timeout(timeout, self.consumer.recv()).await.ok()?;
        let message = received(&self.topic, result)?;

        let record = self.to_record(&message);
        metrics().messages_consumed.inc();

        info!(
            topic = message.topic(),
            partition = message.partition(),
            offset = message.offset(),
            "Consumed message"
        );

        commit_consumed(
            &self.topic,
            self.auto_commit,
            message.partition(),
            message.offset(),
            || self.consumer.commit_message(&message, CommitMode::Sync),
        );

        Some(record)
    }
}
