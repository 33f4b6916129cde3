//! Mock implementations for testing.

use async_trait::async_trait;
use chrono::Utc;
use consumer_core::{ensure_not_empty, DbErrorCode, Error, LogRecord, Result};
use kafka_source::MessageSource;
use parking_lot::Mutex;
use postgres_sink::LogSink;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Mock source that serves records from memory.
///
/// This implements the same `MessageSource` trait as `KafkaMessageSource`,
/// so the real cycle and worker run against it without a broker.
pub struct MockSource {
    topic: String,
    queue: Mutex<VecDeque<LogRecord>>,
    /// Payload served on every poll once the queue is drained.
    repeat: Option<String>,
    /// Idle polls wait out their timeout, like a real consumer.
    wait_when_idle: bool,
    polls: AtomicUsize,
    timeouts: Mutex<Vec<Duration>>,
}

impl MockSource {
    /// Source that returns nothing unless records are pushed.
    pub fn new(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            queue: Mutex::new(VecDeque::new()),
            repeat: None,
            wait_when_idle: false,
            polls: AtomicUsize::new(0),
            timeouts: Mutex::new(Vec::new()),
        }
    }

    /// Source whose idle polls block for the whole timeout.
    pub fn idle(topic: &str) -> Self {
        Self {
            wait_when_idle: true,
            ..Self::new(topic)
        }
    }

    /// Source that yields a record on every poll.
    pub fn repeating(topic: &str, payload: &str) -> Self {
        Self {
            repeat: Some(payload.to_string()),
            ..Self::new(topic)
        }
    }

    /// Source preloaded with `records`, served one per poll.
    pub fn with_records(topic: &str, records: Vec<LogRecord>) -> Self {
        let source = Self::new(topic);
        source.queue.lock().extend(records);
        source
    }

    pub fn push(&self, record: LogRecord) {
        self.queue.lock().push_back(record);
    }

    /// Number of times `poll` was called.
    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    /// Timeouts passed to each poll, in call order.
    pub fn timeouts(&self) -> Vec<Duration> {
        self.timeouts.lock().clone()
    }

    /// Records not yet served.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}

#[async_trait]
impl MessageSource for MockSource {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn poll(&self, timeout: Duration) -> Option<LogRecord> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.timeouts.lock().push(timeout);

        if let Some(record) = self.queue.lock().pop_front() {
            return Some(record);
        }

        if let Some(payload) = &self.repeat {
            return Some(LogRecord::new(
                self.topic.clone(),
                payload.clone(),
                Utc::now(),
                HashMap::new(),
            ));
        }

        if self.wait_when_idle {
            tokio::time::sleep(timeout).await;
        }
        None
    }
}

#[derive(Default)]
struct SinkState {
    saved: Vec<LogRecord>,
    save_attempts: Vec<Instant>,
    batch_sizes: Vec<usize>,
    initialize_calls: usize,
    fail_initialize: bool,
    fail_next_saves: usize,
}

/// Mock sink that captures batches in memory.
///
/// Failures are injected per call. `total_count` reports what was captured.
#[derive(Clone, Default)]
pub struct MockSink {
    state: Arc<Mutex<SinkState>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `initialize` fail.
    pub fn fail_initialize(&self) {
        self.state.lock().fail_initialize = true;
    }

    /// Make the next `n` saves fail.
    pub fn fail_next_saves(&self, n: usize) {
        self.state.lock().fail_next_saves = n;
    }

    /// All records saved successfully.
    pub fn saved_records(&self) -> Vec<LogRecord> {
        self.state.lock().saved.clone()
    }

    /// Sizes of the batches passed to `save`, including failed ones.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.state.lock().batch_sizes.clone()
    }

    /// When each save was attempted, on tokio's clock.
    pub fn save_attempts(&self) -> Vec<Instant> {
        self.state.lock().save_attempts.clone()
    }

    pub fn save_count(&self) -> usize {
        self.state.lock().save_attempts.len()
    }

    pub fn initialize_calls(&self) -> usize {
        self.state.lock().initialize_calls
    }
}

#[async_trait]
impl LogSink for MockSink {
    async fn initialize(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.initialize_calls += 1;
        if state.fail_initialize {
            return Err(Error::database(
                DbErrorCode::SchemaFailed,
                "Mock schema failure",
            ));
        }
        Ok(())
    }

    async fn save(&self, records: &[LogRecord]) -> Result<usize> {
        let mut state = self.state.lock();
        state.save_attempts.push(Instant::now());
        state.batch_sizes.push(records.len());

        ensure_not_empty(records, "records")?;

        if state.fail_next_saves > 0 {
            state.fail_next_saves -= 1;
            return Err(Error::database(
                DbErrorCode::WriteFailed,
                "Mock write failure",
            ));
        }

        state.saved.extend_from_slice(records);
        Ok(records.len())
    }

    async fn total_count(&self) -> u64 {
        self.state.lock().saved.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_source_serves_queue_then_nothing() {
        let source = MockSource::new("request-logs");
        source.push(LogRecord::new("request-logs", "a", Utc::now(), HashMap::new()));

        assert!(source.poll(Duration::from_millis(5)).await.is_some());
        assert!(source.poll(Duration::from_millis(5)).await.is_none());
        assert_eq!(source.poll_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_sink_failure_injection() {
        let sink = MockSink::new();
        sink.fail_next_saves(1);
        let batch = vec![LogRecord::new("error-logs", "x", Utc::now(), HashMap::new())];

        assert!(sink.save(&batch).await.is_err());
        assert_eq!(sink.save(&batch).await.unwrap(), 1);
        assert_eq!(sink.total_count().await, 1);
        assert_eq!(sink.save_count(), 2);
    }
}
