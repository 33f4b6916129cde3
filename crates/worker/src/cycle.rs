//! One polling pass over every subscribed topic.

use consumer_core::LogRecord;
use kafka_source::MessageSource;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use telemetry::metrics;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Polls each source once, in order, and collects what arrived.
pub struct ConsumptionCycle {
    sources: Vec<Arc<dyn MessageSource>>,
    poll_timeout: Duration,
}

impl ConsumptionCycle {
    /// `sources` must already be in polling order.
    pub fn new(sources: Vec<Arc<dyn MessageSource>>, poll_timeout: Duration) -> Self {
        Self {
            sources,
            poll_timeout,
        }
    }

    pub fn sources(&self) -> &[Arc<dyn MessageSource>] {
        &self.sources
    }

    pub fn poll_timeout(&self) -> Duration {
        self.poll_timeout
    }

    /// Runs one pass and returns the batch, possibly empty.
    ///
    /// Cancellation is checked before each poll. Once it fires the remaining
    /// sources are skipped and whatever was already collected is returned,
    /// since those offsets are committed and the records must not be lost.
    pub async fn run(&self, cancel: &CancellationToken) -> Vec<LogRecord> {
        let mut batch = Vec::new();

        for (polled, source) in self.sources.iter().enumerate() {
            if cancel.is_cancelled() {
                debug!(
                    skipped = self.sources.len() - polled,
                    collected = batch.len(),
                    "Cycle cancelled"
                );
                break;
            }

            let Some(record) = source.poll(self.poll_timeout).await else {
                continue;
            };

            if !record.is_valid() {
                warn!(topic = %source.topic(), "Dropping record with empty topic or payload");
                metrics().invalid_records_dropped.inc();
                continue;
            }

            debug!(topic = %record.topic, "Received message");
            batch.push(record);
        }

        batch
    }
}

/// Record counts per topic, ordered by topic name.
pub fn topic_breakdown(batch: &[LogRecord]) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for record in batch {
        *counts.entry(record.topic.as_str()).or_insert(0) += 1;
    }
    counts
}
