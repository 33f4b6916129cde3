//! Worker loop that moves log records from Kafka into the database.
//!
//! Each iteration:
//! 1. Poll every topic once (offsets are committed as messages are read)
//! 2. Save the batch, if any
//! 3. Sleep the consumption interval, or the retry backoff after a failure
//!
//! A failed save is not retried with the same records. Their offsets are
//! already committed, so the batch is lost and the next cycle moves on.

use consumer_core::{LogRecord, Result};
use postgres_sink::LogSink;
use std::sync::Arc;
use std::time::{Duration, Instant};
use telemetry::{health, metrics};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::WorkerSettings;
use crate::cycle::{topic_breakdown, ConsumptionCycle};

/// Lifecycle of the worker, published for observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Ensuring the schema before the first cycle
    Starting,
    Running,
    /// Waiting out the backoff after a failed cycle
    RetryBackoff,
    Stopped,
}

/// Totals for one run of the worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub cycles: u64,
    pub failed_cycles: u64,
    pub records_persisted: u64,
}

/// Drives consumption cycles until cancelled.
pub struct LogWorker {
    cycle: ConsumptionCycle,
    sink: Arc<dyn LogSink>,
    settings: WorkerSettings,
    state: watch::Sender<WorkerState>,
    total_processed_this_session: u64,
}

impl LogWorker {
    pub fn new(cycle: ConsumptionCycle, sink: Arc<dyn LogSink>, settings: WorkerSettings) -> Self {
        let (state, _) = watch::channel(WorkerState::Starting);
        Self {
            cycle,
            sink,
            settings,
            state,
            total_processed_this_session: 0,
        }
    }

    /// Receiver that observes state transitions.
    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Main run loop.
    ///
    /// Returns an error only if the schema cannot be initialized. Every later
    /// failure is logged and followed by the retry backoff.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<WorkerReport> {
        info!(
            sources = self.cycle.sources().len(),
            interval_secs = self.settings.consumption_interval_seconds,
            backoff_secs = self.settings.retry_backoff_seconds,
            "Log worker starting"
        );

        if let Err(e) = self.sink.initialize().await {
            health().database.mark_down(e.to_string());
            self.set_state(WorkerState::Stopped);
            return Err(e);
        }

        self.set_state(WorkerState::Running);
        let mut report = WorkerReport::default();

        while !cancel.is_cancelled() {
            let started = Instant::now();
            let batch = self.cycle.run(&cancel).await;
            report.cycles += 1;

            if batch.is_empty() {
                info!("No new messages");
                self.finish_cycle(started);
            } else {
                match self.persist(&batch, started).await {
                    Ok(saved) => {
                        report.records_persisted += saved as u64;
                    }
                    Err(e) => {
                        let consecutive_failures = health().database.mark_down(e.to_string());
                        error!(
                            count = batch.len(),
                            error = %e,
                            consecutive_failures,
                            backoff_secs = self.settings.retry_backoff_seconds,
                            "Cycle failed, backing off"
                        );
                        report.failed_cycles += 1;
                        metrics().cycles_failed.inc();

                        self.set_state(WorkerState::RetryBackoff);
                        if !pause(self.settings.retry_backoff(), &cancel).await {
                            break;
                        }
                        self.set_state(WorkerState::Running);
                        continue;
                    }
                }
            }

            if !pause(self.settings.consumption_interval(), &cancel).await {
                break;
            }
        }

        self.set_state(WorkerState::Stopped);
        info!(
            session_total = self.total_processed_this_session,
            cycles = report.cycles,
            failed_cycles = report.failed_cycles,
            health = ?health().report(),
            metrics = ?metrics().snapshot(),
            "Log worker stopped"
        );

        Ok(report)
    }

    async fn persist(&mut self, batch: &[LogRecord], started: Instant) -> Result<usize> {
        let saved = self.sink.save(batch).await?;
        health().database.mark_up();

        let stored_total = self.sink.total_count().await;
        self.total_processed_this_session += batch.len() as u64;

        info!(
            count = batch.len(),
            breakdown = ?topic_breakdown(batch),
            stored_total,
            session_total = self.total_processed_this_session,
            duration_ms = %started.elapsed().as_millis(),
            "Persisted batch"
        );

        self.finish_cycle(started);
        Ok(saved)
    }

    fn finish_cycle(&self, started: Instant) {
        metrics().cycles_completed.inc();
        metrics()
            .cycle_latency_ms
            .observe(started.elapsed().as_millis() as u64);
    }

    fn set_state(&self, next: WorkerState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = ?previous, to = ?next, "Worker state changed");
        }
    }
}

/// Sleeps for `duration`. Returns false if cancelled first.
async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
