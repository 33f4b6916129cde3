//! Worker loop timing and lifecycle tests.
//!
//! Run on tokio's paused clock: sleeps complete as soon as every task is
//! idle, so the 15 s interval and 30 s backoff are observed exactly.

use integration_tests::{
    fixtures,
    mocks::{MockSink, MockSource},
    setup::mock_worker,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use worker::{WorkerSettings, WorkerState};

/// Collects every state the worker publishes until it drops the sender.
fn record_states(mut rx: watch::Receiver<WorkerState>) -> tokio::task::JoinHandle<Vec<WorkerState>> {
    tokio::spawn(async move {
        let mut seen = vec![*rx.borrow_and_update()];
        while rx.changed().await.is_ok() {
            seen.push(*rx.borrow_and_update());
        }
        seen
    })
}

async fn wait_for_saves(sink: &MockSink, n: usize) {
    while sink.save_count() < n {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_empty_cycles_never_call_save() {
    let sources: Vec<_> = ["request-logs", "error-logs", "event-logs"]
        .into_iter()
        .map(|t| Arc::new(MockSource::new(t)))
        .collect();
    let sink = MockSink::new();
    let worker = mock_worker(&sources, &sink, WorkerSettings::default());

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(worker.run(cancel.clone()));

    tokio::time::sleep(Duration::from_secs(61)).await;
    cancel.cancel();
    let report = handle.await.unwrap().unwrap();

    // Cycles at 0, 15, 30, 45 and 60 seconds
    assert_eq!(report.cycles, 5);
    assert_eq!(report.records_persisted, 0);
    assert_eq!(sink.save_count(), 0);
    for source in &sources {
        assert_eq!(source.poll_count(), 5);
    }
}

#[tokio::test(start_paused = true)]
async fn test_failed_save_backs_off_once_then_resumes() {
    let sources = vec![Arc::new(MockSource::repeating("error-logs", "disk almost full"))];
    let sink = MockSink::new();
    sink.fail_next_saves(1);
    let worker = mock_worker(&sources, &sink, WorkerSettings::default());
    let states = record_states(worker.subscribe());

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(worker.run(cancel.clone()));

    wait_for_saves(&sink, 3).await;
    cancel.cancel();
    let report = handle.await.unwrap().unwrap();

    let attempts = sink.save_attempts();
    // Failure, then exactly the backoff, then the normal interval
    assert_eq!(attempts[1] - attempts[0], Duration::from_secs(30));
    assert_eq!(attempts[2] - attempts[1], Duration::from_secs(15));

    assert_eq!(report.failed_cycles, 1);
    assert_eq!(report.records_persisted, 2);
    assert_eq!(sink.saved_records().len(), 2);

    let states = states.await.unwrap();
    assert!(states.contains(&WorkerState::RetryBackoff));
    assert_eq!(states.last(), Some(&WorkerState::Stopped));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_interval_sleep_stops_promptly() {
    let sources = vec![Arc::new(MockSource::with_records(
        "request-logs",
        vec![fixtures::request_log("corr-1")],
    ))];
    let sink = MockSink::new();
    let worker = mock_worker(&sources, &sink, WorkerSettings::default());
    let states = record_states(worker.subscribe());

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(worker.run(cancel.clone()));

    wait_for_saves(&sink, 1).await;
    let cancelled_at = tokio::time::Instant::now();
    cancel.cancel();
    let report = handle.await.unwrap().unwrap();

    assert!(cancelled_at.elapsed() < Duration::from_secs(1));
    assert_eq!(report.cycles, 1);
    assert_eq!(report.failed_cycles, 0);
    assert_eq!(report.records_persisted, 1);

    let states = states.await.unwrap();
    assert!(!states.contains(&WorkerState::RetryBackoff));
    assert_eq!(states.last(), Some(&WorkerState::Stopped));
}

#[tokio::test(start_paused = true)]
async fn test_initialize_failure_is_fatal() {
    let sources = vec![Arc::new(MockSource::repeating("request-logs", "never read"))];
    let sink = MockSink::new();
    sink.fail_initialize();
    let worker = mock_worker(&sources, &sink, WorkerSettings::default());
    let rx = worker.subscribe();

    let err = worker.run(CancellationToken::new()).await.unwrap_err();

    assert_eq!(err.error_code(), Some("DB_002"));
    assert_eq!(sources[0].poll_count(), 0);
    assert_eq!(sink.save_count(), 0);
    assert_eq!(*rx.borrow(), WorkerState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_session_total_counts_every_persisted_record() {
    let sources = vec![
        Arc::new(MockSource::with_records(
            "request-logs",
            vec![fixtures::request_log("a"), fixtures::request_log("b")],
        )),
        Arc::new(MockSource::with_records(
            "error-logs",
            vec![fixtures::error_log("a"), fixtures::error_log("b")],
        )),
        Arc::new(MockSource::with_records(
            "event-logs",
            vec![fixtures::event_log("signup"), fixtures::event_log("login")],
        )),
    ];
    let sink = MockSink::new();
    let worker = mock_worker(&sources, &sink, WorkerSettings::default());

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(worker.run(cancel.clone()));

    wait_for_saves(&sink, 2).await;
    cancel.cancel();
    let report = handle.await.unwrap().unwrap();

    assert_eq!(report.records_persisted, 6);
    assert_eq!(sink.batch_sizes(), vec![3, 3]);

    let topics: Vec<_> = sink
        .saved_records()
        .iter()
        .take(3)
        .map(|r| r.topic.clone())
        .collect();
    assert_eq!(topics, vec!["request-logs", "error-logs", "event-logs"]);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_backoff_skips_retry() {
    let sources = vec![Arc::new(MockSource::repeating("event-logs", "click"))];
    let sink = MockSink::new();
    sink.fail_next_saves(usize::MAX);
    let worker = mock_worker(&sources, &sink, WorkerSettings::default());

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(worker.run(cancel.clone()));

    wait_for_saves(&sink, 1).await;
    tokio::time::sleep(Duration::from_secs(5)).await;
    cancel.cancel();
    let report = handle.await.unwrap().unwrap();

    assert_eq!(sink.save_count(), 1);
    assert_eq!(report.failed_cycles, 1);
    assert_eq!(report.records_persisted, 0);
}
