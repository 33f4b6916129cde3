//! PostgreSQL sink tests against a real database.
//!
//! Requires Docker (or `LOGCONSUMER_TEST_DATABASE_URL`), so these are ignored
//! by default. Run with `--ignored`.

use chrono::Utc;
use consumer_core::Destination;
use integration_tests::{fixtures, setup::TestContext};
use kafka_source::decode::decode_message;
use postgres_sink::{health, LogSink};

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_initialize_is_idempotent() {
    let ctx = TestContext::new().await;
    let before = ctx.store.total_count().await;

    ctx.store.initialize().await.expect("second initialize failed");
    ctx.store.initialize().await.expect("third initialize failed");

    assert_eq!(ctx.store.total_count().await, before);
    assert!(health::check_connection(ctx.store.connector()).await);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_save_increases_total_by_batch_size() {
    let ctx = TestContext::new().await;
    let before = ctx.store.total_count().await;

    let batch = fixtures::records("event-logs", 25);
    let saved = ctx.store.save(&batch).await.expect("save failed");

    assert_eq!(saved, 25);
    assert_eq!(ctx.store.total_count().await, before + 25);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_empty_batch_writes_nothing() {
    let ctx = TestContext::new().await;
    let before = ctx.store.total_count().await;

    let err = ctx.store.save(&[]).await.unwrap_err();

    assert!(err.is_validation());
    assert_eq!(ctx.store.total_count().await, before);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_records_routed_by_topic() {
    let ctx = TestContext::new().await;
    let before: Vec<i64> = {
        let mut counts = Vec::new();
        for destination in Destination::ALL {
            counts.push(ctx.table_count(destination).await);
        }
        counts
    };

    let batch = vec![
        fixtures::request_log("r1"),
        fixtures::error_log("e1"),
        fixtures::error_log("e2"),
        fixtures::event_log("signup"),
        fixtures::record("audit-logs", "unrouted topic"),
    ];
    ctx.store.save(&batch).await.expect("save failed");

    let mut after = Vec::new();
    for destination in Destination::ALL {
        after.push(ctx.table_count(destination).await);
    }

    // request_logs also takes the unknown topic
    assert_eq!(after[0] - before[0], 2);
    assert_eq!(after[1] - before[1], 2);
    assert_eq!(after[2] - before[2], 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_headers_round_trip() {
    let ctx = TestContext::new().await;
    let correlation_id = fixtures::unique_id("corr");

    let record = fixtures::record_with_headers(
        "request-logs",
        "GET /orders",
        &[
            ("CorrelationId", correlation_id.as_str()),
            ("LogLevel", "INFO"),
            ("X", "y"),
        ],
    );
    assert_eq!(record.correlation_id.as_deref(), Some(correlation_id.as_str()));
    assert_eq!(record.log_level.as_deref(), Some("INFO"));

    ctx.store.save(&[record]).await.expect("save failed");

    let matches = ctx
        .scalar(&format!(
            "SELECT COUNT(*) FROM request_logs \
             WHERE correlation_id = '{correlation_id}' \
             AND log_level = 'INFO' \
             AND source IS NULL \
             AND headers::jsonb ->> 'CorrelationId' = '{correlation_id}' \
             AND headers::jsonb ->> 'LogLevel' = 'INFO' \
             AND headers::jsonb ->> 'X' = 'y'"
        ))
        .await
        .expect("query failed");
    assert_eq!(matches, 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_payload_is_stored_verbatim() {
    let ctx = TestContext::new().await;
    let marker = fixtures::unique_id("quote");
    let payload = format!("it's {marker}; DROP TABLE error_logs; --");

    ctx.store
        .save(&[fixtures::record("error-logs", &payload)])
        .await
        .expect("save failed");

    let escaped = payload.replace('\'', "''");
    let matches = ctx
        .scalar(&format!(
            "SELECT COUNT(*) FROM error_logs WHERE payload = '{escaped}'"
        ))
        .await
        .expect("query failed");
    assert_eq!(matches, 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_decoded_nul_bytes_are_stored() {
    let ctx = TestContext::new().await;
    let marker = fixtures::unique_id("nul");
    let before = ctx.table_count(Destination::Error).await;

    let batch: Vec<_> = ["first", "bin\0ary", "third"]
        .into_iter()
        .map(|payload| {
            let payload = format!("{marker} {payload}");
            let headers: Vec<(&str, Option<&[u8]>)> =
                vec![("CorrelationId", Some(marker.as_bytes())), ("X", Some(&b"a\0b"[..]))];
            decode_message("error-logs", Some(payload.as_bytes()), headers, Utc::now())
        })
        .collect();

    assert_eq!(ctx.store.save(&batch).await.expect("save failed"), 3);
    assert_eq!(ctx.table_count(Destination::Error).await, before + 3);

    let matches = ctx
        .scalar(&format!(
            "SELECT COUNT(*) FROM error_logs WHERE payload = '{marker} binary' \
             AND headers::jsonb ->> 'X' = 'ab'"
        ))
        .await
        .expect("query failed");
    assert_eq!(matches, 1);
}
