//! Table definitions and statements for the three log destinations.
//!
//! All destinations share one layout. Every statement is idempotent so the
//! schema can be ensured on each start.

use consumer_core::Destination;

/// DDL that ensures one destination table and its indexes exist.
pub fn create_statements(destination: Destination) -> Vec<String> {
    let table = destination.table_name();

    vec![
        format!(
            r#"
CREATE TABLE IF NOT EXISTS {table} (
    id BIGSERIAL PRIMARY KEY,
    topic VARCHAR(100) NOT NULL,
    payload TEXT NOT NULL,
    received_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    correlation_id VARCHAR(100),
    log_level VARCHAR(50),
    source VARCHAR(200),
    headers TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
)"#
        ),
        format!("CREATE INDEX IF NOT EXISTS ix_{table}_topic ON {table} (topic)"),
        format!("CREATE INDEX IF NOT EXISTS ix_{table}_received_at ON {table} (received_at)"),
        format!("CREATE INDEX IF NOT EXISTS ix_{table}_correlation_id ON {table} (correlation_id)"),
    ]
}

/// Parameterized insert for one record.
///
/// Parameters, in order: topic, payload, received_at, correlation_id,
/// log_level, source, headers.
pub fn insert_statement(destination: Destination) -> String {
    format!(
        "INSERT INTO {} (topic, payload, received_at, correlation_id, log_level, source, headers, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, now())",
        destination.table_name()
    )
}

/// Row count across all destinations, as a single BIGINT.
pub const TOTAL_COUNT_SQL: &str = "SELECT \
    (SELECT COUNT(*) FROM request_logs) + \
    (SELECT COUNT(*) FROM error_logs) + \
    (SELECT COUNT(*) FROM event_logs) AS total_count";
