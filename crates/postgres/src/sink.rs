//! Durable storage for consumed log records.

use async_trait::async_trait;
use consumer_core::{
    ensure_not_empty, with_error_handling, DbErrorCode, Destination, LogRecord, OnError, Result,
};
use std::time::Instant;
use telemetry::metrics;
use tracing::{debug, info};

use crate::client::{Connector, DatabaseClient, SqlValue};
use crate::schema;

/// Where the worker sends each non-empty batch.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Ensures the destination tables exist. Safe to call on every start.
    async fn initialize(&self) -> Result<()>;

    /// Writes every record to its routed destination.
    ///
    /// Rejects an empty batch. Stops at the first failed write and returns
    /// that error; records written before it stay written.
    async fn save(&self, records: &[LogRecord]) -> Result<usize>;

    /// Rows across all destinations, or 0 if the count cannot be read.
    async fn total_count(&self) -> u64;
}

/// [`LogSink`] over a pool of PostgreSQL connections.
pub struct LogStore<C = DatabaseClient> {
    connector: C,
}

impl<C: Connector> LogStore<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    async fn create_schema(&self) -> Result<()> {
        let mut conn = self.connector.acquire().await?;

        for destination in Destination::ALL {
            let table = destination.table_name();
            for statement in schema::create_statements(destination) {
                conn.execute(&statement, &[])
                    .await
                    .map_err(|e| e.with_code(DbErrorCode::SchemaFailed).context(table))?;
            }
            debug!(table, "Ensured table");
        }

        info!("Database schema initialized");
        Ok(())
    }

    async fn write_batch(&self, records: &[LogRecord]) -> Result<usize> {
        ensure_not_empty(records, "records")?;

        let start = Instant::now();
        let mut conn = self.connector.acquire().await?;

        for record in records {
            let destination = record.destination();
            let params = insert_params(record)?;

            if let Err(e) = conn.execute(&schema::insert_statement(destination), &params).await {
                metrics().save_errors.inc();
                return Err(e.context(format!("insert into {} failed", destination.table_name())));
            }
        }

        let elapsed = start.elapsed();
        metrics().records_saved.inc_by(records.len() as u64);
        metrics().save_latency_ms.observe(elapsed.as_millis() as u64);

        info!(
            count = records.len(),
            latency_ms = %elapsed.as_millis(),
            "Saved records"
        );

        Ok(records.len())
    }

    async fn count_all(&self) -> Result<u64> {
        let mut conn = self.connector.acquire().await?;
        let total = conn.query_scalar(schema::TOTAL_COUNT_SQL).await?;
        Ok(u64::try_from(total).unwrap_or(0))
    }
}

fn insert_params(record: &LogRecord) -> Result<Vec<SqlValue>> {
    Ok(vec![
        SqlValue::Text(record.topic.clone()),
        SqlValue::Text(record.payload.clone()),
        SqlValue::Timestamp(record.received_at),
        SqlValue::NullableText(record.correlation_id.clone()),
        SqlValue::NullableText(record.log_level.clone()),
        SqlValue::NullableText(record.source.clone()),
        SqlValue::Text(record.headers_json()?),
    ])
}

#[async_trait]
impl<C: Connector> LogSink for LogStore<C> {
    async fn initialize(&self) -> Result<()> {
        with_error_handling("initialize", OnError::Propagate, self.create_schema()).await
    }

    async fn save(&self, records: &[LogRecord]) -> Result<usize> {
        with_error_handling("save", OnError::Propagate, self.write_batch(records)).await
    }

    async fn total_count(&self) -> u64 {
        // A fallback policy never yields Err
        with_error_handling("total_count", OnError::Fallback(0), self.count_all())
            .await
            .unwrap_or_default()
    }
}
