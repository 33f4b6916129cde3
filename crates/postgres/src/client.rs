//! Pooled PostgreSQL access.
//!
//! Callers check a connection out for the duration of one operation. The
//! connection goes back to the pool when the box is dropped, on every path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use consumer_core::{DbErrorCode, Error, Result};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use std::time::Duration;
use tokio_postgres::types::ToSql;
use tokio_postgres::NoTls;
use tracing::info;

use crate::config::DatabaseConfig;

/// A bound statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    NullableText(Option<String>),
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    fn as_param(&self) -> &(dyn ToSql + Sync) {
        match self {
            Self::Text(v) => v,
            Self::NullableText(v) => v,
            Self::Timestamp(v) => v,
        }
    }
}

/// A checked-out database connection.
#[async_trait]
pub trait Connection: Send {
    /// Runs a parameterized statement, returning the affected row count.
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64>;

    /// Runs a query returning a single BIGINT.
    async fn query_scalar(&mut self, sql: &str) -> Result<i64>;
}

/// Source of scoped connections.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn Connection>>;
}

/// PostgreSQL client backed by a connection pool.
#[derive(Clone)]
pub struct DatabaseClient {
    pool: Pool,
    config: DatabaseConfig,
}

impl DatabaseClient {
    /// Creates the pool. No connection is opened until first use.
    pub fn new(config: DatabaseConfig) -> Result<Self> {
        let pg_config: tokio_postgres::Config = config.url.parse().map_err(|e| {
            Error::config(format!("Invalid database connection string: {e}"))
        })?;

        let manager = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );

        let pool = Pool::builder(manager)
            .max_size(config.pool_size)
            .wait_timeout(Some(Duration::from_secs(config.pool_timeout_secs)))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| Error::config(format!("Failed to build connection pool: {e}")))?;

        info!(pool_size = config.pool_size, "Created PostgreSQL pool");

        Ok(Self { pool, config })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }
}

struct PooledConnection(deadpool_postgres::Object);

#[async_trait]
impl Connection for PooledConnection {
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let params: Vec<&(dyn ToSql + Sync)> = params.iter().map(SqlValue::as_param).collect();

        self.0
            .execute(sql, &params)
            .await
            .map_err(|e| Error::database(DbErrorCode::WriteFailed, describe(&e)))
    }

    async fn query_scalar(&mut self, sql: &str) -> Result<i64> {
        let row = self
            .0
            .query_one(sql, &[])
            .await
            .map_err(|e| Error::database(DbErrorCode::QueryFailed, describe(&e)))?;

        row.try_get::<_, i64>(0)
            .map_err(|e| Error::database(DbErrorCode::QueryFailed, describe(&e)))
    }
}

/// Server message and SQLSTATE when the server rejected the statement,
/// otherwise the full source chain. `Display` alone only says "db error".
fn describe(e: &tokio_postgres::Error) -> String {
    match e.as_db_error() {
        Some(db) => {
            let mut text = format!("{} (SQLSTATE {})", db.message(), db.code().code());
            if let Some(detail) = db.detail() {
                text.push_str(": ");
                text.push_str(detail);
            }
            text
        }
        None => error_chain(e),
    }
}

fn error_chain(e: &dyn std::error::Error) -> String {
    let mut text = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    text
}

#[async_trait]
impl Connector for DatabaseClient {
    async fn acquire(&self) -> Result<Box<dyn Connection>> {
        let conn = self.pool.get().await.map_err(|e| {
            Error::database(DbErrorCode::ConnectFailed, format!("Pool checkout failed: {e}"))
        })?;
        Ok(Box::new(PooledConnection(conn)))
    }
}
