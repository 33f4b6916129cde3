//! PostgreSQL health checks.

use tracing::{debug, error};

use crate::client::Connector;

/// Checks that a connection can be checked out and answers a trivial query.
pub async fn check_connection<C: Connector>(connector: &C) -> bool {
    let result = async {
        let mut conn = connector.acquire().await?;
        conn.query_scalar("SELECT 1::BIGINT").await
    }
    .await;

    match result {
        Ok(_) => {
            debug!("PostgreSQL connection healthy");
            true
        }
        Err(e) => {
            error!("PostgreSQL health check failed: {}", e);
            false
        }
    }
}
