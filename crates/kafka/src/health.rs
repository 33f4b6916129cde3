//! Kafka health checks.

use consumer_core::{Error, Result};
use rdkafka::consumer::{BaseConsumer, Consumer};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, error};

use crate::config::KafkaConfig;

const METADATA_TIMEOUT: Duration = Duration::from_secs(5);

/// Lists the topics visible in the cluster.
pub async fn list_topics(config: &KafkaConfig) -> Result<Vec<String>> {
    let client_config = config.client_config();

    // librdkafka metadata calls block
    tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
        let consumer: BaseConsumer = client_config
            .create()
            .map_err(|e| Error::broker(format!("Failed to create metadata client: {e}")))?;

        let metadata = consumer
            .fetch_metadata(None, METADATA_TIMEOUT)
            .map_err(|e| Error::broker(format!("Failed to fetch metadata: {e}")))?;

        Ok(metadata
            .topics()
            .iter()
            .map(|t| t.name().to_string())
            .collect())
    })
    .await
    .map_err(|e| Error::internal(format!("Metadata task failed: {e}")))?
}

/// Check Kafka connection health.
pub async fn check_connection(config: &KafkaConfig) -> bool {
    match list_topics(config).await {
        Ok(topics) => {
            debug!(topics = topics.len(), "Kafka connection healthy");
            true
        }
        Err(e) => {
            error!(brokers = %config.broker_string(), error = %e, "Kafka health check failed");
            false
        }
    }
}

/// Configured topics the cluster does not know about.
///
/// If the cluster cannot be reached every topic is reported missing.
pub async fn verify_topics(config: &KafkaConfig) -> Vec<String> {
    let existing = list_topics(config).await.unwrap_or_default();
    missing_topics(&existing, &config.topics())
}

fn missing_topics(existing: &[String], wanted: &[&str]) -> Vec<String> {
    let existing: HashSet<&str> = existing.iter().map(String::as_str).collect();
    wanted
        .iter()
        .filter(|t| !existing.contains(*t))
        .map(|t| t.to_string())
        .collect()
}
