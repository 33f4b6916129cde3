//! Log Consumer
//!
//! Background worker that drains the request, error and event log topics
//! from Kafka into PostgreSQL:
//! - One consumer per topic, sharing a consumer group
//! - Offsets committed as messages are read
//! - Batches routed to one table per topic
//! - Fixed backoff after a failed cycle

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use consumer_core::ReceiveClock;
use kafka_source::{KafkaConfig, KafkaMessageSource, MessageSource};
use postgres_sink::{DatabaseClient, DatabaseConfig, LogSink, LogStore};
use telemetry::{health, init_tracing_from_env};
use worker::{ConsumptionCycle, LogWorker, WorkerSettings};

/// Application configuration.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default)]
    kafka: KafkaConfig,

    #[serde(default)]
    database: DatabaseConfig,

    #[serde(default)]
    worker: WorkerSettings,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("Starting Log Consumer v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    config.kafka.validate().context("Invalid Kafka configuration")?;
    config.worker.validate().context("Invalid worker configuration")?;

    info!(
        brokers = %config.kafka.broker_string(),
        group_id = %config.kafka.group_id,
        topics = ?config.kafka.topics(),
        "Loaded Kafka config"
    );

    let database = DatabaseClient::new(config.database.clone())
        .context("Failed to create PostgreSQL client")?;

    check_health(&config, &database).await;

    // One clock for every source keeps received_at non-decreasing across topics
    let clock = Arc::new(ReceiveClock::new());
    let sources: Vec<Arc<KafkaMessageSource>> =
        KafkaMessageSource::for_all_topics(&config.kafka, clock)
            .context("Failed to create Kafka consumers")?
            .into_iter()
            .map(Arc::new)
            .collect();

    let cycle = ConsumptionCycle::new(
        sources
            .iter()
            .map(|s| s.clone() as Arc<dyn MessageSource>)
            .collect(),
        config.worker.poll_timeout(),
    );
    let sink: Arc<dyn LogSink> = Arc::new(LogStore::new(database));
    let worker = LogWorker::new(cycle, sink, config.worker.clone());

    let cancel = CancellationToken::new();
    let worker_handle = tokio::spawn(worker.run(cancel.clone()));

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutting down...");
        shutdown.cancel();
    });

    let outcome = worker_handle.await.context("Worker task panicked")?;

    for source in &sources {
        source.close();
    }

    let report = outcome.context("Log worker failed to start")?;
    info!(
        cycles = report.cycles,
        failed_cycles = report.failed_cycles,
        records_persisted = report.records_persisted,
        "Shutdown complete"
    );
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("LOGCONSUMER")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // The config crate's nested parsing doesn't work reliably with underscored field names
    if let Ok(brokers) = std::env::var("LOGCONSUMER_KAFKA_BROKERS") {
        config.kafka.brokers = brokers.split(',').map(|s| s.trim().to_string()).collect();
    }
    if let Ok(group_id) = std::env::var("LOGCONSUMER_KAFKA_GROUP_ID") {
        config.kafka.group_id = group_id;
    }
    if let Ok(url) = std::env::var("LOGCONSUMER_DATABASE_URL") {
        config.database.url = url;
    }

    Ok(config)
}

/// Check component health on startup.
async fn check_health(config: &Config, database: &DatabaseClient) {
    if kafka_source::health::check_connection(&config.kafka).await {
        health().kafka.mark_up();
        info!("Kafka connection: healthy");

        let missing = kafka_source::health::verify_topics(&config.kafka).await;
        if !missing.is_empty() {
            warn!(missing = ?missing, "Configured topics not found on the cluster");
        }
    } else {
        health().kafka.mark_down("Connection failed");
        error!("Kafka connection: unhealthy");
    }

    if postgres_sink::health::check_connection(database).await {
        health().database.mark_up();
        info!("PostgreSQL connection: healthy");
    } else {
        health().database.mark_down("Connection failed");
        error!("PostgreSQL connection: unhealthy");
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
