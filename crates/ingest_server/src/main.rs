mod config;

use common::domain::{DeviceAggregateRepository, InMemoryDeviceAggregateRepository};
use common::postgres::{PostgresClient, PostgresDeviceAggregateRepository};
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryProviders};
use crate::config::{ServiceConfig, StoreBackend};
use goose::MigrationRunner;
use ingest_api::domain::AggregationService;
use ingest_api::ingest_api::IngestApi;
use ops_runner::Runner;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize telemetry (tracing + OpenTelemetry for traces and logs)
    let telemetry_providers: Option<TelemetryProviders> =
        match init_telemetry(&config.telemetry_config()) {
            Ok(providers) => providers,
            Err(e) => {
                eprintln!("Failed to initialize telemetry: {}", e);
                return ExitCode::FAILURE;
            }
        };

    info!(
        store_backend = ?config.store_backend,
        otel_enabled = config.otel_enabled,
        "Starting device operations server"
    );
    debug!("Configuration: {:?}", config);

    match run(config, telemetry_providers).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Service stopped with error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(
    config: ServiceConfig,
    telemetry_providers: Option<TelemetryProviders>,
) -> anyhow::Result<()> {
    let repository = match initialize_repository(&config).await {
        Ok(repository) => repository,
        Err(e) => {
            shutdown_telemetry(telemetry_providers);
            return Err(e.context("failed to initialize device aggregate store"));
        }
    };

    let aggregation_service = Arc::new(AggregationService::new(
        repository,
        config.store_timeout(),
    ));

    let grpc_config = config.grpc_config();
    info!(
        host = %grpc_config.host,
        port = grpc_config.port,
        "Device service configured"
    );
    let ingest_api = IngestApi::new(aggregation_service, grpc_config);

    Runner::new()
        .with_named_process("ingest_api", ingest_api.into_runner_process())
        .with_closer(move || async move {
            info!("Running cleanup tasks...");
            // Flush pending traces and logs
            shutdown_telemetry(telemetry_providers);
            info!("Cleanup complete");
            Ok(())
        })
        .with_closer_timeout(config.shutdown_timeout())
        .run()
        .await
}

async fn initialize_repository(
    config: &ServiceConfig,
) -> anyhow::Result<Arc<dyn DeviceAggregateRepository>> {
    match config.store_backend {
        StoreBackend::Memory => {
            info!("Using in-memory device aggregate store");
            Ok(Arc::new(InMemoryDeviceAggregateRepository::new()))
        }
        StoreBackend::Postgres => {
            info!("Initializing PostgreSQL...");
            let postgres_config = config.postgres_config();

            MigrationRunner::postgres(
                postgres_config.goose_binary_path.clone(),
                postgres_config.migrations_dir.clone(),
                postgres_config.dsn(),
            )
            .run_migrations()
            .await?;

            let client = PostgresClient::from_config(&postgres_config)?;
            client.ping().await?;
            info!(
                host = %postgres_config.host,
                database = %postgres_config.database,
                "PostgreSQL ready"
            );

            Ok(Arc::new(PostgresDeviceAggregateRepository::new(client)))
        }
    }
}
