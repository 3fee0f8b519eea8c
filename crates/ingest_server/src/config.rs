use std::time::Duration;

use common::grpc::{GrpcLoggingConfig, GrpcServerConfig};
use common::postgres::PostgresConfig;
use common::telemetry::TelemetryConfig;
use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

/// Where device aggregates are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    /// Process-local map, lost on restart
    Memory,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // gRPC configuration
    #[serde(default = "default_grpc_host")]
    pub grpc_host: String,

    #[serde(default = "default_grpc_port")]
    pub grpc_port: u16,

    /// Comma-separated path prefixes excluded from request logging
    #[serde(default = "default_grpc_ignored_paths")]
    pub grpc_ignored_paths: String,

    // Store configuration
    #[serde(default = "default_store_backend")]
    pub store_backend: StoreBackend,

    /// Budget for each store call made while ingesting a batch
    #[serde(default = "default_store_timeout_secs")]
    pub store_timeout_secs: u64,

    // PostgreSQL configuration
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    #[serde(default = "default_postgres_max_pool_size")]
    pub postgres_max_pool_size: usize,

    /// Goose migrations directory
    #[serde(default = "default_postgres_migrations_dir")]
    pub postgres_migrations_dir: String,

    #[serde(default = "default_postgres_goose_binary_path")]
    pub postgres_goose_binary_path: String,

    // OpenTelemetry configuration
    #[serde(default = "default_otel_enabled")]
    pub otel_enabled: bool,

    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,

    /// Time allowed for closers once shutdown starts
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_grpc_host() -> String {
    "0.0.0.0".to_string()
}

fn default_grpc_port() -> u16 {
    50051
}

fn default_grpc_ignored_paths() -> String {
    String::new()
}

fn default_store_backend() -> StoreBackend {
    StoreBackend::Postgres
}

fn default_store_timeout_secs() -> u64 {
    10
}

// PostgreSQL defaults
fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "operation".to_string()
}

fn default_postgres_username() -> String {
    "postgres".to_string()
}

fn default_postgres_password() -> String {
    "postgres".to_string()
}

fn default_postgres_max_pool_size() -> usize {
    10
}

fn default_postgres_migrations_dir() -> String {
    "crates/common/migrations".to_string()
}

fn default_postgres_goose_binary_path() -> String {
    "goose".to_string()
}

// OpenTelemetry defaults
fn default_otel_enabled() -> bool {
    false
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_service_name() -> String {
    "device-ops-server".to_string()
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("OPS"))
            .build()?
            .try_deserialize()
    }

    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            service_name: self.otel_service_name.clone(),
            otel_endpoint: self.otel_endpoint.clone(),
            otel_enabled: self.otel_enabled,
            log_level: self.log_level.clone(),
        }
    }

    pub fn grpc_config(&self) -> GrpcServerConfig {
        GrpcServerConfig {
            host: self.grpc_host.clone(),
            port: self.grpc_port,
            logging_config: GrpcLoggingConfig::from_comma_separated(&self.grpc_ignored_paths),
        }
    }

    pub fn postgres_config(&self) -> PostgresConfig {
        PostgresConfig {
            host: self.postgres_host.clone(),
            port: self.postgres_port,
            database: self.postgres_database.clone(),
            username: self.postgres_username.clone(),
            password: self.postgres_password.clone(),
            max_pool_size: self.postgres_max_pool_size,
            migrations_dir: self.postgres_migrations_dir.clone(),
            goose_binary_path: self.postgres_goose_binary_path.clone(),
        }
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to ensure tests run serially and don't interfere with each other
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    const VARS: [&str; 4] = [
        "OPS_LOG_LEVEL",
        "OPS_GRPC_PORT",
        "OPS_STORE_BACKEND",
        "OPS_GRPC_IGNORED_PATHS",
    ];

    fn clear_vars() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config() {
        let _lock = TEST_LOCK.lock().unwrap();
        clear_vars();

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.grpc_port, 50051);
        assert_eq!(config.store_backend, StoreBackend::Postgres);
        assert_eq!(config.store_timeout(), Duration::from_secs(10));
        assert_eq!(config.postgres_config().database, "operation");
        assert!(config.grpc_config().logging_config.ignored_paths.is_empty());
    }

    #[test]
    fn test_custom_config() {
        let _lock = TEST_LOCK.lock().unwrap();
        std::env::set_var("OPS_LOG_LEVEL", "debug");
        std::env::set_var("OPS_GRPC_PORT", "6000");
        std::env::set_var("OPS_STORE_BACKEND", "memory");
        std::env::set_var("OPS_GRPC_IGNORED_PATHS", "/grpc.health., /internal.");

        let config = ServiceConfig::from_env().unwrap();
        clear_vars();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.grpc_config().port, 6000);
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(
            config.grpc_config().logging_config.ignored_paths,
            vec!["/grpc.health.".to_string(), "/internal.".to_string()]
        );
    }

    #[test]
    fn test_unknown_store_backend_is_rejected() {
        let _lock = TEST_LOCK.lock().unwrap();
        std::env::set_var("OPS_STORE_BACKEND", "sqlite");

        let result = ServiceConfig::from_env();
        clear_vars();

        assert!(result.is_err());
    }
}
