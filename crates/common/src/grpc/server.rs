//! Reusable gRPC server wiring: request logging plus graceful shutdown.
//!
//! # Example
//!
//! ```ignore
//! use common::grpc::{run_grpc_server, GrpcServerConfig};
//! use tonic::service::Routes;
//!
//! let routes = Routes::builder()
//!     .add_service(DeviceServiceServer::new(handler))
//!     .routes();
//!
//! run_grpc_server(GrpcServerConfig::default(), routes, cancellation_token).await?;
//! ```

use std::net::SocketAddr;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::service::Routes;
use tonic::transport::Server;
use tracing::{debug, error, info};

use super::{GrpcLoggingConfig, GrpcLoggingLayer};

/// Configuration for the gRPC server.
#[derive(Debug, Clone)]
pub struct GrpcServerConfig {
    pub host: String,
    pub port: u16,
    pub logging_config: GrpcLoggingConfig,
}

impl Default for GrpcServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 50051,
            logging_config: GrpcLoggingConfig::default(),
        }
    }
}

impl GrpcServerConfig {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid gRPC server address {}:{}", self.host, self.port))
    }
}

/// Bind the configured address and serve `routes` until `cancellation_token` fires.
pub async fn run_grpc_server(
    config: GrpcServerConfig,
    routes: Routes,
    cancellation_token: CancellationToken,
) -> anyhow::Result<()> {
    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind gRPC server to {}", addr))?;

    info!(address = %addr, "gRPC server listening");

    serve_grpc_listener(listener, config.logging_config, routes, cancellation_token).await
}

/// Serve `routes` on an already-bound listener, which lets callers pick an ephemeral port.
pub async fn serve_grpc_listener(
    listener: TcpListener,
    logging_config: GrpcLoggingConfig,
    routes: Routes,
    cancellation_token: CancellationToken,
) -> anyhow::Result<()> {
    let serve = Server::builder()
        .layer(GrpcLoggingLayer::new(logging_config))
        .add_routes(routes)
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
            cancellation_token.cancelled().await;
            debug!("gRPC server shutdown signal received");
        });

    match serve.await {
        Ok(()) => {
            info!("gRPC server stopped gracefully");
            Ok(())
        }
        Err(e) => {
            error!("gRPC server error: {}", e);
            Err(e.into())
        }
    }
}
