use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tonic::service::Routes;

use crate::domain::AggregationService;
use crate::grpc::device_handler::DeviceServiceHandler;
use common::grpc::{run_grpc_server, GrpcServerConfig};
use common::proto::device_service_server::DeviceServiceServer;

/// Routes exposing DeviceService backed by `service`
pub fn build_ingest_routes(service: Arc<AggregationService>) -> Routes {
    Routes::new(DeviceServiceServer::new(DeviceServiceHandler::new(service)))
}

/// Run the ingest gRPC server until `cancellation_token` fires
pub async fn run_ingest_grpc_server(
    config: GrpcServerConfig,
    service: Arc<AggregationService>,
    cancellation_token: CancellationToken,
) -> anyhow::Result<()> {
    run_grpc_server(config, build_ingest_routes(service), cancellation_token).await
}
