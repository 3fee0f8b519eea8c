use std::sync::Arc;

use crate::domain::AggregationService;
use crate::grpc::run_ingest_grpc_server;
use common::grpc::GrpcServerConfig;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct IngestApi {
    service: Arc<AggregationService>,
    config: GrpcServerConfig,
}

impl IngestApi {
    pub fn new(service: Arc<AggregationService>, config: GrpcServerConfig) -> Self {
        debug!("Initializing ingest API module");
        Self { service, config }
    }

    pub fn into_runner_process(
        self,
    ) -> impl FnOnce(
        CancellationToken,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>,
    > {
        move |ctx| {
            Box::pin(async move { run_ingest_grpc_server(self.config, self.service, ctx).await })
        }
    }
}
