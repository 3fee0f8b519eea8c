use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::{debug, instrument};

use crate::domain::AggregationService;
use common::grpc::{domain_error_to_status, RecordGrpcStatus};
use common::proto::device_service_server::DeviceService as DeviceServiceTrait;
use common::proto::{from_device_data_request, DeviceDataRequest, DeviceDataResponse};

/// gRPC handler for DeviceService
/// Handles Proto → Domain mapping and error conversion
pub struct DeviceServiceHandler {
    domain_service: Arc<AggregationService>,
}

impl DeviceServiceHandler {
    pub fn new(domain_service: Arc<AggregationService>) -> Self {
        Self { domain_service }
    }

    async fn handle_send_data(
        &self,
        request: Request<DeviceDataRequest>,
    ) -> Result<Response<DeviceDataResponse>, Status> {
        let batch =
            from_device_data_request(request.into_inner()).map_err(domain_error_to_status)?;

        let ack = self
            .domain_service
            .ingest(batch)
            .await
            .map_err(domain_error_to_status)?;

        debug!(outcome = ?ack.outcome, "device batch stored");

        Ok(Response::new(DeviceDataResponse { success: true }))
    }
}

#[tonic::async_trait]
impl DeviceServiceTrait for DeviceServiceHandler {
    #[instrument(
        name = "SendData",
        skip(self, request),
        fields(
            device_name = %request
                .get_ref()
                .device
                .as_ref()
                .map(|device| device.name.as_str())
                .unwrap_or_default(),
            rpc.grpc.status_code = tracing::field::Empty,
        )
    )]
    async fn send_data(
        &self,
        request: Request<DeviceDataRequest>,
    ) -> Result<Response<DeviceDataResponse>, Status> {
        self.handle_send_data(request).await.record_status()
    }
}
