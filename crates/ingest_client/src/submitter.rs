use std::time::Duration;

use async_trait::async_trait;
use common::domain::{DeviceBatch, DomainError};
use common::garde::validate_struct;
use common::proto::device_service_client::DeviceServiceClient;
use common::proto::to_device_data_request;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Status};
use tracing::{debug, instrument};

use crate::error::SubmissionError;

/// Acknowledgment for one submitted batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionAck {
    pub device_name: String,
    pub operations_sent: usize,
}

/// Sends one batch per call to the ingest server. Makes exactly one remote call and never retries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BatchSubmitter: Send {
    async fn submit(&mut self, batch: DeviceBatch) -> Result<SubmissionAck, SubmissionError>;
}

pub struct GrpcBatchSubmitter {
    client: DeviceServiceClient<Channel>,
}

impl GrpcBatchSubmitter {
    /// Connect eagerly so an unreachable server is reported before any batch is sent
    pub async fn connect(
        server_url: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, SubmissionError> {
        let endpoint = Endpoint::from_shared(server_url.to_string())
            .map_err(|e| {
                SubmissionError::Transport(format!("invalid server url {server_url}: {e}"))
            })?
            .connect_timeout(connect_timeout)
            .timeout(request_timeout);

        let channel = endpoint.connect().await.map_err(|e| {
            SubmissionError::Transport(format!("failed to connect to {server_url}: {e}"))
        })?;

        debug!(server_url, "connected to ingest server");
        Ok(Self::from_channel(channel))
    }

    pub fn from_channel(channel: Channel) -> Self {
        Self {
            client: DeviceServiceClient::new(channel),
        }
    }
}

#[async_trait]
impl BatchSubmitter for GrpcBatchSubmitter {
    #[instrument(skip(self, batch), fields(device_name = %batch.device_name))]
    async fn submit(&mut self, batch: DeviceBatch) -> Result<SubmissionAck, SubmissionError> {
        validate_struct(&batch).map_err(|e| match e {
            DomainError::ValidationError(msg) => SubmissionError::InvalidBatch(msg),
            other => SubmissionError::InvalidBatch(other.to_string()),
        })?;

        let device_name = batch.device_name.clone();
        let operations_sent = batch.operations.len();

        let response = self
            .client
            .send_data(to_device_data_request(&batch))
            .await
            .map_err(|status| status_to_submission_error(&device_name, status))?;

        if !response.into_inner().success {
            return Err(SubmissionError::NotAcknowledged(device_name));
        }

        Ok(SubmissionAck {
            device_name,
            operations_sent,
        })
    }
}

/// `UNAVAILABLE` means the channel itself failed, and `CANCELLED` / `DEADLINE_EXCEEDED` come
/// from the client-side call deadline. Any other status is a server-side rejection.
pub fn status_to_submission_error(device_name: &str, status: Status) -> SubmissionError {
    match status.code() {
        Code::Unavailable | Code::Cancelled | Code::DeadlineExceeded => {
            SubmissionError::Transport(format!("{:?}: {}", status.code(), status.message()))
        }
        code => SubmissionError::Rejected {
            device_name: device_name.to_string(),
            code,
            message: status.message().to_string(),
        },
    }
}
