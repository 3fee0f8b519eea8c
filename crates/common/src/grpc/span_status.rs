use tonic::{Response, Status};
use tracing::Span;

/// Record the gRPC status code on the current span as `rpc.grpc.status_code`.
///
/// The span must declare the field up front (e.g. `rpc.grpc.status_code = tracing::field::Empty`).
pub fn record_grpc_status<T>(result: &Result<Response<T>, Status>) {
    let code = match result {
        Ok(_) => tonic::Code::Ok as i32,
        Err(status) => status.code() as i32,
    };

    Span::current().record("rpc.grpc.status_code", code);
}

/// Chainable form of [`record_grpc_status`]: `result.record_status()`
pub trait RecordGrpcStatus<T> {
    fn record_status(self) -> Self;
}

impl<T> RecordGrpcStatus<T> for Result<Response<T>, Status> {
    fn record_status(self) -> Self {
        record_grpc_status(&self);
        self
    }
}
