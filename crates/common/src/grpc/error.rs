use crate::domain::DomainError;
use tonic::Status;

/// Convert domain error to gRPC Status
pub fn domain_error_to_status(error: DomainError) -> Status {
    match error {
        DomainError::ValidationError(msg) => Status::invalid_argument(msg),

        DomainError::DeviceAggregateNotFound(msg) => Status::not_found(msg),

        DomainError::DeviceAggregateAlreadyExists(msg) => Status::already_exists(msg),

        DomainError::StoreUnavailable(msg) => {
            Status::unavailable(format!("Store unavailable: {}", msg))
        }

        err @ DomainError::StoreTimeout { .. } => Status::deadline_exceeded(err.to_string()),

        DomainError::RepositoryError(err) => Status::internal(format!("Internal error: {}", err)),
    }
}
