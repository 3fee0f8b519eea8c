pub mod domain;
pub mod garde;
pub mod grpc;
pub mod postgres;
pub mod proto;
pub mod telemetry;

// Re-export mocks when testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use domain::MockDeviceAggregateRepository;
