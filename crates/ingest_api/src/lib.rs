pub mod domain;
pub mod grpc;
pub mod ingest_api;

pub use domain::*;
pub use grpc::*;
pub use ingest_api::*;
