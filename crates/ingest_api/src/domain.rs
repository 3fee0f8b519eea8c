pub mod aggregation_service;

pub use aggregation_service::*;
