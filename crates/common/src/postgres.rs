mod client;
mod config;
mod device_aggregate_repository;

pub use client::*;
pub use config::*;
pub use device_aggregate_repository::*;
