mod device_aggregate;
mod device_batch;
mod in_memory_device_aggregate_repository;
mod operation;
mod result;

pub use device_aggregate::*;
pub use device_batch::*;
pub use in_memory_device_aggregate_repository::*;
pub use operation::*;
pub use result::*;
