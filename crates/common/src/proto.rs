mod device_batch;
mod operation;

pub use device_batch::*;
pub use operation::*;
