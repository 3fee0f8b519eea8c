pub mod device_handler;
pub mod server;

pub use device_handler::*;
pub use server::*;
