mod error;
mod logging;
mod server;
mod span_status;

pub use error::*;
pub use logging::*;
pub use server::*;
pub use span_status::*;
