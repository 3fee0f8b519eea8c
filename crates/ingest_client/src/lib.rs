//! Client side of device batch ingestion: read batches from a JSON source and submit them to
//! the ingest server one at a time, in source order.

pub mod cli;
pub mod error;
pub mod ingestion_run;
pub mod source;
pub mod submitter;

pub use cli::*;
pub use error::*;
pub use ingestion_run::*;
pub use source::*;
pub use submitter::*;
