use std::path::PathBuf;
use thiserror::Error;

/// Why a single batch submission failed
#[derive(Error, Debug)]
pub enum SubmissionError {
    /// The channel could not be established or broke during the call
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Server rejected batch for device {device_name}: {code:?} {message}")]
    Rejected {
        device_name: String,
        code: tonic::Code,
        message: String,
    },

    #[error("Server did not acknowledge batch for device {0}")]
    NotAcknowledged(String),

    #[error("Invalid batch: {0}")]
    InvalidBatch(String),
}

/// Failures reading the batch source
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("No input file name given")]
    EmptyFileName,

    #[error("File {0} does not exist")]
    NotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse device batches: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A submission failure that stopped the run
#[derive(Error, Debug)]
#[error(
    "Batch {index} (device {device_name}) failed after {batches_sent} successful submissions: {source}"
)]
pub struct RunError {
    /// Zero-based position of the failed batch in the source
    pub index: usize,
    pub device_name: String,
    pub batches_sent: usize,
    pub source: SubmissionError,
}
