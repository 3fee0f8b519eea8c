use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "ingest_client")]
#[command(about = "Send device operation batches from a JSON file to the ingest server")]
#[command(version)]
pub struct Cli {
    /// JSON file name, relative to the data directory. Prompted for when omitted
    pub file: Option<String>,

    #[arg(long, env = "OPS_CLIENT_SERVER_URL", default_value = "http://localhost:50051")]
    pub server_url: String,

    /// Directory the file name is resolved against
    #[arg(long, env = "OPS_CLIENT_DATA_DIR", default_value = "donnees")]
    pub data_dir: PathBuf,

    #[arg(long, env = "OPS_CLIENT_CONNECT_TIMEOUT_SECS", default_value_t = 5)]
    pub connect_timeout_secs: u64,

    /// Per-call deadline
    #[arg(long, env = "OPS_CLIENT_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    #[arg(long, env = "OPS_CLIENT_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Cli {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
