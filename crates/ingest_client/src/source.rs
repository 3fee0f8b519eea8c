//! JSON batch source.
//!
//! The file holds an array of devices:
//!
//! ```json
//! [{ "Name": "testDevice", "Operations": [{ "Type": "CREATE", "HasSucceeded": true }] }]
//! ```

use std::path::{Path, PathBuf};

use common::domain::{DeviceBatch, OperationRecord};
use serde::Deserialize;

use crate::error::SourceError;

#[derive(Debug, Deserialize)]
struct DeviceEntry {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Operations", default)]
    operations: Vec<OperationEntry>,
}

#[derive(Debug, Deserialize)]
struct OperationEntry {
    #[serde(rename = "Type")]
    kind: String,
    #[serde(rename = "HasSucceeded")]
    has_succeeded: bool,
}

impl From<DeviceEntry> for DeviceBatch {
    fn from(entry: DeviceEntry) -> Self {
        DeviceBatch::new(
            entry.name,
            entry
                .operations
                .into_iter()
                .map(|op| OperationRecord::new(op.kind, op.has_succeeded))
                .collect(),
        )
    }
}

/// Join a user-supplied file name onto the data directory and check it exists
pub fn resolve_input_path(data_dir: &Path, file_name: &str) -> Result<PathBuf, SourceError> {
    let file_name = file_name.trim();
    if file_name.is_empty() {
        return Err(SourceError::EmptyFileName);
    }

    let path = data_dir.join(file_name);
    if !path.is_file() {
        return Err(SourceError::NotFound(path));
    }
    Ok(path)
}

/// Parse a JSON document into batches, preserving source order
pub fn parse_device_batches(json: &str) -> Result<Vec<DeviceBatch>, SourceError> {
    let entries: Vec<DeviceEntry> = serde_json::from_str(json)?;
    Ok(entries.into_iter().map(DeviceBatch::from).collect())
}

pub async fn read_device_batches(path: &Path) -> Result<Vec<DeviceBatch>, SourceError> {
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    parse_device_batches(&json)
}
