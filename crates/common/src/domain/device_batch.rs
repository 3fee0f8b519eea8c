use garde::Validate;

use super::{count_failed, OperationRecord};

/// Operations submitted together for one device.
///
/// Never persisted as a unit; only its effect on the device's aggregate is stored.
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct DeviceBatch {
    #[garde(length(min = 1))]
    pub device_name: String,
    #[garde(dive)]
    pub operations: Vec<OperationRecord>,
}

impl DeviceBatch {
    pub fn new(device_name: impl Into<String>, operations: Vec<OperationRecord>) -> Self {
        Self {
            device_name: device_name.into(),
            operations,
        }
    }

    pub fn total_operations(&self) -> i64 {
        self.operations.len() as i64
    }

    pub fn failed_operations(&self) -> i64 {
        count_failed(&self.operations)
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
