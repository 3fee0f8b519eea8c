use garde::Validate;
use serde::{Deserialize, Serialize};

/// A single action recorded by a device.
///
/// Serialized as `{"kind": ..., "succeeded": ...}` inside the persisted operation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct OperationRecord {
    #[garde(length(min = 1))]
    pub kind: String,
    #[garde(skip)]
    pub succeeded: bool,
}

impl OperationRecord {
    pub fn new(kind: impl Into<String>, succeeded: bool) -> Self {
        Self {
            kind: kind.into(),
            succeeded,
        }
    }

    pub fn failed(&self) -> bool {
        !self.succeeded
    }
}

/// Number of operations in `operations` that did not succeed.
pub fn count_failed(operations: &[OperationRecord]) -> i64 {
    operations.iter().filter(|op| op.failed()).count() as i64
}
