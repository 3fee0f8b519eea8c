use async_trait::async_trait;

use super::{count_failed, DeviceBatch, DomainResult, OperationRecord};

/// Persisted running summary for one device.
///
/// `total_operations` always equals `operations.len()` and `failed_operations` always equals
/// the number of unsuccessful entries in `operations`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAggregate {
    pub device_name: String,
    pub total_operations: i64,
    pub failed_operations: i64,
    pub operations: Vec<OperationRecord>,
}

impl DeviceAggregate {
    /// Seeds a new aggregate from the first batch ever received for a device.
    pub fn seed(batch: DeviceBatch) -> Self {
        let total_operations = batch.total_operations();
        let failed_operations = batch.failed_operations();
        Self {
            device_name: batch.device_name,
            total_operations,
            failed_operations,
            operations: batch.operations,
        }
    }

    /// Applies a merge in place: counters are incremented and operations appended in order.
    pub fn apply(&mut self, input: &MergeDeviceAggregateRepoInput) {
        self.total_operations += input.increment_total;
        self.failed_operations += input.increment_failed;
        self.operations
            .extend(input.append_operations.iter().cloned());
    }

    /// Checks the counter invariants against the stored history.
    pub fn is_consistent(&self) -> bool {
        self.total_operations == self.operations.len() as i64
            && self.failed_operations == count_failed(&self.operations)
    }
}

/// Repository input for looking up a device aggregate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindDeviceAggregateRepoInput {
    pub device_name: String,
}

/// Repository input for creating a device aggregate.
/// Must fail with `DeviceAggregateAlreadyExists` when the key is taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDeviceAggregateRepoInput {
    pub aggregate: DeviceAggregate,
}

/// Repository input for merging a batch into an existing aggregate.
/// Must fail with `DeviceAggregateNotFound` when the key does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeDeviceAggregateRepoInput {
    pub device_name: String,
    pub increment_total: i64,
    pub increment_failed: i64,
    pub append_operations: Vec<OperationRecord>,
}

impl MergeDeviceAggregateRepoInput {
    /// True when the increments match what `append_operations` actually holds.
    pub fn is_consistent(&self) -> bool {
        self.increment_total == self.append_operations.len() as i64
            && self.increment_failed == count_failed(&self.append_operations)
    }
}

impl From<DeviceBatch> for MergeDeviceAggregateRepoInput {
    fn from(batch: DeviceBatch) -> Self {
        Self {
            increment_total: batch.total_operations(),
            increment_failed: batch.failed_operations(),
            device_name: batch.device_name,
            append_operations: batch.operations,
        }
    }
}

/// Repository trait for device aggregate storage.
///
/// `create_device_aggregate` and `merge_device_aggregate` must each be a single atomic
/// operation against the store: concurrent callers never observe a half-written aggregate
/// or an increment without its matching append.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeviceAggregateRepository: Send + Sync {
    /// Returns `Ok(None)` only when no aggregate exists for the name.
    async fn find_device_aggregate(
        &self,
        input: FindDeviceAggregateRepoInput,
    ) -> DomainResult<Option<DeviceAggregate>>;

    /// Existence check that does not load the operations history.
    async fn device_aggregate_exists(&self, input: FindDeviceAggregateRepoInput)
        -> DomainResult<bool>;

    async fn create_device_aggregate(
        &self,
        input: CreateDeviceAggregateRepoInput,
    ) -> DomainResult<DeviceAggregate>;

    /// Fails with `ValidationError` when the increments disagree with `append_operations`.
    async fn merge_device_aggregate(&self, input: MergeDeviceAggregateRepoInput)
        -> DomainResult<()>;
}
