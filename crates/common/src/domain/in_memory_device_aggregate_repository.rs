use crate::domain::{
    CreateDeviceAggregateRepoInput, DeviceAggregate, DeviceAggregateRepository, DomainError,
    DomainResult, FindDeviceAggregateRepoInput, MergeDeviceAggregateRepoInput,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory implementation of DeviceAggregateRepository using HashMap.
/// Create and merge each run under the write lock, so both are atomic per device.
#[derive(Clone)]
pub struct InMemoryDeviceAggregateRepository {
    aggregates: Arc<RwLock<HashMap<String, DeviceAggregate>>>,
}

impl InMemoryDeviceAggregateRepository {
    pub fn new() -> Self {
        Self {
            aggregates: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn count(&self) -> usize {
        self.aggregates.read().await.len()
    }
}

impl Default for InMemoryDeviceAggregateRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceAggregateRepository for InMemoryDeviceAggregateRepository {
    async fn find_device_aggregate(
        &self,
        input: FindDeviceAggregateRepoInput,
    ) -> DomainResult<Option<DeviceAggregate>> {
        let aggregates = self.aggregates.read().await;
        Ok(aggregates.get(&input.device_name).cloned())
    }

    async fn device_aggregate_exists(
        &self,
        input: FindDeviceAggregateRepoInput,
    ) -> DomainResult<bool> {
        Ok(self.aggregates.read().await.contains_key(&input.device_name))
    }

    async fn create_device_aggregate(
        &self,
        input: CreateDeviceAggregateRepoInput,
    ) -> DomainResult<DeviceAggregate> {
        let mut aggregates = self.aggregates.write().await;
        let device_name = input.aggregate.device_name.clone();
        if aggregates.contains_key(&device_name) {
            return Err(DomainError::DeviceAggregateAlreadyExists(device_name));
        }
        aggregates.insert(device_name.clone(), input.aggregate.clone());
        debug!(device_name = %device_name, "created device aggregate in memory");
        Ok(input.aggregate)
    }

    async fn merge_device_aggregate(
        &self,
        input: MergeDeviceAggregateRepoInput,
    ) -> DomainResult<()> {
        if !input.is_consistent() {
            return Err(DomainError::ValidationError(format!(
                "merge increments for {} do not match appended operations",
                input.device_name
            )));
        }

        let mut aggregates = self.aggregates.write().await;
        let aggregate = aggregates
            .get_mut(&input.device_name)
            .ok_or_else(|| DomainError::DeviceAggregateNotFound(input.device_name.clone()))?;
        aggregate.apply(&input);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DeviceBatch, OperationRecord};

    fn seeded(name: &str) -> CreateDeviceAggregateRepoInput {
        CreateDeviceAggregateRepoInput {
            aggregate: DeviceAggregate::seed(DeviceBatch::new(
                name,
                vec![OperationRecord::new("CREATE", true)],
            )),
        }
    }

    #[tokio::test]
    async fn test_find_missing_returns_none() {
        let repo = InMemoryDeviceAggregateRepository::new();
        let found = repo
            .find_device_aggregate(FindDeviceAggregateRepoInput {
                device_name: "nope".to_string(),
            })
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_create_twice_fails_with_already_exists() {
        let repo = InMemoryDeviceAggregateRepository::new();
        repo.create_device_aggregate(seeded("dev-1")).await.unwrap();

        let result = repo.create_device_aggregate(seeded("dev-1")).await;

        assert!(matches!(
            result,
            Err(DomainError::DeviceAggregateAlreadyExists(name)) if name == "dev-1"
        ));
        assert_eq!(repo.count().await, 1);
    }

    #[tokio::test]
    async fn test_merge_missing_fails_with_not_found() {
        let repo = InMemoryDeviceAggregateRepository::new();
        let result = repo
            .merge_device_aggregate(MergeDeviceAggregateRepoInput {
                device_name: "ghost".to_string(),
                increment_total: 1,
                increment_failed: 0,
                append_operations: vec![OperationRecord::new("CREATE", true)],
            })
            .await;

        assert!(matches!(result, Err(DomainError::DeviceAggregateNotFound(_))));
        assert_eq!(repo.count().await, 0);
    }

    #[tokio::test]
    async fn test_merge_updates_counters_and_history() {
        let repo = InMemoryDeviceAggregateRepository::new();
        repo.create_device_aggregate(seeded("dev-1")).await.unwrap();

        repo.merge_device_aggregate(MergeDeviceAggregateRepoInput {
            device_name: "dev-1".to_string(),
            increment_total: 2,
            increment_failed: 1,
            append_operations: vec![
                OperationRecord::new("UPDATE", false),
                OperationRecord::new("DELETE", true),
            ],
        })
        .await
        .unwrap();

        let aggregate = repo
            .find_device_aggregate(FindDeviceAggregateRepoInput {
                device_name: "dev-1".to_string(),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(aggregate.total_operations, 3);
        assert_eq!(aggregate.failed_operations, 1);
        assert_eq!(aggregate.operations[1], OperationRecord::new("UPDATE", false));
        assert!(aggregate.is_consistent());
    }

    #[tokio::test]
    async fn test_exists_tracks_created_aggregates() {
        let repo = InMemoryDeviceAggregateRepository::new();
        let input = || FindDeviceAggregateRepoInput {
            device_name: "dev-1".to_string(),
        };
        assert!(!repo.device_aggregate_exists(input()).await.unwrap());

        repo.create_device_aggregate(seeded("dev-1")).await.unwrap();

        assert!(repo.device_aggregate_exists(input()).await.unwrap());
    }

    #[tokio::test]
    async fn test_inconsistent_merge_is_rejected_without_change() {
        let repo = InMemoryDeviceAggregateRepository::new();
        repo.create_device_aggregate(seeded("dev-1")).await.unwrap();

        let result = repo
            .merge_device_aggregate(MergeDeviceAggregateRepoInput {
                device_name: "dev-1".to_string(),
                increment_total: 1,
                increment_failed: 0,
                append_operations: vec![OperationRecord::new("DELETE", false)],
            })
            .await;

        assert!(matches!(result, Err(DomainError::ValidationError(_))));
        let aggregate = repo
            .find_device_aggregate(FindDeviceAggregateRepoInput {
                device_name: "dev-1".to_string(),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(aggregate.total_operations, 1);
        assert_eq!(aggregate.failed_operations, 0);
    }
}
