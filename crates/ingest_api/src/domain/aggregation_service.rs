use common::domain::{
    CreateDeviceAggregateRepoInput, DeviceAggregate, DeviceAggregateRepository, DeviceBatch,
    DomainError, DomainResult, FindDeviceAggregateRepoInput, MergeDeviceAggregateRepoInput,
};
use common::garde::validate_struct;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

/// Budget for a whole ingest request unless configured otherwise
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Which write an ingest ended up applying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Created,
    Merged,
}

/// Acknowledgment returned once the store has applied a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestAck {
    pub device_name: String,
    pub outcome: IngestOutcome,
    pub operations_added: i64,
    pub failed_operations_added: i64,
}

/// Merges device batches into per-device aggregates.
///
/// The lookup decides between create and merge; each write is one atomic repository call.
/// Two first-contact batches for the same new device can both miss the lookup. The loser's
/// create fails with `DeviceAggregateAlreadyExists` and its batch is applied as a merge, so
/// the device still ends up with exactly one aggregate holding both batches.
///
/// `store_timeout` bounds the whole request: every store call of one ingest shares a single
/// deadline.
pub struct AggregationService {
    repository: Arc<dyn DeviceAggregateRepository>,
    store_timeout: Duration,
}

impl AggregationService {
    pub fn new(repository: Arc<dyn DeviceAggregateRepository>, store_timeout: Duration) -> Self {
        Self {
            repository,
            store_timeout,
        }
    }

    /// Merge one batch into its device's aggregate, creating the aggregate on first contact.
    ///
    /// Store failures are returned as-is; nothing is retried and a failed lookup never
    /// falls through to the create path.
    #[instrument(
        skip(self, batch),
        fields(device_name = %batch.device_name, batch_operations = batch.operations.len())
    )]
    pub async fn ingest(&self, batch: DeviceBatch) -> DomainResult<IngestAck> {
        validate_struct(&batch)?;

        let deadline = Instant::now() + self.store_timeout;
        let device_name = batch.device_name.clone();
        let operations_added = batch.total_operations();
        let failed_operations_added = batch.failed_operations();

        let exists = self
            .before_deadline(
                deadline,
                "find",
                self.repository
                    .device_aggregate_exists(FindDeviceAggregateRepoInput {
                        device_name: device_name.clone(),
                    }),
            )
            .await?;

        let outcome = if exists {
            debug!("device aggregate exists, merging");
            self.merge(deadline, batch).await?;
            IngestOutcome::Merged
        } else {
            self.create_or_merge(deadline, batch).await?
        };

        info!(
            outcome = ?outcome,
            operations_added,
            failed_operations_added,
            "batch ingested"
        );

        Ok(IngestAck {
            device_name,
            outcome,
            operations_added,
            failed_operations_added,
        })
    }

    async fn create_or_merge(
        &self,
        deadline: Instant,
        batch: DeviceBatch,
    ) -> DomainResult<IngestOutcome> {
        let input = CreateDeviceAggregateRepoInput {
            aggregate: DeviceAggregate::seed(batch.clone()),
        };

        match self
            .before_deadline(
                deadline,
                "create",
                self.repository.create_device_aggregate(input),
            )
            .await
        {
            Ok(_) => Ok(IngestOutcome::Created),
            Err(DomainError::DeviceAggregateAlreadyExists(_)) => {
                debug!("device aggregate created concurrently, merging instead");
                self.merge(deadline, batch).await?;
                Ok(IngestOutcome::Merged)
            }
            Err(e) => Err(e),
        }
    }

    async fn merge(&self, deadline: Instant, batch: DeviceBatch) -> DomainResult<()> {
        let input = MergeDeviceAggregateRepoInput::from(batch);
        self.before_deadline(
            deadline,
            "merge",
            self.repository.merge_device_aggregate(input),
        )
        .await
    }

    /// `operation` names the stage that was running when the deadline passed.
    async fn before_deadline<T>(
        &self,
        deadline: Instant,
        operation: &'static str,
        future: impl Future<Output = DomainResult<T>>,
    ) -> DomainResult<T> {
        tokio::time::timeout_at(deadline, future)
            .await
            .map_err(|_| DomainError::StoreTimeout {
                operation,
                timeout: self.store_timeout,
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slow_repository::SlowRepository;
    use common::domain::{InMemoryDeviceAggregateRepository, OperationRecord};
    use common::MockDeviceAggregateRepository;

    fn batch(name: &str, ops: &[(&str, bool)]) -> DeviceBatch {
        DeviceBatch::new(
            name,
            ops.iter()
                .map(|(kind, ok)| OperationRecord::new(*kind, *ok))
                .collect(),
        )
    }

    fn service(repository: Arc<dyn DeviceAggregateRepository>) -> AggregationService {
        AggregationService::new(repository, DEFAULT_STORE_TIMEOUT)
    }

    async fn stored(
        repo: &InMemoryDeviceAggregateRepository,
        name: &str,
    ) -> Option<DeviceAggregate> {
        repo.find_device_aggregate(FindDeviceAggregateRepoInput {
            device_name: name.to_string(),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_new_device_is_created_from_batch() {
        let mut mock_repo = MockDeviceAggregateRepository::new();
        mock_repo
            .expect_device_aggregate_exists()
            .withf(|input: &FindDeviceAggregateRepoInput| input.device_name == "testDevice")
            .times(1)
            .returning(|_| Ok(false));
        mock_repo
            .expect_create_device_aggregate()
            .withf(|input: &CreateDeviceAggregateRepoInput| {
                input.aggregate.total_operations == 2
                    && input.aggregate.failed_operations == 1
                    && input.aggregate.operations.len() == 2
            })
            .times(1)
            .returning(|input| Ok(input.aggregate));
        mock_repo.expect_merge_device_aggregate().times(0);

        let ack = service(Arc::new(mock_repo))
            .ingest(batch("testDevice", &[("CREATE", true), ("UPDATE", false)]))
            .await
            .unwrap();

        assert_eq!(ack.outcome, IngestOutcome::Created);
        assert_eq!(ack.operations_added, 2);
        assert_eq!(ack.failed_operations_added, 1);
    }

    #[tokio::test]
    async fn test_existing_device_is_merged() {
        let mut mock_repo = MockDeviceAggregateRepository::new();
        mock_repo
            .expect_device_aggregate_exists()
            .times(1)
            .returning(|_| Ok(true));
        mock_repo.expect_find_device_aggregate().times(0);
        mock_repo.expect_create_device_aggregate().times(0);
        mock_repo
            .expect_merge_device_aggregate()
            .withf(|input: &MergeDeviceAggregateRepoInput| {
                input.device_name == "testDevice"
                    && input.increment_total == 1
                    && input.increment_failed == 1
                    && input.append_operations == vec![OperationRecord::new("DELETE", false)]
            })
            .times(1)
            .returning(|_| Ok(()));

        let ack = service(Arc::new(mock_repo))
            .ingest(batch("testDevice", &[("DELETE", false)]))
            .await
            .unwrap();

        assert_eq!(ack.outcome, IngestOutcome::Merged);
    }

    #[tokio::test]
    async fn test_lookup_failure_never_creates() {
        let mut mock_repo = MockDeviceAggregateRepository::new();
        mock_repo
            .expect_device_aggregate_exists()
            .times(1)
            .returning(|_| Err(DomainError::StoreUnavailable("connection refused".into())));
        mock_repo.expect_create_device_aggregate().times(0);
        mock_repo.expect_merge_device_aggregate().times(0);

        let result = service(Arc::new(mock_repo))
            .ingest(batch("testDevice", &[("CREATE", true)]))
            .await;

        assert!(matches!(result, Err(DomainError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn test_create_conflict_falls_back_to_merge() {
        let mut mock_repo = MockDeviceAggregateRepository::new();
        mock_repo
            .expect_device_aggregate_exists()
            .times(1)
            .returning(|_| Ok(false));
        mock_repo
            .expect_create_device_aggregate()
            .times(1)
            .returning(|input| {
                Err(DomainError::DeviceAggregateAlreadyExists(
                    input.aggregate.device_name,
                ))
            });
        mock_repo
            .expect_merge_device_aggregate()
            .withf(|input: &MergeDeviceAggregateRepoInput| input.increment_total == 1)
            .times(1)
            .returning(|_| Ok(()));

        let ack = service(Arc::new(mock_repo))
            .ingest(batch("raced", &[("CREATE", true)]))
            .await
            .unwrap();

        assert_eq!(ack.outcome, IngestOutcome::Merged);
    }

    #[tokio::test]
    async fn test_create_failure_is_propagated_without_merge() {
        let mut mock_repo = MockDeviceAggregateRepository::new();
        mock_repo
            .expect_device_aggregate_exists()
            .times(1)
            .returning(|_| Ok(false));
        mock_repo
            .expect_create_device_aggregate()
            .times(1)
            .returning(|_| Err(DomainError::RepositoryError(anyhow::anyhow!("disk full"))));
        mock_repo.expect_merge_device_aggregate().times(0);

        let result = service(Arc::new(mock_repo))
            .ingest(batch("testDevice", &[("CREATE", true)]))
            .await;

        assert!(matches!(result, Err(DomainError::RepositoryError(_))));
    }

    #[tokio::test]
    async fn test_invalid_batch_never_reaches_store() {
        let mock_repo = MockDeviceAggregateRepository::new();

        let result = service(Arc::new(mock_repo))
            .ingest(batch("", &[("CREATE", true)]))
            .await;

        assert!(matches!(result, Err(DomainError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_slow_store_times_out() {
        let service = AggregationService::new(
            Arc::new(SlowRepository {
                delay: Duration::from_secs(5),
                create_conflicts: false,
            }),
            Duration::from_millis(50),
        );

        let result = service.ingest(batch("testDevice", &[("CREATE", true)])).await;

        assert!(matches!(
            result,
            Err(DomainError::StoreTimeout {
                operation: "find",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_store_timeout_bounds_the_whole_request() {
        // Every call fits the budget on its own; lookup plus create does not.
        let service = AggregationService::new(
            Arc::new(SlowRepository {
                delay: Duration::from_millis(80),
                create_conflicts: true,
            }),
            Duration::from_millis(100),
        );
        let started = tokio::time::Instant::now();

        let result = service.ingest(batch("testDevice", &[("CREATE", true)])).await;

        assert!(matches!(
            result,
            Err(DomainError::StoreTimeout {
                operation: "create",
                ..
            })
        ));
        assert!(started.elapsed() < Duration::from_millis(160));
    }

    #[tokio::test]
    async fn test_lookup_create_and_merge_within_budget_succeed() {
        let service = AggregationService::new(
            Arc::new(SlowRepository {
                delay: Duration::from_millis(10),
                create_conflicts: true,
            }),
            Duration::from_secs(2),
        );

        let ack = service
            .ingest(batch("testDevice", &[("CREATE", true)]))
            .await
            .unwrap();

        assert_eq!(ack.outcome, IngestOutcome::Merged);
    }

    #[tokio::test]
    async fn test_create_then_merge_scenario() {
        let repo = InMemoryDeviceAggregateRepository::new();
        let service = service(Arc::new(repo.clone()));

        service
            .ingest(batch("testDevice", &[("CREATE", true), ("UPDATE", false)]))
            .await
            .unwrap();
        let first = stored(&repo, "testDevice").await.unwrap();
        assert_eq!(first.total_operations, 2);
        assert_eq!(first.failed_operations, 1);
        assert_eq!(
            first.operations,
            vec![
                OperationRecord::new("CREATE", true),
                OperationRecord::new("UPDATE", false)
            ]
        );

        service
            .ingest(batch("testDevice", &[("DELETE", false)]))
            .await
            .unwrap();
        let second = stored(&repo, "testDevice").await.unwrap();
        assert_eq!(second.total_operations, 3);
        assert_eq!(second.failed_operations, 2);
        assert_eq!(
            second.operations,
            vec![
                OperationRecord::new("CREATE", true),
                OperationRecord::new("UPDATE", false),
                OperationRecord::new("DELETE", false)
            ]
        );
        assert_eq!(repo.count().await, 1);
    }

    #[tokio::test]
    async fn test_empty_batch_leaves_counts_unchanged() {
        let repo = InMemoryDeviceAggregateRepository::new();
        let service = service(Arc::new(repo.clone()));
        service
            .ingest(batch("quiet", &[("CREATE", false)]))
            .await
            .unwrap();
        let before = stored(&repo, "quiet").await.unwrap();

        let ack = service.ingest(batch("quiet", &[])).await.unwrap();

        assert_eq!(ack.outcome, IngestOutcome::Merged);
        assert_eq!(stored(&repo, "quiet").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_empty_first_batch_creates_empty_aggregate() {
        let repo = InMemoryDeviceAggregateRepository::new();

        service(Arc::new(repo.clone()))
            .ingest(batch("fresh", &[]))
            .await
            .unwrap();

        let aggregate = stored(&repo, "fresh").await.unwrap();
        assert_eq!(aggregate.total_operations, 0);
        assert_eq!(aggregate.failed_operations, 0);
        assert!(aggregate.operations.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_contact_yields_one_aggregate() {
        let repo = InMemoryDeviceAggregateRepository::new();
        let service = Arc::new(service(Arc::new(repo.clone())));

        let mut handles = Vec::new();
        for i in 0..16 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service
                    .ingest(batch("burst", &[("PING", i % 2 == 0)]))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let aggregate = stored(&repo, "burst").await.unwrap();
        assert_eq!(repo.count().await, 1);
        assert_eq!(aggregate.total_operations, 16);
        assert_eq!(aggregate.failed_operations, 8);
        assert!(aggregate.is_consistent());
    }

    mod slow_repository {
        use super::*;

        /// Repository whose every call sleeps for `delay`. The device is never found and, when
        /// `create_conflicts` is set, create loses a first-contact race so ingest must also merge.
        pub struct SlowRepository {
            pub delay: Duration,
            pub create_conflicts: bool,
        }

        #[async_trait::async_trait]
        impl DeviceAggregateRepository for SlowRepository {
            async fn find_device_aggregate(
                &self,
                _input: FindDeviceAggregateRepoInput,
            ) -> DomainResult<Option<DeviceAggregate>> {
                tokio::time::sleep(self.delay).await;
                Ok(None)
            }

            async fn device_aggregate_exists(
                &self,
                _input: FindDeviceAggregateRepoInput,
            ) -> DomainResult<bool> {
                tokio::time::sleep(self.delay).await;
                Ok(false)
            }

            async fn create_device_aggregate(
                &self,
                input: CreateDeviceAggregateRepoInput,
            ) -> DomainResult<DeviceAggregate> {
                tokio::time::sleep(self.delay).await;
                if self.create_conflicts {
                    return Err(DomainError::DeviceAggregateAlreadyExists(
                        input.aggregate.device_name,
                    ));
                }
                Ok(input.aggregate)
            }

            async fn merge_device_aggregate(
                &self,
                _input: MergeDeviceAggregateRepoInput,
            ) -> DomainResult<()> {
                tokio::time::sleep(self.delay).await;
                Ok(())
            }
        }
    }
}
