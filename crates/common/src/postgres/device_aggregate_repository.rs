use crate::domain::{
    CreateDeviceAggregateRepoInput, DeviceAggregate, DeviceAggregateRepository, DomainError,
    DomainResult, FindDeviceAggregateRepoInput, MergeDeviceAggregateRepoInput, OperationRecord,
};
use crate::postgres::PostgresClient;
use anyhow::Context;
use async_trait::async_trait;
use tokio_postgres::types::Json;
use tokio_postgres::Row;
use tracing::{debug, instrument};

/// Device aggregate row as stored in the `devices` table
#[derive(Debug, Clone)]
pub struct DeviceAggregateRow {
    pub device_name: String,
    pub total_operations: i64,
    pub failed_operations: i64,
    pub operations: Vec<OperationRecord>,
}

impl TryFrom<&Row> for DeviceAggregateRow {
    type Error = anyhow::Error;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        let Json(operations): Json<Vec<OperationRecord>> = row
            .try_get("operations")
            .context("decoding operations history")?;

        Ok(Self {
            device_name: row.try_get("device_name")?,
            total_operations: row.try_get("total_operations")?,
            failed_operations: row.try_get("failed_operations")?,
            operations,
        })
    }
}

impl From<DeviceAggregateRow> for DeviceAggregate {
    fn from(row: DeviceAggregateRow) -> Self {
        DeviceAggregate {
            device_name: row.device_name,
            total_operations: row.total_operations,
            failed_operations: row.failed_operations,
            operations: row.operations,
        }
    }
}

/// PostgreSQL implementation of DeviceAggregateRepository.
///
/// Create is a single INSERT guarded by the `device_name` primary key. Merge is a single
/// UPDATE that increments both counters and appends to the JSONB history, so PostgreSQL's
/// row lock makes the composite atomic per device.
#[derive(Clone)]
pub struct PostgresDeviceAggregateRepository {
    client: PostgresClient,
}

impl PostgresDeviceAggregateRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }

    async fn connection(&self) -> DomainResult<deadpool_postgres::Client> {
        self.client
            .get_connection()
            .await
            .map_err(|e| DomainError::StoreUnavailable(format!("{:#}", e)))
    }
}

/// Separates connectivity failures from statement failures. Only the former are
/// `StoreUnavailable`; a lookup must never mistake either for "not found".
fn classify_postgres_error(err: tokio_postgres::Error) -> DomainError {
    if err.as_db_error().is_some() {
        return DomainError::RepositoryError(err.into());
    }

    let is_io = std::error::Error::source(&err)
        .map(|source| source.is::<std::io::Error>())
        .unwrap_or(false);

    if err.is_closed() || is_io {
        DomainError::StoreUnavailable(err.to_string())
    } else {
        DomainError::RepositoryError(err.into())
    }
}

#[async_trait]
impl DeviceAggregateRepository for PostgresDeviceAggregateRepository {
    #[instrument(skip(self, input), fields(device_name = %input.device_name))]
    async fn find_device_aggregate(
        &self,
        input: FindDeviceAggregateRepoInput,
    ) -> DomainResult<Option<DeviceAggregate>> {
        let conn = self.connection().await?;

        let row = conn
            .query_opt(
                "SELECT device_name, total_operations, failed_operations, operations
                 FROM devices
                 WHERE device_name = $1",
                &[&input.device_name],
            )
            .await
            .map_err(classify_postgres_error)?;

        match row {
            Some(row) => {
                let aggregate_row = DeviceAggregateRow::try_from(&row)?;
                debug!(
                    total_operations = aggregate_row.total_operations,
                    "found device aggregate"
                );
                Ok(Some(aggregate_row.into()))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, input), fields(device_name = %input.device_name))]
    async fn device_aggregate_exists(
        &self,
        input: FindDeviceAggregateRepoInput,
    ) -> DomainResult<bool> {
        let conn = self.connection().await?;

        let row = conn
            .query_one(
                "SELECT EXISTS(SELECT 1 FROM devices WHERE device_name = $1)",
                &[&input.device_name],
            )
            .await
            .map_err(classify_postgres_error)?;

        let exists: bool = row
            .try_get(0)
            .context("decoding existence flag")
            .map_err(DomainError::RepositoryError)?;
        Ok(exists)
    }

    #[instrument(skip(self, input), fields(device_name = %input.aggregate.device_name))]
    async fn create_device_aggregate(
        &self,
        input: CreateDeviceAggregateRepoInput,
    ) -> DomainResult<DeviceAggregate> {
        let conn = self.connection().await?;
        let aggregate = input.aggregate;

        let result = conn
            .execute(
                "INSERT INTO devices (device_name, total_operations, failed_operations, operations)
                 VALUES ($1, $2, $3, $4)",
                &[
                    &aggregate.device_name,
                    &aggregate.total_operations,
                    &aggregate.failed_operations,
                    &Json(&aggregate.operations),
                ],
            )
            .await;

        if let Err(e) = result {
            if let Some(db_err) = e.as_db_error() {
                // PostgreSQL error code 23505 is unique_violation
                if db_err.code().code() == "23505" {
                    return Err(DomainError::DeviceAggregateAlreadyExists(
                        aggregate.device_name,
                    ));
                }
            }
            return Err(classify_postgres_error(e));
        }

        debug!("created device aggregate: {}", aggregate.device_name);
        Ok(aggregate)
    }

    #[instrument(
        skip(self, input),
        fields(
            device_name = %input.device_name,
            increment_total = input.increment_total,
            increment_failed = input.increment_failed
        )
    )]
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

        let conn = self.connection().await?;

        let updated = conn
            .execute(
                "UPDATE devices
                 SET total_operations = total_operations + $2,
                     failed_operations = failed_operations + $3,
                     operations = operations || $4::jsonb
                 WHERE device_name = $1",
                &[
                    &input.device_name,
                    &input.increment_total,
                    &input.increment_failed,
                    &Json(&input.append_operations),
                ],
            )
            .await
            .map_err(classify_postgres_error)?;

        if updated == 0 {
            return Err(DomainError::DeviceAggregateNotFound(input.device_name));
        }

        debug!("merged batch into device aggregate: {}", input.device_name);
        Ok(())
    }
}
