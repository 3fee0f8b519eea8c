use tracing::{error, info};

use common::domain::DeviceBatch;

use crate::error::RunError;
use crate::submitter::BatchSubmitter;

/// Totals for a run that submitted every batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub batches_sent: usize,
    pub operations_sent: usize,
}

/// Submits batches strictly in order, one in flight, halting at the first failure
pub struct IngestionRun<S: BatchSubmitter> {
    submitter: S,
}

impl<S: BatchSubmitter> IngestionRun<S> {
    pub fn new(submitter: S) -> Self {
        Self { submitter }
    }

    pub async fn run<I>(&mut self, batches: I) -> Result<RunSummary, RunError>
    where
        I: IntoIterator<Item = DeviceBatch>,
    {
        let mut summary = RunSummary::default();

        for (index, batch) in batches.into_iter().enumerate() {
            let device_name = batch.device_name.clone();

            match self.submitter.submit(batch).await {
                Ok(ack) => {
                    info!(
                        device_name = %ack.device_name,
                        operations = ack.operations_sent,
                        "data sent successfully"
                    );
                    summary.batches_sent += 1;
                    summary.operations_sent += ack.operations_sent;
                }
                Err(source) => {
                    error!(index, device_name = %device_name, "submission failed: {}", source);
                    return Err(RunError {
                        index,
                        device_name,
                        batches_sent: summary.batches_sent,
                        source,
                    });
                }
            }
        }

        info!(
            batches_sent = summary.batches_sent,
            operations_sent = summary.operations_sent,
            "ingestion run complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SubmissionError;
    use crate::submitter::{MockBatchSubmitter, SubmissionAck};
    use common::domain::OperationRecord;
    use mockall::Sequence;

    fn batch(name: &str, ops: usize) -> DeviceBatch {
        DeviceBatch::new(
            name,
            (0..ops)
                .map(|i| OperationRecord::new(format!("OP{i}"), true))
                .collect(),
        )
    }

    fn ack(batch: &DeviceBatch) -> Result<SubmissionAck, SubmissionError> {
        Ok(SubmissionAck {
            device_name: batch.device_name.clone(),
            operations_sent: batch.operations.len(),
        })
    }

    #[tokio::test]
    async fn test_submits_in_source_order() {
        let mut seq = Sequence::new();
        let mut submitter = MockBatchSubmitter::new();
        for name in ["first", "second", "third"] {
            submitter
                .expect_submit()
                .withf(move |b: &DeviceBatch| b.device_name == name)
                .times(1)
                .in_sequence(&mut seq)
                .returning(|b| ack(&b));
        }

        let summary = IngestionRun::new(submitter)
            .run(vec![batch("first", 2), batch("second", 0), batch("third", 3)])
            .await
            .unwrap();

        assert_eq!(
            summary,
            RunSummary {
                batches_sent: 3,
                operations_sent: 5
            }
        );
    }

    #[tokio::test]
    async fn test_halts_on_first_failure() {
        let mut seq = Sequence::new();
        let mut submitter = MockBatchSubmitter::new();
        submitter
            .expect_submit()
            .withf(|b: &DeviceBatch| b.device_name == "ok")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|b| ack(&b));
        submitter
            .expect_submit()
            .withf(|b: &DeviceBatch| b.device_name == "broken")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(SubmissionError::Transport("connection refused".into())));

        let err = IngestionRun::new(submitter)
            .run(vec![batch("ok", 1), batch("broken", 1), batch("never", 1)])
            .await
            .unwrap_err();

        assert_eq!(err.index, 1);
        assert_eq!(err.device_name, "broken");
        assert_eq!(err.batches_sent, 1);
        assert!(matches!(err.source, SubmissionError::Transport(_)));
    }

    #[tokio::test]
    async fn test_empty_source_sends_nothing() {
        let submitter = MockBatchSubmitter::new();

        let summary = IngestionRun::new(submitter).run(Vec::new()).await.unwrap();

        assert_eq!(summary, RunSummary::default());
    }
}
