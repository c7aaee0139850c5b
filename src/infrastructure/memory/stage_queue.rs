//! In-Memory Stage Queue Implementation
//!
//! mpsc 通道实现阶段作业投递，消费端为 PipelineWorker

use tokio::sync::mpsc;

use crate::application::ports::{StageJob, StageQueueError, StageQueuePort};

/// 通道阶段队列
pub struct ChannelStageQueue {
    queue_sender: mpsc::Sender<StageJob>,
}

impl ChannelStageQueue {
    pub fn new(queue_sender: mpsc::Sender<StageJob>) -> Self {
        Self { queue_sender }
    }
}

impl StageQueuePort for ChannelStageQueue {
    fn submit(&self, job: StageJob) -> Result<(), StageQueueError> {
        let kind = job.kind();
        let document_id = job.document_id();

        self.queue_sender.try_send(job).map_err(|e| {
            tracing::error!(
                kind = kind,
                document_id = %document_id,
                error = %e,
                "Failed to enqueue stage job"
            );
            StageQueueError::Unavailable(e.to_string())
        })?;

        tracing::debug!(kind = kind, document_id = %document_id, "Stage job submitted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::RefineBookJob;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_submit_delivers_job() {
        let (tx, mut rx) = mpsc::channel(8);
        let queue = ChannelStageQueue::new(tx);

        let book_id = Uuid::new_v4();
        queue
            .submit(StageJob::RefineBook(RefineBookJob {
                space_id: Uuid::new_v4(),
                book_id,
            }))
            .unwrap();

        let job = rx.try_recv().unwrap();
        assert_eq!(job.document_id(), book_id);
        assert_eq!(job.kind(), "refine_book");
    }

    #[tokio::test]
    async fn test_submit_fails_when_consumer_gone() {
        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        let queue = ChannelStageQueue::new(tx);

        let result = queue.submit(StageJob::RefineBook(RefineBookJob {
            space_id: Uuid::new_v4(),
            book_id: Uuid::new_v4(),
        }));
        assert!(result.is_err());
    }
}
