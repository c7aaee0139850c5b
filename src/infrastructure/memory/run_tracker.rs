//! In-Memory Run Tracker Implementation

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::application::ports::{PipelineStage, RunError, RunRecord, RunTrackerPort};

/// 内存运行状态跟踪器
pub struct InMemoryRunTracker {
    /// document_id -> RunRecord
    runs: DashMap<Uuid, RunRecord>,
}

impl InMemoryRunTracker {
    pub fn new() -> Self {
        Self {
            runs: DashMap::new(),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl Default for InMemoryRunTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RunTrackerPort for InMemoryRunTracker {
    fn begin(&self, document_id: Uuid, stage: PipelineStage) {
        let now = Utc::now();
        self.runs.insert(
            document_id,
            RunRecord {
                document_id,
                stage,
                error_message: None,
                started_at: now,
                updated_at: now,
            },
        );
        tracing::debug!(document_id = %document_id, stage = stage.as_str(), "Run started");
    }

    fn set_stage(&self, document_id: Uuid, stage: PipelineStage) -> Result<(), RunError> {
        let mut run = self
            .runs
            .get_mut(&document_id)
            .ok_or(RunError::NotFound(document_id))?;

        let old_stage = run.stage;
        run.stage = stage;
        run.updated_at = Utc::now();

        tracing::debug!(
            document_id = %document_id,
            old_stage = old_stage.as_str(),
            new_stage = stage.as_str(),
            "Run stage changed"
        );
        Ok(())
    }

    fn set_failed(&self, document_id: Uuid, error: String) -> Result<(), RunError> {
        let mut run = self
            .runs
            .get_mut(&document_id)
            .ok_or(RunError::NotFound(document_id))?;

        run.stage = PipelineStage::Failed;
        run.error_message = Some(error);
        run.updated_at = Utc::now();
        Ok(())
    }

    fn get_stage(&self, document_id: Uuid) -> Option<PipelineStage> {
        self.runs.get(&document_id).map(|r| r.stage)
    }

    fn get_run(&self, document_id: Uuid) -> Option<RunRecord> {
        self.runs.get(&document_id).map(|r| r.clone())
    }

    fn cleanup(&self, document_id: Uuid) {
        if self.runs.remove(&document_id).is_some() {
            tracing::debug!(document_id = %document_id, "Run record cleaned up");
        }
    }
}
