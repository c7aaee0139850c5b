//! Template Command Handlers

use std::sync::Arc;
use uuid::Uuid;

use crate::application::commands::GenerateTemplate;
use crate::application::error::ApplicationError;
use crate::application::ports::{
    BookStorePort, ExpandTemplateJob, NewBook, PipelineStage, RunTrackerPort, StageJob,
    StageQueuePort,
};
use crate::domain::book::{BookSpec, Title};

/// 模板创建响应（立即返回，骨架展开异步进行）
#[derive(Debug, Clone)]
pub struct TemplateAccepted {
    pub id: Uuid,
    pub title: String,
    pub stage: PipelineStage,
}

/// GenerateTemplate Handler
///
/// 只负责落库模板记录并投递骨架展开作业；调用方拿到 id 后
/// 通过轮询段落状态或 WS 事件观察进度。
pub struct GenerateTemplateHandler {
    book_store: Arc<dyn BookStorePort>,
    run_tracker: Arc<dyn RunTrackerPort>,
    stage_queue: Arc<dyn StageQueuePort>,
}

impl GenerateTemplateHandler {
    pub fn new(
        book_store: Arc<dyn BookStorePort>,
        run_tracker: Arc<dyn RunTrackerPort>,
        stage_queue: Arc<dyn StageQueuePort>,
    ) -> Self {
        Self {
            book_store,
            run_tracker,
            stage_queue,
        }
    }

    pub async fn handle(
        &self,
        command: GenerateTemplate,
    ) -> Result<TemplateAccepted, ApplicationError> {
        let mut spec = BookSpec::new(
            command.title.clone(),
            command.informative_text,
            command.instructions,
        );
        spec.edition = command.edition;

        let title = Title::for_template(&command.title)?;
        let abstract_text = spec.to_abstract_json()?;

        let template_id = self
            .book_store
            .create_book(
                command.space_id,
                &NewBook {
                    title: title.as_str().to_string(),
                    abstract_text,
                },
            )
            .await?;

        self.run_tracker
            .begin(template_id, PipelineStage::TemplateRequested);

        self.stage_queue.submit(StageJob::ExpandTemplate(ExpandTemplateJob {
            space_id: command.space_id,
            template_id,
            spec,
        }))?;

        tracing::info!(
            template_id = %template_id,
            title = %title,
            "Template created (skeleton expansion queued)"
        );

        Ok(TemplateAccepted {
            id: template_id,
            title: title.as_str().to_string(),
            stage: PipelineStage::TemplateRequested,
        })
    }
}
