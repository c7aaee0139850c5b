//! Book Command Handlers

use std::sync::Arc;
use uuid::Uuid;

use crate::application::commands::{DeleteBook, ExpandParagraph, GenerateBook, RefineBook};
use crate::application::error::ApplicationError;
use crate::application::ports::{
    BookStorePort, DraftBookJob, ExpandParagraphJob, NewBook, PipelineStage, RefineBookJob,
    RunTrackerPort, StageJob, StageQueuePort,
};
use crate::domain::book::{BookSpec, Title};

/// 成书创建响应（立即返回，生成/润色异步进行）
#[derive(Debug, Clone)]
pub struct BookAccepted {
    pub id: Uuid,
    pub title: String,
    pub stage: PipelineStage,
}

// ============================================================================
// GenerateBook
// ============================================================================

/// GenerateBook Handler
///
/// 读取模板、复制生成规格、创建成书记录，然后把初稿作业交给
/// 流水线 worker。入口契约：立即返回新书 id，不等待任何生成。
pub struct GenerateBookHandler {
    book_store: Arc<dyn BookStorePort>,
    run_tracker: Arc<dyn RunTrackerPort>,
    stage_queue: Arc<dyn StageQueuePort>,
}

impl GenerateBookHandler {
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

    pub async fn handle(&self, command: GenerateBook) -> Result<BookAccepted, ApplicationError> {
        let template = self
            .book_store
            .get_book(command.space_id, command.template_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Template", command.template_id))?;

        if template.chapters.is_empty() {
            return Err(ApplicationError::invalid_state(format!(
                "Template {} has no chapters yet",
                command.template_id
            )));
        }

        // abstract 原样复制（已消毒），规格解析后随作业传递
        let spec = BookSpec::from_abstract_json(&template.abstract_text)?;
        let title = Title::for_book(&template.title)?;

        let book_id = self
            .book_store
            .create_book(
                command.space_id,
                &NewBook {
                    title: title.as_str().to_string(),
                    abstract_text: template.abstract_text.clone(),
                },
            )
            .await?;

        self.run_tracker
            .begin(book_id, PipelineStage::ChaptersExpanding);

        self.stage_queue.submit(StageJob::DraftBook(DraftBookJob {
            space_id: command.space_id,
            template_id: command.template_id,
            book_id,
            spec,
        }))?;

        tracing::info!(
            book_id = %book_id,
            template_id = %command.template_id,
            title = %title,
            "Book created (draft generation queued)"
        );

        Ok(BookAccepted {
            id: book_id,
            title: title.as_str().to_string(),
            stage: PipelineStage::ChaptersExpanding,
        })
    }
}

// ============================================================================
// RefineBook
// ============================================================================

/// RefineBook Handler
pub struct RefineBookHandler {
    book_store: Arc<dyn BookStorePort>,
    run_tracker: Arc<dyn RunTrackerPort>,
    stage_queue: Arc<dyn StageQueuePort>,
}

impl RefineBookHandler {
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

    pub async fn handle(&self, command: RefineBook) -> Result<BookAccepted, ApplicationError> {
        let book = self
            .book_store
            .get_book(command.space_id, command.book_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Book", command.book_id))?;

        self.run_tracker.begin(command.book_id, PipelineStage::Refining);

        self.stage_queue.submit(StageJob::RefineBook(RefineBookJob {
            space_id: command.space_id,
            book_id: command.book_id,
        }))?;

        tracing::info!(
            book_id = %command.book_id,
            title = %book.title,
            "Refinement sweep queued"
        );

        Ok(BookAccepted {
            id: command.book_id,
            title: book.title,
            stage: PipelineStage::Refining,
        })
    }
}

// ============================================================================
// ExpandParagraph
// ============================================================================

/// ExpandParagraph Handler - 单段重写
pub struct ExpandParagraphHandler {
    book_store: Arc<dyn BookStorePort>,
    stage_queue: Arc<dyn StageQueuePort>,
}

impl ExpandParagraphHandler {
    pub fn new(book_store: Arc<dyn BookStorePort>, stage_queue: Arc<dyn StageQueuePort>) -> Self {
        Self {
            book_store,
            stage_queue,
        }
    }

    pub async fn handle(&self, command: ExpandParagraph) -> Result<(), ApplicationError> {
        let book = self
            .book_store
            .get_book(command.space_id, command.book_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Book", command.book_id))?;

        let chapter = book
            .chapters
            .iter()
            .find(|c| c.id == command.chapter_id)
            .ok_or_else(|| ApplicationError::not_found("Chapter", command.chapter_id))?;

        if !chapter.paragraphs.iter().any(|p| p.id == command.paragraph_id) {
            return Err(ApplicationError::not_found(
                "Paragraph",
                command.paragraph_id,
            ));
        }

        self.stage_queue
            .submit(StageJob::ExpandParagraph(ExpandParagraphJob {
                space_id: command.space_id,
                book_id: command.book_id,
                chapter_id: command.chapter_id,
                paragraph_id: command.paragraph_id,
            }))?;

        tracing::info!(
            book_id = %command.book_id,
            paragraph_id = %command.paragraph_id,
            "Paragraph expansion queued"
        );

        Ok(())
    }
}

// ============================================================================
// DeleteBook
// ============================================================================

/// DeleteBook Handler
pub struct DeleteBookHandler {
    book_store: Arc<dyn BookStorePort>,
    run_tracker: Arc<dyn RunTrackerPort>,
}

impl DeleteBookHandler {
    pub fn new(book_store: Arc<dyn BookStorePort>, run_tracker: Arc<dyn RunTrackerPort>) -> Self {
        Self {
            book_store,
            run_tracker,
        }
    }

    pub async fn handle(&self, command: DeleteBook) -> Result<(), ApplicationError> {
        let book = self
            .book_store
            .get_book(command.space_id, command.book_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Book", command.book_id))?;

        self.book_store
            .delete_book(command.space_id, command.book_id)
            .await?;
        self.run_tracker.cleanup(command.book_id);

        tracing::info!(
            book_id = %command.book_id,
            title = %book.title,
            "Book deleted"
        );

        Ok(())
    }
}
