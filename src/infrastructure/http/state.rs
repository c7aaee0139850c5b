//! Application State
//!
//! 包含所有 Command/Query Handlers 的应用状态

use std::sync::Arc;

use crate::application::{
    // Command handlers
    DeleteBookHandler, ExpandParagraphHandler, GenerateBookHandler, GenerateTemplateHandler,
    RefineBookHandler,
    // Query handlers
    GetBookHandler, GetRunStatusHandler, ListBooksHandler,
    // Ports
    BookStorePort, LlmEnginePort, RunTrackerPort, StageQueuePort,
};
use crate::infrastructure::events::EventPublisher;

/// 应用状态
///
/// StageQueue 和 RunTracker 为内存实现；重负载全部在 PipelineWorker
pub struct AppState {
    // ========== Ports ==========
    pub book_store: Arc<dyn BookStorePort>,
    pub llm_engine: Arc<dyn LlmEnginePort>,
    pub run_tracker: Arc<dyn RunTrackerPort>,
    pub stage_queue: Arc<dyn StageQueuePort>,
    pub event_publisher: Arc<EventPublisher>,

    // ========== Command Handlers ==========
    pub generate_template_handler: GenerateTemplateHandler,
    pub generate_book_handler: GenerateBookHandler,
    pub refine_book_handler: RefineBookHandler,
    pub expand_paragraph_handler: ExpandParagraphHandler,
    pub delete_book_handler: DeleteBookHandler,

    // ========== Query Handlers ==========
    pub get_book_handler: GetBookHandler,
    pub list_books_handler: ListBooksHandler,
    pub get_run_status_handler: GetRunStatusHandler,
}

impl AppState {
    /// 创建应用状态
    pub fn new(
        book_store: Arc<dyn BookStorePort>,
        llm_engine: Arc<dyn LlmEnginePort>,
        run_tracker: Arc<dyn RunTrackerPort>,
        stage_queue: Arc<dyn StageQueuePort>,
        event_publisher: Arc<EventPublisher>,
    ) -> Self {
        Self {
            // Ports
            book_store: book_store.clone(),
            llm_engine: llm_engine.clone(),
            run_tracker: run_tracker.clone(),
            stage_queue: stage_queue.clone(),
            event_publisher: event_publisher.clone(),

            // Command handlers
            generate_template_handler: GenerateTemplateHandler::new(
                book_store.clone(),
                run_tracker.clone(),
                stage_queue.clone(),
            ),
            generate_book_handler: GenerateBookHandler::new(
                book_store.clone(),
                run_tracker.clone(),
                stage_queue.clone(),
            ),
            refine_book_handler: RefineBookHandler::new(
                book_store.clone(),
                run_tracker.clone(),
                stage_queue.clone(),
            ),
            expand_paragraph_handler: ExpandParagraphHandler::new(
                book_store.clone(),
                stage_queue.clone(),
            ),
            delete_book_handler: DeleteBookHandler::new(book_store.clone(), run_tracker.clone()),

            // Query handlers
            get_book_handler: GetBookHandler::new(book_store.clone()),
            list_books_handler: ListBooksHandler::new(book_store.clone()),
            get_run_status_handler: GetRunStatusHandler::new(run_tracker.clone()),
        }
    }
}
