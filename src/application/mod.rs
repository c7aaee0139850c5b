//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（LlmEngine、BookStore、StageQueue、RunTracker）
//! - commands: CQRS 命令及处理器
//! - queries: CQRS 查询及处理器
//! - normalizer: JSON 规整器（有界修复流水线）
//! - retry: 有界重试策略
//! - error: 应用层错误定义

pub mod commands;
pub mod error;
pub mod normalizer;
pub mod ports;
pub mod queries;
pub mod retry;

// Re-exports
pub use commands::{
    // Book commands
    DeleteBook,
    ExpandParagraph,
    GenerateBook,
    GenerateTemplate,
    RefineBook,
    // Handlers
    handlers::{
        BookAccepted, DeleteBookHandler, ExpandParagraphHandler, GenerateBookHandler,
        GenerateTemplateHandler, RefineBookHandler, TemplateAccepted,
    },
};

pub use error::ApplicationError;
pub use normalizer::{JsonNormalizer, NormalizeError};
pub use retry::{RetryExhausted, RetryPolicy};

pub use ports::{
    // LLM engine
    GenerateRequest,
    GenerateResponse,
    LlmEnginePort,
    LlmError,
    // Repositories
    BookRecord,
    BookStorePort,
    BookTree,
    ChapterTree,
    NewBook,
    NewChapter,
    NewParagraph,
    ParagraphRecord,
    ParagraphUpdate,
    RepositoryError,
    // Run tracker
    PipelineStage,
    RunError,
    RunRecord,
    RunTrackerPort,
    // Stage queue
    DraftBookJob,
    ExpandParagraphJob,
    ExpandTemplateJob,
    RefineBookJob,
    StageJob,
    StageQueueError,
    StageQueuePort,
};

pub use queries::{
    // Book queries
    GetBook,
    GetRunStatus,
    ListBooks,
    // Handlers
    handlers::{GetBookHandler, GetRunStatusHandler, ListBooksHandler},
};
