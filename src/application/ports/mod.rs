//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod llm_engine;
mod repositories;
mod run_tracker;
mod stage_queue;

pub use llm_engine::{GenerateRequest, GenerateResponse, LlmEnginePort, LlmError};
pub use repositories::{
    BookRecord, BookStorePort, BookTree, ChapterTree, NewBook, NewChapter, NewParagraph,
    ParagraphRecord, ParagraphUpdate, RepositoryError,
};
pub use run_tracker::{PipelineStage, RunError, RunRecord, RunTrackerPort};
pub use stage_queue::{
    DraftBookJob, ExpandParagraphJob, ExpandTemplateJob, RefineBookJob, StageJob, StageQueueError,
    StageQueuePort,
};
