//! Stage Queue Port - 流水线阶段投递
//!
//! 阶段之间通过显式的作业队列衔接：上一阶段只负责投递作业，
//! 下一阶段作为独立可调度、独立可重试的单元被 worker 消费。
//! 一个阶段内部失败不需要重跑之前的阶段。

use thiserror::Error;
use uuid::Uuid;

use crate::domain::book::BookSpec;

/// Stage Queue 错误
#[derive(Debug, Error)]
pub enum StageQueueError {
    #[error("Stage queue full or closed: {0}")]
    Unavailable(String),
}

/// 模板骨架展开作业
#[derive(Debug, Clone)]
pub struct ExpandTemplateJob {
    pub space_id: Uuid,
    pub template_id: Uuid,
    pub spec: BookSpec,
}

/// 成书初稿作业
#[derive(Debug, Clone)]
pub struct DraftBookJob {
    pub space_id: Uuid,
    pub template_id: Uuid,
    pub book_id: Uuid,
    pub spec: BookSpec,
}

/// 全书润色作业
#[derive(Debug, Clone)]
pub struct RefineBookJob {
    pub space_id: Uuid,
    pub book_id: Uuid,
}

/// 单段重写作业
#[derive(Debug, Clone)]
pub struct ExpandParagraphJob {
    pub space_id: Uuid,
    pub book_id: Uuid,
    pub chapter_id: Uuid,
    pub paragraph_id: Uuid,
}

/// 流水线阶段作业
#[derive(Debug, Clone)]
pub enum StageJob {
    /// 模板骨架：规划章节与段落种子
    ExpandTemplate(ExpandTemplateJob),
    /// 初稿：按模板生成每个段落正文
    DraftBook(DraftBookJob),
    /// 润色：邻居感知的全书重写
    RefineBook(RefineBookJob),
    /// 单段重写
    ExpandParagraph(ExpandParagraphJob),
}

impl StageJob {
    /// 作业作用于哪个文档（模板或成书）
    pub fn document_id(&self) -> Uuid {
        match self {
            StageJob::ExpandTemplate(job) => job.template_id,
            StageJob::DraftBook(job) => job.book_id,
            StageJob::RefineBook(job) => job.book_id,
            StageJob::ExpandParagraph(job) => job.book_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StageJob::ExpandTemplate(_) => "expand_template",
            StageJob::DraftBook(_) => "draft_book",
            StageJob::RefineBook(_) => "refine_book",
            StageJob::ExpandParagraph(_) => "expand_paragraph",
        }
    }
}

/// Stage Queue Port
pub trait StageQueuePort: Send + Sync {
    /// 投递阶段作业，不等待执行
    fn submit(&self, job: StageJob) -> Result<(), StageQueueError>;
}
