//! Run Tracker Port - 流水线运行状态
//!
//! 记录每个文档（模板/成书）当前所处的流水线阶段，全部状态驻留内存。
//! 完成与否以持久化段落状态为准，这里只提供阶段可观测性。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Run Tracker 错误
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Run not found: {0}")]
    NotFound(Uuid),
}

/// 流水线阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// 模板已创建，等待骨架展开
    TemplateRequested,
    /// 模板骨架完成（章节+段落种子落库）
    TemplateReady,
    /// 成书已创建，正在复制模板章节
    ChaptersExpanding,
    /// 当前章节骨架复制完成
    ChapterReady,
    /// 段落正文并发生成中
    ParagraphsGenerating,
    /// 全部段落到达终态，初稿完成
    BookDraftReady,
    /// 润色中
    Refining,
    /// 润色完成（终态）
    RefinementComplete,
    /// 运行失败（终态）
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::TemplateRequested => "template_requested",
            PipelineStage::TemplateReady => "template_ready",
            PipelineStage::ChaptersExpanding => "chapters_expanding",
            PipelineStage::ChapterReady => "chapter_ready",
            PipelineStage::ParagraphsGenerating => "paragraphs_generating",
            PipelineStage::BookDraftReady => "book_draft_ready",
            PipelineStage::Refining => "refining",
            PipelineStage::RefinementComplete => "refinement_complete",
            PipelineStage::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "template_requested" => Some(PipelineStage::TemplateRequested),
            "template_ready" => Some(PipelineStage::TemplateReady),
            "chapters_expanding" => Some(PipelineStage::ChaptersExpanding),
            "chapter_ready" => Some(PipelineStage::ChapterReady),
            "paragraphs_generating" => Some(PipelineStage::ParagraphsGenerating),
            "book_draft_ready" => Some(PipelineStage::BookDraftReady),
            "refining" => Some(PipelineStage::Refining),
            "refinement_complete" => Some(PipelineStage::RefinementComplete),
            "failed" => Some(PipelineStage::Failed),
            _ => None,
        }
    }

    /// 是否终态
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineStage::TemplateReady
                | PipelineStage::RefinementComplete
                | PipelineStage::Failed
        )
    }
}

/// 运行记录
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub document_id: Uuid,
    pub stage: PipelineStage,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Run Tracker Port
pub trait RunTrackerPort: Send + Sync {
    /// 登记一次新运行（覆盖同一文档的旧记录）
    fn begin(&self, document_id: Uuid, stage: PipelineStage);

    /// 推进阶段
    fn set_stage(&self, document_id: Uuid, stage: PipelineStage) -> Result<(), RunError>;

    /// 标记运行失败并记录原因
    fn set_failed(&self, document_id: Uuid, error: String) -> Result<(), RunError>;

    /// 查询当前阶段
    fn get_stage(&self, document_id: Uuid) -> Option<PipelineStage>;

    /// 查询运行记录
    fn get_run(&self, document_id: Uuid) -> Option<RunRecord>;

    /// 清理运行记录
    fn cleanup(&self, document_id: Uuid);
}
