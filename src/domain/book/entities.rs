//! Book Context - Entities

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 段落生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParagraphStatus {
    /// 仅有种子构想，尚未生成正文
    Seed,
    /// 正在生成
    Generating,
    /// 初稿完成
    Generated,
    /// 润色完成
    Refined,
    /// 生成失败（正文为失败占位文本）
    Failed,
}

impl ParagraphStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParagraphStatus::Seed => "seed",
            ParagraphStatus::Generating => "generating",
            ParagraphStatus::Generated => "generated",
            ParagraphStatus::Refined => "refined",
            ParagraphStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "seed" => Some(ParagraphStatus::Seed),
            "generating" => Some(ParagraphStatus::Generating),
            "generated" => Some(ParagraphStatus::Generated),
            "refined" => Some(ParagraphStatus::Refined),
            "failed" => Some(ParagraphStatus::Failed),
            _ => None,
        }
    }

    /// 是否已达终态文本（正文或失败占位）
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ParagraphStatus::Generated | ParagraphStatus::Refined | ParagraphStatus::Failed
        )
    }
}

impl Default for ParagraphStatus {
    fn default() -> Self {
        ParagraphStatus::Seed
    }
}

/// 段落实体
///
/// 不变量:
/// - id 创建后不变
/// - index 在章节内唯一且有序，生成/润色不会重排
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    id: Uuid,
    index: usize,
    text: String,
    status: ParagraphStatus,
}

impl Paragraph {
    pub fn new(id: Uuid, index: usize, text: String, status: ParagraphStatus) -> Self {
        Self {
            id,
            index,
            text,
            status,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn status(&self) -> ParagraphStatus {
        self.status
    }

    /// 原地替换正文并更新状态，id 与 index 保持不变
    pub fn set_text(&mut self, text: String, status: ParagraphStatus) {
        self.text = text;
        self.status = status;
    }
}

/// 章节实体
///
/// 不变量: index 在书内唯一且有序，段落顺序创建后不变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    id: Uuid,
    index: usize,
    title: String,
    idea: String,
    paragraphs: Vec<Paragraph>,
}

impl Chapter {
    pub fn new(id: Uuid, index: usize, title: String, idea: String) -> Self {
        Self {
            id,
            index,
            title,
            idea,
            paragraphs: Vec::new(),
        }
    }

    pub fn with_paragraphs(mut self, paragraphs: Vec<Paragraph>) -> Self {
        self.paragraphs = paragraphs;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn idea(&self) -> &str {
        &self.idea
    }

    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.paragraphs
    }

    pub fn paragraph_count(&self) -> usize {
        self.paragraphs.len()
    }

    pub fn paragraph_mut(&mut self, index: usize) -> Option<&mut Paragraph> {
        self.paragraphs.get_mut(index)
    }

    pub fn push_paragraph(&mut self, paragraph: Paragraph) {
        self.paragraphs.push(paragraph);
    }
}
