//! Book Context - Aggregate Root

use uuid::Uuid;

use super::{BookError, BookId, BookSpec, Chapter, Paragraph, ParagraphStatus};

/// Book 聚合根
///
/// 流水线运行期间的内存镜像：生成/润色阶段在镜像上读邻居文本、
/// 写入新正文，与持久化副本同步推进。
///
/// 不变量:
/// - 章节与段落顺序建立后不再重排
/// - abstract（生成规格）创建后不可变
/// - 每个段落在运行结束前到达唯一终态文本
#[derive(Debug, Clone)]
pub struct Book {
    id: BookId,
    title: String,
    spec: BookSpec,
    chapters: Vec<Chapter>,
}

impl Book {
    pub fn new(id: BookId, title: String, spec: BookSpec) -> Self {
        Self {
            id,
            title,
            spec,
            chapters: Vec::new(),
        }
    }

    pub fn with_chapters(mut self, chapters: Vec<Chapter>) -> Self {
        self.chapters = chapters;
        self
    }

    pub fn id(&self) -> &BookId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn spec(&self) -> &BookSpec {
        &self.spec
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    /// 拆出章节供并发润色使用：每个任务独占一个章节的镜像
    pub fn into_chapters(self) -> Vec<Chapter> {
        self.chapters
    }

    pub fn find_chapter(&self, chapter_id: Uuid) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.id() == chapter_id)
    }

    pub fn find_paragraph(&self, paragraph_id: Uuid) -> Option<(&Chapter, &Paragraph)> {
        for chapter in &self.chapters {
            if let Some(p) = chapter.paragraphs().iter().find(|p| p.id() == paragraph_id) {
                return Some((chapter, p));
            }
        }
        None
    }

    /// 原地更新指定段落正文
    pub fn set_paragraph_text(
        &mut self,
        paragraph_id: Uuid,
        text: String,
        status: ParagraphStatus,
    ) -> Result<(), BookError> {
        for chapter in &mut self.chapters {
            for index in 0..chapter.paragraph_count() {
                if let Some(p) = chapter.paragraph_mut(index) {
                    if p.id() == paragraph_id {
                        p.set_text(text, status);
                        return Ok(());
                    }
                }
            }
        }
        Err(BookError::ParagraphNotFound(paragraph_id))
    }

    /// 运行是否已完成：所有段落文本处于终态
    pub fn all_paragraphs_terminal(&self) -> bool {
        self.chapters
            .iter()
            .flat_map(|c| c.paragraphs())
            .all(|p| p.status().is_terminal())
    }
}
