//! Repository Ports - 出站端口
//!
//! 定义书籍树持久化的抽象接口
//! 具体实现在 infrastructure 层（SQLite）

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::book::ParagraphStatus;

/// Repository 错误
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Duplicate entity: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// 书籍记录（列表/元数据视图）
#[derive(Debug, Clone)]
pub struct BookRecord {
    pub id: Uuid,
    pub space_id: Uuid,
    pub title: String,
    /// 序列化后的生成规格（消毒存储）
    pub abstract_text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 新建书籍
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub abstract_text: String,
}

/// 新建章节
#[derive(Debug, Clone)]
pub struct NewChapter {
    pub title: String,
    pub idea: String,
}

/// 新建段落
#[derive(Debug, Clone)]
pub struct NewParagraph {
    pub text: String,
    pub status: ParagraphStatus,
}

/// 段落更新（正文原地替换 + 状态推进）
#[derive(Debug, Clone)]
pub struct ParagraphUpdate {
    pub text: String,
    pub status: ParagraphStatus,
}

/// 完整书籍树（章节按 index 升序，段落按 index 升序）
#[derive(Debug, Clone)]
pub struct BookTree {
    pub id: Uuid,
    pub space_id: Uuid,
    pub title: String,
    pub abstract_text: String,
    pub chapters: Vec<ChapterTree>,
}

/// 书籍树中的章节
#[derive(Debug, Clone)]
pub struct ChapterTree {
    pub id: Uuid,
    pub index: usize,
    pub title: String,
    pub idea: String,
    pub paragraphs: Vec<ParagraphRecord>,
}

/// 书籍树中的段落
#[derive(Debug, Clone)]
pub struct ParagraphRecord {
    pub id: Uuid,
    pub index: usize,
    pub text: String,
    pub status: ParagraphStatus,
}

/// Book Store Port
///
/// 书籍/章节/段落树的持久化契约。章节与段落的 index 由存储层
/// 按插入顺序递增分配，之后不再变化。
#[async_trait]
pub trait BookStorePort: Send + Sync {
    /// 创建书籍（模板与成书共用），返回新 id
    async fn create_book(&self, space_id: Uuid, book: &NewBook) -> Result<Uuid, RepositoryError>;

    /// 追加章节，返回新 id
    async fn add_chapter(
        &self,
        space_id: Uuid,
        book_id: Uuid,
        chapter: &NewChapter,
    ) -> Result<Uuid, RepositoryError>;

    /// 追加段落，返回新 id
    async fn add_paragraph(
        &self,
        space_id: Uuid,
        book_id: Uuid,
        chapter_id: Uuid,
        paragraph: &NewParagraph,
    ) -> Result<Uuid, RepositoryError>;

    /// 原地更新段落正文与状态
    async fn update_paragraph(
        &self,
        space_id: Uuid,
        book_id: Uuid,
        chapter_id: Uuid,
        paragraph_id: Uuid,
        update: &ParagraphUpdate,
    ) -> Result<(), RepositoryError>;

    /// 读取完整书籍树
    async fn get_book(
        &self,
        space_id: Uuid,
        book_id: Uuid,
    ) -> Result<Option<BookTree>, RepositoryError>;

    /// 列出空间内所有书籍
    async fn list_books(&self, space_id: Uuid) -> Result<Vec<BookRecord>, RepositoryError>;

    /// 删除段落（补偿回滚使用）
    async fn delete_paragraph(
        &self,
        space_id: Uuid,
        book_id: Uuid,
        chapter_id: Uuid,
        paragraph_id: Uuid,
    ) -> Result<(), RepositoryError>;

    /// 删除书籍及其章节/段落
    async fn delete_book(&self, space_id: Uuid, book_id: Uuid) -> Result<(), RepositoryError>;
}
