//! Book Context - Errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BookError {
    #[error("无效的标题: {0}")]
    InvalidTitle(String),

    #[error("无效的书籍规格: {0}")]
    InvalidAbstract(String),

    #[error("无效的段落状态: {0}")]
    InvalidStatus(String),

    #[error("章节不存在: {0}")]
    ChapterNotFound(uuid::Uuid),

    #[error("段落不存在: {0}")]
    ParagraphNotFound(uuid::Uuid),
}
