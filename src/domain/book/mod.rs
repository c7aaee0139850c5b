//! Book Context - 书籍限界上下文
//!
//! 职责:
//! - 书籍聚合（章节/段落树的内存镜像）
//! - 段落生命周期状态
//! - 生成规格（abstract 字段）的序列化与消毒

mod aggregate;
mod entities;
mod errors;
mod value_objects;

pub use aggregate::Book;
pub use entities::{Chapter, Paragraph, ParagraphStatus};
pub use errors::BookError;
pub use value_objects::{BookId, BookSpec, Title, BOOK_TITLE_PREFIX, TEMPLATE_TITLE_PREFIX};
