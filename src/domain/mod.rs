//! Domain Layer - 领域层
//!
//! 包含书籍限界上下文与两个共享领域服务:
//! - prompts: 各层级提示词构建（含润色位置三分规则）
//! - sanitize: abstract 字段的可逆消毒

pub mod book;
pub mod prompts;

mod sanitize;

pub use sanitize::{sanitize, unsanitize};
