//! Book Context - Value Objects

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::sanitize::{sanitize, unsanitize};

use super::BookError;

/// 书籍唯一标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookId(Uuid);

impl BookId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BookId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 模板文档标题前缀
pub const TEMPLATE_TITLE_PREFIX: &str = "template_";
/// 成书文档标题前缀
pub const BOOK_TITLE_PREFIX: &str = "book_";

/// 书籍标题
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Title(String);

impl Title {
    pub fn new(title: impl Into<String>) -> Result<Self, BookError> {
        let title = title.into();
        if title.is_empty() {
            return Err(BookError::InvalidTitle("标题不能为空".to_string()));
        }
        if title.len() > 200 {
            return Err(BookError::InvalidTitle(
                "标题长度不能超过200字符".to_string(),
            ));
        }
        Ok(Self(title))
    }

    /// 模板文档标题: `template_{title}`
    pub fn for_template(base: &str) -> Result<Self, BookError> {
        Self::new(format!("{}{}", TEMPLATE_TITLE_PREFIX, base))
    }

    /// 由模板标题派生成书标题: `template_` -> `book_`
    pub fn for_book(template_title: &str) -> Result<Self, BookError> {
        Self::new(template_title.replacen(TEMPLATE_TITLE_PREFIX, BOOK_TITLE_PREFIX, 1))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Title {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 书籍生成规格
///
/// 持久化在书籍记录的 abstract 字段中（JSON 序列化，字段消毒后存储）。
/// 创建后不可变，模板和成书共享同一份规格。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSpec {
    /// 书名（未加前缀的原始标题）
    pub title: String,
    /// 书籍内容说明
    pub informative_text: String,
    /// 面向生成服务的整体指令
    pub instructions: String,
    /// 版次说明（可选）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edition: Option<String>,
}

impl BookSpec {
    pub fn new(
        title: impl Into<String>,
        informative_text: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            informative_text: informative_text.into(),
            instructions: instructions.into(),
            edition: None,
        }
    }

    /// 序列化为 abstract 字段内容，字符串字段先消毒
    pub fn to_abstract_json(&self) -> Result<String, BookError> {
        let sanitized = Self {
            title: sanitize(&self.title),
            informative_text: sanitize(&self.informative_text),
            instructions: sanitize(&self.instructions),
            edition: self.edition.as_deref().map(sanitize),
        };
        serde_json::to_string(&sanitized)
            .map_err(|e| BookError::InvalidAbstract(e.to_string()))
    }

    /// 从 abstract 字段内容解析，字符串字段还原消毒
    pub fn from_abstract_json(raw: &str) -> Result<Self, BookError> {
        let stored: Self = serde_json::from_str(raw)
            .map_err(|e| BookError::InvalidAbstract(e.to_string()))?;
        Ok(Self {
            title: unsanitize(&stored.title),
            informative_text: unsanitize(&stored.informative_text),
            instructions: unsanitize(&stored.instructions),
            edition: stored.edition.as_deref().map(unsanitize),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_validation() {
        assert!(Title::new("").is_err());
        assert!(Title::new("a".repeat(201)).is_err());
        assert_eq!(Title::new("测试书籍").unwrap().as_str(), "测试书籍");
    }

    #[test]
    fn test_template_to_book_title() {
        let template = Title::for_template("Rust 实战").unwrap();
        assert_eq!(template.as_str(), "template_Rust 实战");

        let book = Title::for_book(template.as_str()).unwrap();
        assert_eq!(book.as_str(), "book_Rust 实战");
    }

    #[test]
    fn test_book_spec_abstract_round_trip() {
        let spec = BookSpec::new(
            "Systems & \"Services\"",
            "A book about <async> pipelines",
            "Keep the tone practical",
        );

        let json = spec.to_abstract_json().unwrap();
        // 存储形态不包含未消毒的特殊字符
        assert!(!json.contains('<'));

        let restored = BookSpec::from_abstract_json(&json).unwrap();
        assert_eq!(restored, spec);
    }
}
