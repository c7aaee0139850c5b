//! Book Commands

use uuid::Uuid;

/// 生成书籍模板命令：规划章节与段落种子
#[derive(Debug, Clone)]
pub struct GenerateTemplate {
    pub space_id: Uuid,
    pub title: String,
    pub informative_text: String,
    pub instructions: String,
    pub edition: Option<String>,
}

/// 由模板生成成书命令：逐段生成初稿，完成后自动进入润色
#[derive(Debug, Clone)]
pub struct GenerateBook {
    pub space_id: Uuid,
    pub template_id: Uuid,
}

/// 全书润色命令（也可对已有成书单独触发）
#[derive(Debug, Clone)]
pub struct RefineBook {
    pub space_id: Uuid,
    pub book_id: Uuid,
}

/// 单段重写命令
#[derive(Debug, Clone)]
pub struct ExpandParagraph {
    pub space_id: Uuid,
    pub book_id: Uuid,
    pub chapter_id: Uuid,
    pub paragraph_id: Uuid,
}

/// 删除书籍命令
#[derive(Debug, Clone)]
pub struct DeleteBook {
    pub space_id: Uuid,
    pub book_id: Uuid,
}
